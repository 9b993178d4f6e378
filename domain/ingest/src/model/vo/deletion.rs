use serde::Serialize;
use uuid::Uuid;

/// What happened to the physical object when its handle was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PhysicalDeletion {
    Deleted,
    /// Other handles still point at the same object.
    StillReferenced { remaining_refs: u64 },
    /// The backend refused, the object is orphaned and left to cleanup jobs.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleDeletion {
    pub handle_id: Uuid,
    pub physical: PhysicalDeletion,
}

impl HandleDeletion {
    /// Whether the deletion left nothing behind.
    pub fn is_clean(&self) -> bool {
        !matches!(self.physical, PhysicalDeletion::Failed { .. })
    }
}
