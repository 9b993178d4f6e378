use uuid::Uuid;

/// Authenticated caller, as established by the surrounding web layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    pub fn may_act_for(&self, owner_id: Uuid) -> bool {
        self.is_admin || self.user_id == owner_id
    }
}
