use std::{collections::HashMap, sync::Arc};

use domain_ingest::{
    exception::{IngestException, IngestResult},
    model::vo::{BackendKind, Purpose},
    service::StorageBackend,
};
use typed_builder::TypedBuilder;

/// Configured backends plus the policy picking one for a new upload.
#[derive(TypedBuilder)]
pub struct StorageBackendRegistry {
    backends: Vec<Arc<dyn StorageBackend>>,
    default_backend: BackendKind,
    #[builder(default)]
    purpose_overrides: HashMap<Purpose, BackendKind>,
}

impl StorageBackendRegistry {
    pub fn default_backend(&self) -> BackendKind {
        self.default_backend
    }

    pub fn is_configured(&self, kind: BackendKind) -> bool {
        self.backends.iter().any(|b| b.kind() == kind)
    }

    pub fn get(&self, kind: BackendKind) -> IngestResult<Arc<dyn StorageBackend>> {
        self.backends
            .iter()
            .find(|b| b.kind() == kind)
            .cloned()
            .ok_or(IngestException::BackendNotConfigured { backend: kind })
    }

    /// A configured hint wins, then the purpose's override, then the default.
    pub fn select(&self, hint: Option<BackendKind>, purpose: Purpose) -> IngestResult<BackendKind> {
        let kind = hint
            .filter(|k| self.is_configured(*k))
            .or_else(|| {
                self.purpose_overrides.get(&purpose).copied().filter(|k| self.is_configured(*k))
            })
            .unwrap_or(self.default_backend);
        if !self.is_configured(kind) {
            return Err(IngestException::BackendNotConfigured { backend: kind });
        }
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Blake3ContentHasherImpl, LocalStorageBackendImpl};

    fn local() -> Arc<dyn StorageBackend> {
        Arc::new(
            LocalStorageBackendImpl::builder()
                .proxy_base_url("http://localhost")
                .content_hasher(Arc::new(Blake3ContentHasherImpl))
                .build(),
        )
    }

    #[test]
    fn selection_order() {
        let registry = StorageBackendRegistry::builder()
            .backends(vec![local()])
            .default_backend(BackendKind::Local)
            .purpose_overrides(HashMap::from([(Purpose::Avatar, BackendKind::ObjectStore)]))
            .build();
        // Unconfigured hint and override fall through to the default.
        assert_eq!(
            registry.select(Some(BackendKind::ExternalDrive), Purpose::Avatar).unwrap(),
            BackendKind::Local
        );
        assert!(matches!(
            registry.get(BackendKind::ObjectStore).err(),
            Some(IngestException::BackendNotConfigured { backend: BackendKind::ObjectStore })
        ));
    }

    #[test]
    fn unconfigured_default_is_rejected() {
        let registry = StorageBackendRegistry::builder()
            .backends(vec![])
            .default_backend(BackendKind::ObjectStore)
            .build();
        assert!(registry.select(None, Purpose::Document).is_err());
    }
}
