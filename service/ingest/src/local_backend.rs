use std::{
    io,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use domain_ingest::{
    exception::{IngestException, IngestResult},
    model::{
        entity::FileUploadHandle,
        vo::{AccessUrl, BackendKind, ObjectWrite, StoredObject},
    },
    service::{ByteStream, ContentHasherService, StorageBackend},
};
use tokio::{fs::File, io::AsyncWriteExt};
use typed_builder::TypedBuilder;

use crate::assembler::temp_sibling;

/// Objects as plain files under `root`, served back through the application's
/// proxy route rather than directly.
#[derive(TypedBuilder, Clone)]
pub struct LocalStorageBackendImpl {
    #[builder(default = "objects".into(), setter(into))]
    root: PathBuf,
    /// Base of the proxy route, e.g. `http://host/file-ingest/handles`.
    #[builder(setter(into))]
    proxy_base_url: String,
    content_hasher: Arc<dyn ContentHasherService>,
}

impl LocalStorageBackendImpl {
    fn object_path(&self, locator: &str) -> IngestResult<PathBuf> {
        let relative = Path::new(locator);
        if locator.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(anyhow::anyhow!("Locator: {locator} escapes the storage root.").into());
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackendImpl {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn write(
        &self,
        target: &ObjectWrite,
        content: &mut ByteStream<'_>,
    ) -> IngestResult<StoredObject> {
        let id = target.object_id.simple().to_string();
        let locator = format!("{}/{id}", &id[..2]);
        let path = self.object_path(&locator)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = temp_sibling(&path);
        let mut reader = self.content_hasher.digesting(Box::new(content));
        let copied = async {
            let mut file = File::create(&tmp).await?;
            tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = copied {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tokio::fs::rename(&tmp, &path).await?;

        let digest = reader.digest();
        Ok(StoredObject {
            locator,
            size_bytes: digest.size,
            checksum: Some(digest.hash),
        })
    }

    async fn read(&self, locator: &str) -> IngestResult<ByteStream<'static>> {
        let file = File::open(self.object_path(locator)?).await?;
        Ok(Box::new(file))
    }

    async fn delete(&self, locator: &str) -> IngestResult<()> {
        match tokio::fs::remove_file(self.object_path(locator)?).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(IngestException::from_io(e)),
            _ => Ok(()),
        }
    }

    async fn issue_access_url(&self, handle: &FileUploadHandle) -> IngestResult<AccessUrl> {
        Ok(AccessUrl {
            url: format!("{}/{}/content", self.proxy_base_url.trim_end_matches('/'), handle.id),
            expires_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use uuid::Uuid;

    use super::*;
    use crate::Blake3ContentHasherImpl;

    fn load(root: &Path) -> LocalStorageBackendImpl {
        LocalStorageBackendImpl::builder()
            .root(root)
            .proxy_base_url("http://localhost/file-ingest/handles/")
            .content_hasher(Arc::new(Blake3ContentHasherImpl))
            .build()
    }

    #[tokio::test]
    async fn write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let backend = load(dir.path());
        let target = ObjectWrite {
            object_id: Uuid::new_v4(),
            original_filename: "a.txt".into(),
            mime_type: "text/plain".into(),
        };
        let mut content: ByteStream<'_> = Box::new(&b"local bytes"[..]);
        let stored = backend.write(&target, &mut content).await.unwrap();
        assert_eq!(stored.size_bytes, 11);
        assert_eq!(stored.checksum, Some(Blake3ContentHasherImpl.hash_bytes(b"local bytes")));
        let mut read = vec![];
        backend.read(&stored.locator).await.unwrap().read_to_end(&mut read).await.unwrap();
        assert_eq!(read, b"local bytes");

        backend.delete(&stored.locator).await.unwrap();
        backend.delete(&stored.locator).await.unwrap();
        assert!(backend.read(&stored.locator).await.is_err());
    }

    #[tokio::test]
    async fn locator_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let backend = load(dir.path());
        assert!(backend.read("../etc/passwd").await.is_err());
        assert!(backend.read("/etc/passwd").await.is_err());
    }
}
