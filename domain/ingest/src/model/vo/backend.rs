use serde::{Deserialize, Serialize};

/// Identifier of a concrete storage provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Private directory on the application host.
    Local,
    /// S3-compatible object storage.
    ObjectStore,
    /// Third-party hosted drive.
    ExternalDrive,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::ObjectStore => "object_store",
            BackendKind::ExternalDrive => "external_drive",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "local" => BackendKind::Local,
            "object_store" => BackendKind::ObjectStore,
            "external_drive" => BackendKind::ExternalDrive,
            _ => anyhow::bail!("unknown storage backend: {s}"),
        })
    }
}
