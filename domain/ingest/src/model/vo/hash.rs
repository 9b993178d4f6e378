use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Blake3 => write!(f, "blake3"),
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blake3" => Ok(HashAlgorithm::Blake3),
            _ => anyhow::bail!("unsupported hash algorithm: {s}"),
        }
    }
}

/// Hex encoded content digest, always kept upper case so that client
/// supplied hashes compare equal regardless of their casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(hex: impl AsRef<str>) -> Self {
        Self(hex.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ContentHash {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of hashing a byte stream in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    pub hash: ContentHash,
    pub algorithm: HashAlgorithm,
    /// Number of bytes seen.
    pub size: u64,
}
