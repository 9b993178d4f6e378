use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

const TOKEN_LEN: usize = 40;

/// Opaque, unguessable upload session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let token = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tokens only ever contain ascii alphanumerics, anything else can't be
    /// one of ours and must not reach the staging file system.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.len() > 128 || !raw.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(raw.to_owned()))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
