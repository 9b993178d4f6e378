use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A url the client can fetch the file from.
///
/// Derived on every request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessUrl {
    pub url: String,
    /// `None` when the url doesn't expire on its own.
    pub expires_at: Option<DateTime<Utc>>,
}
