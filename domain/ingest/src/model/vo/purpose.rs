use serde::{Deserialize, Serialize};

/// What the uploaded file is going to be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    #[default]
    Document,
    GroupCover,
    PostAttachment,
    MessageAttachment,
    Avatar,
}
