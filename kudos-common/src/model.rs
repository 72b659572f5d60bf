//! Stored records as the API exposes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A colleague who can send and receive kudos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Store-assigned identifier.
    pub id: String,
    pub name: String,
    pub team: String,
    /// Identity-provider subject. Empty for seeded users until they first post.
    #[serde(default)]
    pub external_id: String,
}

/// A single appreciation message.
///
/// Recipient and sender name/team are copied at creation time, so later
/// edits to a user never rewrite historical entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kudos {
    pub id: String,
    pub to_user_id: String,
    pub to_user_name: String,
    pub to_user_team: String,
    pub from_user_id: String,
    pub from_user_name: String,
    pub from_user_team: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    /// External id of the last admin who changed visibility.
    #[serde(default)]
    pub moderated_by: Option<String>,
    #[serde(default)]
    pub moderated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub moderation_reason: Option<String>,
}

fn default_visible() -> bool {
    true
}
