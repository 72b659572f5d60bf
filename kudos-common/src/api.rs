//! Request and response bodies for the `/api` routes.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::model::Kudos;

/// Body of `POST /api/kudos`.
///
/// Missing fields deserialize as empty strings so they fail validation
/// instead of failing JSON extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKudosRequest {
    #[serde(default)]
    pub to_user_id: String,
    #[serde(default)]
    pub message: String,
}

/// Body of `PATCH /api/kudos/{id}/visibility`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    pub is_visible: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PagingValue {
    Number(i64),
    Text(String),
}

/// Blank paging values count as absent; other text must be an integer.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<PagingValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(PagingValue::Number(n)) => Ok(Some(n)),
        Some(PagingValue::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid paging value: {}", text)))
        }
    }
}

/// Query string of `GET /api/kudos`.
///
/// Paging values are signed so out-of-range input is clamped rather than
/// rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KudosQuery {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub to_user_id: Option<String>,
    #[serde(default)]
    pub from_user_id: Option<String>,
}

/// One page of the kudos feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KudosPage {
    pub page: u32,
    pub page_size: u32,
    /// Entries matching the filter before pagination.
    pub total: u64,
    pub dry_run: bool,
    pub items: Vec<Kudos>,
}

/// Moderation state after a visibility change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationResult {
    pub id: String,
    pub is_visible: bool,
    pub moderated_by: String,
    pub moderated_at: DateTime<Utc>,
    pub moderation_reason: String,
    pub dry_run: bool,
}

/// Confirmation of a hard delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub id: String,
    pub deleted: bool,
    pub dry_run: bool,
}
