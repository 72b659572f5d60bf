//! Document store adapter.
//!
//! [`KudosStore`] is the port the service talks to. [`MongoStore`] binds it to
//! the `users` and `kudos` collections of a MongoDB database; [`InMemoryStore`]
//! keeps everything in process for tests and local runs.

mod memory;
mod mongo;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kudos_common::{Kudos, User};

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

use crate::config::DatabaseConfig;

/// Connection strings with this prefix select [`InMemoryStore`].
pub const MEMORY_PREFIX: &str = "memory:";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Backend(String),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("Duplicate key: {0}")]
    Duplicate(String),
}

/// A user about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub team: String,
    pub external_id: String,
}

impl NewUser {
    pub fn new(name: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team: team.into(),
            external_id: String::new(),
        }
    }

    pub fn with_id(self, id: impl Into<String>) -> User {
        User {
            id: id.into(),
            name: self.name,
            team: self.team,
            external_id: self.external_id,
        }
    }
}

/// A kudos about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewKudos {
    pub to_user_id: String,
    pub to_user_name: String,
    pub to_user_team: String,
    pub from_user_id: String,
    pub from_user_name: String,
    pub from_user_team: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NewKudos {
    /// Snapshot recipient and sender as they are now.
    pub fn between(to: &User, from: &User, message: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            to_user_id: to.id.clone(),
            to_user_name: to.name.clone(),
            to_user_team: to.team.clone(),
            from_user_id: from.id.clone(),
            from_user_name: from.name.clone(),
            from_user_team: from.team.clone(),
            message: message.into(),
            created_at,
        }
    }

    /// The stored record: visible and never moderated.
    pub fn with_id(self, id: impl Into<String>) -> Kudos {
        Kudos {
            id: id.into(),
            to_user_id: self.to_user_id,
            to_user_name: self.to_user_name,
            to_user_team: self.to_user_team,
            from_user_id: self.from_user_id,
            from_user_name: self.from_user_name,
            from_user_team: self.from_user_team,
            message: self.message,
            created_at: self.created_at,
            is_visible: true,
            moderated_by: None,
            moderated_at: None,
            moderation_reason: None,
        }
    }
}

/// Fields written by a visibility change.
#[derive(Debug, Clone, PartialEq)]
pub struct Moderation {
    pub is_visible: bool,
    pub moderated_by: String,
    pub moderated_at: DateTime<Utc>,
    pub reason: String,
}

impl Moderation {
    pub fn apply(&self, kudos: &mut Kudos) {
        kudos.is_visible = self.is_visible;
        kudos.moderated_by = Some(self.moderated_by.clone());
        kudos.moderated_at = Some(self.moderated_at);
        kudos.moderation_reason = Some(self.reason.clone());
    }
}

/// Feed filter. Every set field must match; `search` is a trimmed,
/// case-insensitive substring of message, recipient name or sender name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KudosFilter {
    pub team: Option<String>,
    pub to_user_id: Option<String>,
    pub from_user_id: Option<String>,
    pub search: Option<String>,
    pub visible_only: bool,
}

impl KudosFilter {
    /// In-process evaluation, equivalent to the query the Mongo adapter builds.
    pub fn matches(&self, kudos: &Kudos) -> bool {
        if self.visible_only && !kudos.is_visible {
            return false;
        }
        if self.team.as_ref().is_some_and(|team| kudos.to_user_team != *team) {
            return false;
        }
        if self.to_user_id.as_ref().is_some_and(|id| kudos.to_user_id != *id) {
            return false;
        }
        if self.from_user_id.as_ref().is_some_and(|id| kudos.from_user_id != *id) {
            return false;
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                [&kudos.message, &kudos.to_user_name, &kudos.from_user_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

/// Persistence port for users and kudos.
///
/// Each call is atomic for the single document it touches; nothing spans
/// documents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KudosStore: Send + Sync {
    /// Round-trip to the backend.
    async fn ping(&self) -> Result<(), StoreError>;

    /// All users, sorted by name.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Up to `limit` users in insertion order.
    async fn first_users(&self, limit: u64) -> Result<Vec<User>, StoreError>;

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] if a user already holds the
    /// same non-empty external id.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn insert_users(&self, users: Vec<NewUser>) -> Result<Vec<User>, StoreError>;

    async fn has_users(&self) -> Result<bool, StoreError>;

    async fn find_kudos(&self, id: &str) -> Result<Option<Kudos>, StoreError>;

    /// Total matching `filter`, and the `limit` newest after skipping `skip`.
    async fn query_kudos(
        &self,
        filter: &KudosFilter,
        skip: u64,
        limit: u64,
    ) -> Result<(u64, Vec<Kudos>), StoreError>;

    async fn insert_kudos(&self, kudos: NewKudos) -> Result<Kudos, StoreError>;

    async fn insert_many_kudos(&self, kudos: Vec<NewKudos>) -> Result<(), StoreError>;

    async fn has_kudos(&self) -> Result<bool, StoreError>;

    /// Returns false if no kudos has this id.
    async fn update_moderation(&self, id: &str, moderation: &Moderation) -> Result<bool, StoreError>;

    /// Returns false if no kudos has this id.
    async fn delete_kudos(&self, id: &str) -> Result<bool, StoreError>;
}

/// Open the store named by the connection string.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn KudosStore>, StoreError> {
    if config.connection_string.starts_with(MEMORY_PREFIX) {
        tracing::warn!("Using in-memory store; data is lost on restart");
        return Ok(Arc::new(InMemoryStore::new()));
    }

    let store = MongoStore::connect(&config.connection_string, &config.name).await?;
    Ok(Arc::new(store))
}
