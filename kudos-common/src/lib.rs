//! Kudos Common Types
//!
//! Shared types used by the backend and its clients.

pub mod api;
pub mod model;

pub use api::{
    CreateKudosRequest, DeleteResult, KudosPage, KudosQuery, ModerationResult, VisibilityRequest,
};
pub use model::{Kudos, User};

/// Maximum message length, in characters, after trimming.
pub const MAX_MESSAGE_CHARS: usize = 240;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Largest page size the feed will serve.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Id returned for a kudos that was only simulated.
pub const DRY_RUN_ID: &str = "dry-run";

/// Team given to users created on their first submission.
pub const UNASSIGNED_TEAM: &str = "Unassigned";
