//! The kudos feed: creation, listing and moderation.

mod pagination;
mod service;

pub use pagination::PageRequest;
pub use service::{validate_create, KudosService};
