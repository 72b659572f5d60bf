//! Startup data for empty stores.
//!
//! Each step only runs against an empty collection, so restarting never
//! duplicates data. Seeding writes even when dry-run is enabled.

use chrono::{Duration, Utc};
use kudos_common::User;

use crate::config::Config;
use crate::store::{KudosStore, NewKudos, NewUser, StoreError};

/// Directory users inserted into an empty store.
pub const DIRECTORY: [(&str, &str); 5] = [
    ("Avery Johnson", "Engineering"),
    ("Jordan Lee", "Product"),
    ("Riley Patel", "Design"),
    ("Morgan Chen", "Customer Success"),
    ("Casey Rivera", "Data"),
];

/// Insert the directory users if there are no users yet. Returns how many
/// were inserted.
pub async fn ensure_users(store: &dyn KudosStore) -> Result<usize, StoreError> {
    if store.has_users().await? {
        tracing::debug!("Users present, skipping directory seed");
        return Ok(0);
    }

    let users = DIRECTORY
        .iter()
        .map(|(name, team)| NewUser::new(*name, *team))
        .collect();
    let inserted = store.insert_users(users).await?;
    tracing::info!("Seeded {} users", inserted.len());
    Ok(inserted.len())
}

fn sample_kudos(users: &[User]) -> Vec<NewKudos> {
    let now = Utc::now();
    let first = &users[0];
    let second = &users[1];
    let third = users.get(2).unwrap_or(first);

    vec![
        NewKudos::between(
            first,
            second,
            "Thanks for jumping in to help unblock the release.",
            now - Duration::minutes(45),
        ),
        NewKudos::between(
            second,
            third,
            "Great insights during the customer call today!",
            now - Duration::minutes(30),
        ),
        NewKudos::between(
            third,
            first,
            "Appreciate the quick turnaround on the dashboard update.",
            now - Duration::minutes(10),
        ),
    ]
}

/// Insert a few back-dated kudos between the earliest users if there are no
/// kudos yet. Needs at least two users.
pub async fn ensure_sample_kudos(store: &dyn KudosStore) -> Result<usize, StoreError> {
    if store.has_kudos().await? {
        tracing::debug!("Kudos present, skipping sample seed");
        return Ok(0);
    }

    let users = store.first_users(3).await?;
    if users.len() < 2 {
        tracing::debug!("Not enough users for sample kudos");
        return Ok(0);
    }

    let kudos = sample_kudos(&users);
    let count = kudos.len();
    store.insert_many_kudos(kudos).await?;
    tracing::info!("Seeded {} sample kudos", count);
    Ok(count)
}

/// Seed everything the configuration asks for.
pub async fn run(store: &dyn KudosStore, config: &Config) -> Result<(), StoreError> {
    ensure_users(store).await?;
    if config.seeds_sample_kudos() {
        ensure_sample_kudos(store).await?;
    }
    Ok(())
}
