use async_trait::async_trait;
use kudos_common::{Kudos, User};
use tokio::sync::RwLock;

use super::{KudosFilter, KudosStore, Moderation, NewKudos, NewUser, StoreError};

/// Process-local store. Ids are random uuids.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<Vec<User>>,
    kudos: RwLock<Vec<Kudos>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn kudos_count(&self) -> usize {
        self.kudos.read().await.len()
    }
}

#[async_trait]
impl KudosStore for InMemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users = self.users.read().await.clone();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn first_users(&self, limit: u64) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().take(limit as usize).cloned().collect())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if !user.external_id.is_empty() && users.iter().any(|u| u.external_id == user.external_id) {
            return Err(StoreError::Duplicate(format!("externalId {}", user.external_id)));
        }
        let user = user.with_id(Self::next_id());
        users.push(user.clone());
        Ok(user)
    }

    async fn insert_users(&self, users: Vec<NewUser>) -> Result<Vec<User>, StoreError> {
        let users: Vec<User> = users.into_iter().map(|u| u.with_id(Self::next_id())).collect();
        self.users.write().await.extend(users.iter().cloned());
        Ok(users)
    }

    async fn has_users(&self) -> Result<bool, StoreError> {
        Ok(!self.users.read().await.is_empty())
    }

    async fn find_kudos(&self, id: &str) -> Result<Option<Kudos>, StoreError> {
        Ok(self.kudos.read().await.iter().find(|k| k.id == id).cloned())
    }

    async fn query_kudos(
        &self,
        filter: &KudosFilter,
        skip: u64,
        limit: u64,
    ) -> Result<(u64, Vec<Kudos>), StoreError> {
        let kudos = self.kudos.read().await;

        // Newest insert first, then a stable sort keeps that order for equal timestamps.
        let mut matching: Vec<&Kudos> = kudos.iter().rev().filter(|k| filter.matches(k)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok((total, items))
    }

    async fn insert_kudos(&self, kudos: NewKudos) -> Result<Kudos, StoreError> {
        let kudos = kudos.with_id(Self::next_id());
        self.kudos.write().await.push(kudos.clone());
        Ok(kudos)
    }

    async fn insert_many_kudos(&self, kudos: Vec<NewKudos>) -> Result<(), StoreError> {
        let mut stored = self.kudos.write().await;
        stored.extend(kudos.into_iter().map(|k| k.with_id(Self::next_id())));
        Ok(())
    }

    async fn has_kudos(&self) -> Result<bool, StoreError> {
        Ok(!self.kudos.read().await.is_empty())
    }

    async fn update_moderation(&self, id: &str, moderation: &Moderation) -> Result<bool, StoreError> {
        let mut kudos = self.kudos.write().await;
        match kudos.iter_mut().find(|k| k.id == id) {
            Some(entry) => {
                moderation.apply(entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_kudos(&self, id: &str) -> Result<bool, StoreError> {
        let mut kudos = self.kudos.write().await;
        let before = kudos.len();
        kudos.retain(|k| k.id != id);
        Ok(kudos.len() != before)
    }
}
