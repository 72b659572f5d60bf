use std::sync::Arc;

use chrono::Utc;
use kudos_common::{
    CreateKudosRequest, DeleteResult, Kudos, KudosPage, KudosQuery, ModerationResult, User,
    VisibilityRequest, DRY_RUN_ID, MAX_MESSAGE_CHARS, UNASSIGNED_TEAM,
};

use super::PageRequest;
use crate::auth::{Identity, Principal};
use crate::error::{ApiError, Result};
use crate::store::{KudosFilter, KudosStore, Moderation, NewKudos, NewUser, StoreError};

/// Create, list and moderate kudos.
///
/// With `dry_run` set, every read and check runs as usual but no write
/// reaches the store; simulated records get sentinel ids instead.
pub struct KudosService {
    store: Arc<dyn KudosStore>,
    dry_run: bool,
}

/// Trim, dropping values that end up empty.
fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Check a create request, returning the trimmed message.
pub fn validate_create(request: &CreateKudosRequest) -> Result<String> {
    let message = request.message.trim();
    if request.to_user_id.trim().is_empty() || message.is_empty() {
        return Err(ApiError::Validation(
            "Recipient and message are required.".to_string(),
        ));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation(format!(
            "Message must be {} characters or less.",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(message.to_string())
}

fn require_admin(caller: &Principal) -> Result<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin access required.".to_string()))
    }
}

impl KudosService {
    pub fn new(store: Arc<dyn KudosStore>, dry_run: bool) -> Self {
        Self { store, dry_run }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn store(&self) -> &Arc<dyn KudosStore> {
        &self.store
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    /// One page of the feed, newest first. Hidden entries are only returned
    /// to admins.
    pub async fn list(&self, query: &KudosQuery, caller: &Principal) -> Result<KudosPage> {
        let page = PageRequest::clamped(query.page, query.page_size);
        let filter = KudosFilter {
            team: non_blank(&query.team),
            to_user_id: non_blank(&query.to_user_id),
            from_user_id: non_blank(&query.from_user_id),
            search: non_blank(&query.search),
            visible_only: !caller.is_admin(),
        };

        let (total, items) = self
            .store
            .query_kudos(&filter, page.skip(), page.limit())
            .await?;

        tracing::debug!(
            page = page.page,
            page_size = page.page_size,
            total,
            returned = items.len(),
            "Listed kudos"
        );

        Ok(KudosPage {
            page: page.page,
            page_size: page.page_size,
            total,
            dry_run: self.dry_run,
            items,
        })
    }

    /// Record a kudos from the caller, creating the caller's user on first use.
    pub async fn create(&self, request: &CreateKudosRequest, caller: &Principal) -> Result<Kudos> {
        let message = validate_create(request)?;
        let identity = caller.identity()?;

        let sender = self.find_or_create_sender(&identity).await?;

        let recipient = self
            .store
            .find_user(request.to_user_id.trim())
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;

        let mut kudos = NewKudos::between(&recipient, &sender, message, Utc::now());
        if kudos.from_user_name.trim().is_empty() {
            kudos.from_user_name = identity.email.clone();
        }

        let kudos = if self.dry_run {
            kudos.with_id(DRY_RUN_ID)
        } else {
            self.store.insert_kudos(kudos).await?
        };

        tracing::info!(
            kudos_id = %kudos.id,
            from = %kudos.from_user_id,
            to = %kudos.to_user_id,
            dry_run = self.dry_run,
            "Kudos created"
        );
        Ok(kudos)
    }

    async fn find_or_create_sender(&self, identity: &Identity) -> Result<User> {
        if let Some(user) = self
            .store
            .find_user_by_external_id(&identity.external_id)
            .await?
        {
            return Ok(user);
        }

        let new_user = NewUser {
            name: identity.display_name.clone(),
            team: UNASSIGNED_TEAM.to_string(),
            external_id: identity.external_id.clone(),
        };

        if self.dry_run {
            return Ok(new_user.with_id(identity.external_id.clone()));
        }

        match self.store.insert_user(new_user).await {
            Ok(user) => {
                tracing::info!("Created user {} for external id {}", user.id, identity.external_id);
                Ok(user)
            }
            // A concurrent first post from the same caller won the insert.
            Err(StoreError::Duplicate(e)) => {
                tracing::debug!("Sender already created: {}", e);
                self.store
                    .find_user_by_external_id(&identity.external_id)
                    .await?
                    .ok_or(ApiError::Store(StoreError::Duplicate(e)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Hide or show a kudos. Admin only.
    pub async fn set_visibility(
        &self,
        id: &str,
        request: &VisibilityRequest,
        caller: &Principal,
    ) -> Result<ModerationResult> {
        require_admin(caller)?;
        let identity = caller.identity()?;

        if self.store.find_kudos(id).await?.is_none() {
            return Err(ApiError::NotFound("Kudos not found.".to_string()));
        }

        let moderation = Moderation {
            is_visible: request.is_visible,
            moderated_by: identity.external_id,
            moderated_at: Utc::now(),
            reason: request.reason.clone().unwrap_or_default(),
        };

        // Deleted between the lookup and the update.
        if !self.dry_run && !self.store.update_moderation(id, &moderation).await? {
            return Err(ApiError::NotFound("Kudos not found.".to_string()));
        }

        tracing::info!(
            kudos_id = %id,
            is_visible = moderation.is_visible,
            moderator = %moderation.moderated_by,
            dry_run = self.dry_run,
            "Kudos visibility changed"
        );

        Ok(ModerationResult {
            id: id.to_string(),
            is_visible: moderation.is_visible,
            moderated_by: moderation.moderated_by,
            moderated_at: moderation.moderated_at,
            moderation_reason: moderation.reason,
            dry_run: self.dry_run,
        })
    }

    /// Permanently remove a kudos. Admin only.
    pub async fn delete(&self, id: &str, caller: &Principal) -> Result<DeleteResult> {
        require_admin(caller)?;

        if self.store.find_kudos(id).await?.is_none() {
            return Err(ApiError::NotFound("Kudos not found.".to_string()));
        }

        if !self.dry_run && !self.store.delete_kudos(id).await? {
            return Err(ApiError::NotFound("Kudos not found.".to_string()));
        }

        tracing::info!(kudos_id = %id, dry_run = self.dry_run, "Kudos deleted");

        Ok(DeleteResult {
            id: id.to_string(),
            deleted: true,
            dry_run: self.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, MockKudosStore};
    use crate::test_util::{admin, anonymous_admin, principal, seeded_store};
    use claim::{assert_err, assert_ok};

    fn request(to_user_id: &str, message: &str) -> CreateKudosRequest {
        CreateKudosRequest {
            to_user_id: to_user_id.to_string(),
            message: message.to_string(),
        }
    }

    async fn first_user(store: &InMemoryStore) -> User {
        store.list_users().await.unwrap().remove(0)
    }

    #[test]
    fn test_validate_message_length_boundary() {
        assert_ok!(validate_create(&request("u1", &"a".repeat(240))));
        let err = assert_err!(validate_create(&request("u1", &"a".repeat(241))));
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_validate_counts_after_trim() {
        let padded = format!("  {}  ", "a".repeat(240));
        assert_eq!(validate_create(&request("u1", &padded)).unwrap().len(), 240);
    }

    #[test]
    fn test_validate_counts_characters_not_bytes() {
        assert_ok!(validate_create(&request("u1", &"é".repeat(240))));
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        assert!(matches!(validate_create(&request("", "hi")), Err(ApiError::Validation(_))));
        assert!(matches!(validate_create(&request("   ", "hi")), Err(ApiError::Validation(_))));
        assert!(matches!(validate_create(&request("u1", "")), Err(ApiError::Validation(_))));
        assert!(matches!(validate_create(&request("u1", " \t ")), Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_provisions_first_time_sender() {
        let store = seeded_store().await;
        let recipient = first_user(&store).await;
        let service = KudosService::new(store.clone(), false);

        let kudos = service
            .create(&request(&recipient.id, "  Nice work!  "), &principal("u1", "New Person"))
            .await
            .unwrap();

        assert_ne!(kudos.id, DRY_RUN_ID);
        assert_eq!(kudos.message, "Nice work!");
        assert!(kudos.is_visible);
        assert_eq!(kudos.to_user_id, recipient.id);
        assert_eq!(kudos.to_user_name, recipient.name);
        assert_eq!(kudos.from_user_name, "New Person");
        assert_eq!(kudos.from_user_team, UNASSIGNED_TEAM);

        let sender = store.find_user_by_external_id("u1").await.unwrap().unwrap();
        assert_eq!(kudos.from_user_id, sender.id);
        assert_eq!(store.user_count().await, 6);

        // A second submission reuses the sender.
        service
            .create(&request(&recipient.id, "Again!"), &principal("u1", "New Person"))
            .await
            .unwrap();
        assert_eq!(store.user_count().await, 6);
        assert_eq!(store.kudos_count().await, 2);
    }

    #[tokio::test]
    async fn test_create_unknown_recipient_is_not_found() {
        let store = seeded_store().await;
        let service = KudosService::new(store.clone(), false);

        let err = service
            .create(&request("missing", "Hello"), &principal("u1", "Someone"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(store.kudos_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_validates_before_identity() {
        let store = seeded_store().await;
        let service = KudosService::new(store, false);

        let err = service
            .create(&request("", "Hello"), &anonymous_admin())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = service
            .create(&request("someone", "Hello"), &anonymous_admin())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_sender_name_falls_back_to_email() {
        let store = seeded_store().await;
        let recipient = first_user(&store).await;
        let mut blank = NewUser::new("", "Data");
        blank.external_id = "ext-blank".to_string();
        store.insert_user(blank).await.unwrap();
        let service = KudosService::new(store, false);

        let caller = Principal::new(
            crate::auth::ClaimSet::new()
                .with("sub", "ext-blank")
                .with("preferred_username", "blank@example.com"),
        );
        let kudos = service
            .create(&request(&recipient.id, "Thanks"), &caller)
            .await
            .unwrap();
        assert_eq!(kudos.from_user_name, "blank@example.com");
        assert_eq!(kudos.from_user_team, "Data");
    }

    #[tokio::test]
    async fn test_dry_run_create_persists_nothing() {
        let store = seeded_store().await;
        let recipient = first_user(&store).await;
        let service = KudosService::new(store.clone(), true);

        let kudos = service
            .create(&request(&recipient.id, "Thanks for the help!"), &principal("u1", "New Person"))
            .await
            .unwrap();

        assert_eq!(kudos.id, DRY_RUN_ID);
        assert_eq!(kudos.from_user_id, "u1");
        assert_eq!(kudos.from_user_name, "New Person");
        assert_eq!(store.user_count().await, 5);
        assert_eq!(store.kudos_count().await, 0);
    }

    #[tokio::test]
    async fn test_list_hides_hidden_from_non_admins() {
        let store = seeded_store().await;
        let recipient = first_user(&store).await;
        let service = KudosService::new(store.clone(), false);
        let author = principal("u1", "Author");

        let kept = service.create(&request(&recipient.id, "kept"), &author).await.unwrap();
        let hidden = service.create(&request(&recipient.id, "hidden"), &author).await.unwrap();
        service
            .set_visibility(
                &hidden.id,
                &VisibilityRequest { is_visible: false, reason: None },
                &admin("admin-1"),
            )
            .await
            .unwrap();

        let page = service.list(&KudosQuery::default(), &author).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, kept.id);

        let query = KudosQuery {
            search: Some("HIDDEN".to_string()),
            ..Default::default()
        };
        assert_eq!(service.list(&query, &author).await.unwrap().total, 0);
        assert_eq!(service.list(&query, &admin("admin-1")).await.unwrap().total, 1);

        let page = service.list(&KudosQuery::default(), &admin("admin-1")).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().any(|k| !k.is_visible));
    }

    #[tokio::test]
    async fn test_list_clamps_and_echoes_paging() {
        let store = seeded_store().await;
        let service = KudosService::new(store, true);
        let query = KudosQuery {
            page: Some(0),
            page_size: Some(500),
            ..Default::default()
        };
        let page = service.list(&query, &principal("u1", "Reader")).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 100);
        assert!(page.dry_run);
    }

    #[tokio::test]
    async fn test_list_filters_by_team_and_users() {
        let store = seeded_store().await;
        let users = store.list_users().await.unwrap();
        let service = KudosService::new(store.clone(), false);
        let author = principal("u1", "Author");
        for user in users.iter().take(3) {
            service.create(&request(&user.id, "thanks"), &author).await.unwrap();
        }

        let query = KudosQuery {
            team: Some(users[1].team.clone()),
            ..Default::default()
        };
        let page = service.list(&query, &author).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].to_user_id, users[1].id);

        let query = KudosQuery {
            to_user_id: Some(users[2].id.clone()),
            ..Default::default()
        };
        assert_eq!(service.list(&query, &author).await.unwrap().total, 1);

        let sender = store.find_user_by_external_id("u1").await.unwrap().unwrap();
        let query = KudosQuery {
            from_user_id: Some(sender.id),
            team: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(service.list(&query, &author).await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn test_set_visibility_records_moderation() {
        let store = seeded_store().await;
        let recipient = first_user(&store).await;
        let service = KudosService::new(store.clone(), false);
        let kudos = service
            .create(&request(&recipient.id, "Nice work!"), &principal("u1", "Author"))
            .await
            .unwrap();

        let result = service
            .set_visibility(
                &kudos.id,
                &VisibilityRequest { is_visible: false, reason: Some("test".to_string()) },
                &admin("admin-1"),
            )
            .await
            .unwrap();
        assert!(!result.is_visible);
        assert_eq!(result.moderated_by, "admin-1");
        assert_eq!(result.moderation_reason, "test");
        assert!(!result.dry_run);

        let stored = store.find_kudos(&kudos.id).await.unwrap().unwrap();
        assert!(!stored.is_visible);
        assert_eq!(stored.moderated_by.as_deref(), Some("admin-1"));
        assert_eq!(stored.moderated_at, Some(result.moderated_at));
        assert_eq!(stored.moderation_reason.as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn test_set_visibility_requires_admin() {
        let store = seeded_store().await;
        let recipient = first_user(&store).await;
        let service = KudosService::new(store.clone(), false);
        let author = principal("u1", "Author");
        let kudos = service.create(&request(&recipient.id, "Nice"), &author).await.unwrap();

        let err = service
            .set_visibility(
                &kudos.id,
                &VisibilityRequest { is_visible: false, reason: None },
                &author,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        let stored = store.find_kudos(&kudos.id).await.unwrap().unwrap();
        assert!(stored.is_visible);
        assert!(stored.moderated_by.is_none());
    }

    #[tokio::test]
    async fn test_set_visibility_admin_without_external_id_is_unauthorized() {
        let service = KudosService::new(seeded_store().await, false);
        let err = service
            .set_visibility(
                "any",
                &VisibilityRequest { is_visible: true, reason: None },
                &anonymous_admin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_moderation_of_unknown_kudos_is_not_found() {
        let service = KudosService::new(seeded_store().await, false);
        let visibility = VisibilityRequest { is_visible: true, reason: None };
        assert!(matches!(
            service.set_visibility("missing", &visibility, &admin("a")).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            service.delete("missing", &admin("a")).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_admin_and_removes() {
        let store = seeded_store().await;
        let recipient = first_user(&store).await;
        let service = KudosService::new(store.clone(), false);
        let author = principal("u1", "Author");
        let kudos = service.create(&request(&recipient.id, "Nice"), &author).await.unwrap();

        assert!(matches!(
            service.delete(&kudos.id, &author).await,
            Err(ApiError::Forbidden(_))
        ));
        assert_eq!(store.kudos_count().await, 1);

        let result = service.delete(&kudos.id, &admin("admin-1")).await.unwrap();
        assert!(result.deleted);
        assert!(!result.dry_run);
        assert_eq!(store.kudos_count().await, 0);
    }

    #[tokio::test]
    async fn test_dry_run_moderation_and_delete_leave_store_untouched() {
        let store = seeded_store().await;
        let recipient = first_user(&store).await;
        let writer = KudosService::new(store.clone(), false);
        let kudos = writer
            .create(&request(&recipient.id, "Nice"), &principal("u1", "Author"))
            .await
            .unwrap();

        let service = KudosService::new(store.clone(), true);
        let result = service
            .set_visibility(
                &kudos.id,
                &VisibilityRequest { is_visible: false, reason: Some("dry".to_string()) },
                &admin("admin-1"),
            )
            .await
            .unwrap();
        assert!(result.dry_run);
        assert!(!result.is_visible);

        let deleted = service.delete(&kudos.id, &admin("admin-1")).await.unwrap();
        assert!(deleted.dry_run);

        let stored = store.find_kudos(&kudos.id).await.unwrap().unwrap();
        assert!(stored.is_visible);
        assert!(stored.moderated_by.is_none());
        assert_eq!(store.kudos_count().await, 1);
    }

    #[tokio::test]
    async fn test_non_admin_moderation_never_reaches_store() {
        // No expectations: any store call would panic.
        let service = KudosService::new(Arc::new(MockKudosStore::new()), false);
        let caller = principal("u1", "Author");
        let visibility = VisibilityRequest { is_visible: false, reason: None };

        assert!(matches!(
            service.set_visibility("k1", &visibility, &caller).await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(service.delete("k1", &caller).await, Err(ApiError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_sender_created_concurrently_is_reused() {
        let recipient = NewUser::new("Avery Johnson", "Engineering").with_id("recipient");
        let mut winner = NewUser::new("Racing Caller", UNASSIGNED_TEAM);
        winner.external_id = "u1".to_string();
        let winner = winner.with_id("sender");

        let mut store = MockKudosStore::new();
        let mut lookups = 0;
        let existing = winner.clone();
        store.expect_find_user_by_external_id().returning(move |_| {
            lookups += 1;
            Ok((lookups > 1).then(|| existing.clone()))
        });
        store
            .expect_insert_user()
            .times(1)
            .returning(|_| Err(StoreError::Duplicate("externalId u1".to_string())));
        store
            .expect_find_user()
            .returning(move |_| Ok(Some(recipient.clone())));
        store
            .expect_insert_kudos()
            .times(1)
            .returning(|kudos| Ok(kudos.with_id("k1")));
        let service = KudosService::new(Arc::new(store), false);

        let kudos = service
            .create(&request("recipient", "Hello"), &principal("u1", "Racing Caller"))
            .await
            .unwrap();
        assert_eq!(kudos.from_user_id, "sender");
        assert_eq!(kudos.to_user_id, "recipient");
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_store_error() {
        let mut store = MockKudosStore::new();
        store
            .expect_find_user_by_external_id()
            .returning(|_| Err(StoreError::Backend("connection refused".to_string())));
        let service = KudosService::new(Arc::new(store), false);

        let err = service
            .create(&request("u2", "Hello"), &principal("u1", "Author"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Store(_)));
    }
}
