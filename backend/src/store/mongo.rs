use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use kudos_common::{Kudos, User};
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use super::{KudosFilter, KudosStore, Moderation, NewKudos, NewUser, StoreError};

const USERS: &str = "users";
const KUDOS: &str = "kudos";

const DUPLICATE_KEY: i32 = 11000;

fn backend(e: mongodb::error::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn insert_error(e: mongodb::error::Error) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = e.kind.as_ref() {
        if write_error.code == DUPLICATE_KEY {
            return StoreError::Duplicate(write_error.message.clone());
        }
    }
    backend(e)
}

/// Unparseable ids can never match a stored ObjectId.
fn object_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

fn required_object_id(field: &str, id: &str) -> Result<ObjectId, StoreError> {
    object_id(id).ok_or_else(|| StoreError::InvalidDocument(format!("{} is not an ObjectId: {}", field, id)))
}

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    team: String,
    #[serde(rename = "externalId", default)]
    external_id: String,
}

impl From<NewUser> for UserDocument {
    fn from(user: NewUser) -> Self {
        Self {
            id: None,
            name: user.name,
            team: user.team,
            external_id: user.external_id,
        }
    }
}

impl UserDocument {
    fn into_user(self) -> Result<User, StoreError> {
        let id = self
            .id
            .ok_or_else(|| StoreError::InvalidDocument("user without _id".to_string()))?;
        Ok(User {
            id: id.to_hex(),
            name: self.name,
            team: self.team,
            external_id: self.external_id,
        })
    }
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KudosDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    to_user_id: ObjectId,
    #[serde(default)]
    to_user_name: String,
    #[serde(default)]
    to_user_team: String,
    from_user_id: ObjectId,
    #[serde(default)]
    from_user_name: String,
    #[serde(default)]
    from_user_team: String,
    #[serde(default)]
    message: String,
    created_at: BsonDateTime,
    // Entries written before moderation existed have no flag.
    #[serde(default = "default_visible")]
    is_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    moderated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    moderated_at: Option<BsonDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    moderation_reason: Option<String>,
}

impl TryFrom<NewKudos> for KudosDocument {
    type Error = StoreError;

    fn try_from(kudos: NewKudos) -> Result<Self, Self::Error> {
        Ok(Self {
            id: None,
            to_user_id: required_object_id("toUserId", &kudos.to_user_id)?,
            to_user_name: kudos.to_user_name,
            to_user_team: kudos.to_user_team,
            from_user_id: required_object_id("fromUserId", &kudos.from_user_id)?,
            from_user_name: kudos.from_user_name,
            from_user_team: kudos.from_user_team,
            message: kudos.message,
            created_at: BsonDateTime::from_chrono(kudos.created_at),
            is_visible: true,
            moderated_by: None,
            moderated_at: None,
            moderation_reason: None,
        })
    }
}

impl KudosDocument {
    fn into_kudos(self) -> Result<Kudos, StoreError> {
        let id = self
            .id
            .ok_or_else(|| StoreError::InvalidDocument("kudos without _id".to_string()))?;
        Ok(Kudos {
            id: id.to_hex(),
            to_user_id: self.to_user_id.to_hex(),
            to_user_name: self.to_user_name,
            to_user_team: self.to_user_team,
            from_user_id: self.from_user_id.to_hex(),
            from_user_name: self.from_user_name,
            from_user_team: self.from_user_team,
            message: self.message,
            created_at: self.created_at.to_chrono(),
            is_visible: self.is_visible,
            moderated_by: self.moderated_by,
            moderated_at: self.moderated_at.map(|at| at.to_chrono()),
            moderation_reason: self.moderation_reason,
        })
    }
}

/// Build the query for `filter`, or `None` if an id filter cannot match.
fn filter_document(filter: &KudosFilter) -> Option<Document> {
    let mut query = Document::new();

    if filter.visible_only {
        query.insert("isVisible", doc! { "$ne": false });
    }
    if let Some(team) = &filter.team {
        query.insert("toUserTeam", team.as_str());
    }
    if let Some(id) = &filter.to_user_id {
        query.insert("toUserId", object_id(id)?);
    }
    if let Some(id) = &filter.from_user_id {
        query.insert("fromUserId", object_id(id)?);
    }
    if let Some(term) = &filter.search {
        let pattern = regex::escape(term);
        let matches = |field: &str| doc! { field: { "$regex": pattern.as_str(), "$options": "i" } };
        query.insert(
            "$or",
            vec![
                matches("message"),
                matches("toUserName"),
                matches("fromUserName"),
            ],
        );
    }

    Some(query)
}

/// MongoDB-backed store over the `users` and `kudos` collections.
pub struct MongoStore {
    db: Database,
    users: Collection<UserDocument>,
    kudos: Collection<KudosDocument>,
}

impl MongoStore {
    pub async fn connect(connection_string: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(connection_string).await.map_err(backend)?;
        let db = client.database(database);

        let store = Self {
            users: db.collection(USERS),
            kudos: db.collection(KUDOS),
            db,
        };
        store.ensure_indexes().await?;

        tracing::info!("Document store initialized with database: {}", database);
        Ok(store)
    }

    /// External ids, once set, identify exactly one user.
    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let external_id = IndexModel::builder()
            .keys(doc! { "externalId": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "externalId": { "$gt": "" } })
                    .build(),
            )
            .build();
        self.users
            .create_index(external_id, None)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn find_user_where(&self, query: Document) -> Result<Option<User>, StoreError> {
        self.users
            .find_one(query, None)
            .await
            .map_err(backend)?
            .map(UserDocument::into_user)
            .transpose()
    }
}

#[async_trait]
impl KudosStore for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let documents: Vec<UserDocument> = self
            .users
            .find(None, options)
            .await
            .map_err(backend)?
            .try_collect()
            .await
            .map_err(backend)?;

        documents.into_iter().map(UserDocument::into_user).collect()
    }

    async fn first_users(&self, limit: u64) -> Result<Vec<User>, StoreError> {
        // ObjectIds grow with insertion time.
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .limit(limit as i64)
            .build();
        let documents: Vec<UserDocument> = self
            .users
            .find(None, options)
            .await
            .map_err(backend)?
            .try_collect()
            .await
            .map_err(backend)?;

        documents.into_iter().map(UserDocument::into_user).collect()
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        match object_id(id) {
            Some(oid) => self.find_user_where(doc! { "_id": oid }).await,
            None => Ok(None),
        }
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        self.find_user_where(doc! { "externalId": external_id }).await
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut document = UserDocument::from(user);
        let result = self
            .users
            .insert_one(&document, None)
            .await
            .map_err(insert_error)?;
        document.id = result.inserted_id.as_object_id();
        document.into_user()
    }

    async fn insert_users(&self, users: Vec<NewUser>) -> Result<Vec<User>, StoreError> {
        if users.is_empty() {
            return Ok(Vec::new());
        }

        let mut documents: Vec<UserDocument> = users.into_iter().map(UserDocument::from).collect();
        let result = self
            .users
            .insert_many(&documents, None)
            .await
            .map_err(backend)?;
        let inserted: HashMap<usize, Bson> = result.inserted_ids;

        for (index, document) in documents.iter_mut().enumerate() {
            document.id = inserted.get(&index).and_then(Bson::as_object_id);
        }
        documents.into_iter().map(UserDocument::into_user).collect()
    }

    async fn has_users(&self) -> Result<bool, StoreError> {
        let count = self
            .users
            .estimated_document_count(None)
            .await
            .map_err(backend)?;
        Ok(count > 0)
    }

    async fn find_kudos(&self, id: &str) -> Result<Option<Kudos>, StoreError> {
        let Some(oid) = object_id(id) else {
            return Ok(None);
        };
        self.kudos
            .find_one(doc! { "_id": oid }, None)
            .await
            .map_err(backend)?
            .map(KudosDocument::into_kudos)
            .transpose()
    }

    async fn query_kudos(
        &self,
        filter: &KudosFilter,
        skip: u64,
        limit: u64,
    ) -> Result<(u64, Vec<Kudos>), StoreError> {
        let Some(query) = filter_document(filter) else {
            return Ok((0, Vec::new()));
        };

        let total = self
            .kudos
            .count_documents(query.clone(), None)
            .await
            .map_err(backend)?;

        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .skip(skip)
            .limit(limit as i64)
            .build();
        let documents: Vec<KudosDocument> = self
            .kudos
            .find(query, options)
            .await
            .map_err(backend)?
            .try_collect()
            .await
            .map_err(backend)?;

        let items = documents
            .into_iter()
            .map(KudosDocument::into_kudos)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((total, items))
    }

    async fn insert_kudos(&self, kudos: NewKudos) -> Result<Kudos, StoreError> {
        let mut document = KudosDocument::try_from(kudos)?;
        let result = self
            .kudos
            .insert_one(&document, None)
            .await
            .map_err(backend)?;
        document.id = result.inserted_id.as_object_id();
        document.into_kudos()
    }

    async fn insert_many_kudos(&self, kudos: Vec<NewKudos>) -> Result<(), StoreError> {
        if kudos.is_empty() {
            return Ok(());
        }

        let documents = kudos
            .into_iter()
            .map(KudosDocument::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        self.kudos
            .insert_many(documents, None)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn has_kudos(&self) -> Result<bool, StoreError> {
        let count = self
            .kudos
            .estimated_document_count(None)
            .await
            .map_err(backend)?;
        Ok(count > 0)
    }

    async fn update_moderation(&self, id: &str, moderation: &Moderation) -> Result<bool, StoreError> {
        let Some(oid) = object_id(id) else {
            return Ok(false);
        };
        let update = doc! {
            "$set": {
                "isVisible": moderation.is_visible,
                "moderatedBy": moderation.moderated_by.as_str(),
                "moderatedAt": BsonDateTime::from_chrono(moderation.moderated_at),
                "moderationReason": moderation.reason.as_str(),
            }
        };
        let result = self
            .kudos
            .update_one(doc! { "_id": oid }, update, None)
            .await
            .map_err(backend)?;
        Ok(result.matched_count > 0)
    }

    async fn delete_kudos(&self, id: &str) -> Result<bool, StoreError> {
        let Some(oid) = object_id(id) else {
            return Ok(false);
        };
        let result = self
            .kudos
            .delete_one(doc! { "_id": oid }, None)
            .await
            .map_err(backend)?;
        Ok(result.deleted_count > 0)
    }
}
