use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tracing::debug;

use crate::dao::{
    models::{
        FixtureEntity, PointsLogEntity, PostEntity, SquadEntity, VoteHistoryEntity,
        VoteModuleEntity, VoteResultEntity,
    },
    storage::StorageResult,
    vote_store::{VoteCommand, VoteOutcome, VoteStore, tally_vote},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchDocument, CouchModuleDocument, CouchVoterRecord, END_SUFFIX,
        FIXTURE_PREFIX, MODULE_PREFIX, POST_PREFIX, RESULT_PREFIX, RevisionOnly, fixture_doc_id,
        module_doc_id, points_prefix, post_doc_id, result_doc_id, squad_doc_id,
    },
};

/// Bound on revision-checked write retries after `409 Conflict`.
const MAX_WRITE_ATTEMPTS: u32 = 8;

/// Outcome of a revision-checked PUT.
enum PutStatus {
    Written,
    Conflict,
}

#[derive(Clone)]
pub struct CouchVoteStore {
    client: Client,
    /// `{base_url}/{database}`; documents are pushed as one encoded segment below it.
    database_url: Arc<Url>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchVoteStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let store = Self::new(config)?;
        store.ensure_database().await?;
        Ok(store)
    }

    fn new(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::Client { source })?;

        let invalid = || CouchDaoError::InvalidBaseUrl {
            url: config.base_url.clone(),
        };
        let mut database_url = Url::parse(&config.base_url).map_err(|_| invalid())?;
        database_url
            .path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .push(&config.database);

        let auth = config.credentials.map(|credentials| {
            (
                Arc::<str>::from(credentials.username),
                Arc::<str>::from(credentials.password),
            )
        });

        Ok(Self {
            client,
            database_url: Arc::new(database_url),
            database: Arc::from(config.database),
            auth,
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    /// URL of `doc_id`, percent-encoded as a single path segment.
    fn document_url(&self, doc_id: &str) -> CouchResult<Url> {
        let mut url = Url::clone(&self.database_url);
        url.path_segments_mut()
            .map_err(|()| CouchDaoError::InvalidBaseUrl {
                url: self.database_url.to_string(),
            })?
            .push(doc_id);
        Ok(url)
    }

    fn request(&self, method: Method, doc_id: &str) -> CouchResult<reqwest::RequestBuilder> {
        let url = self.document_url(doc_id)?;
        Ok(self.authorize(self.client.request(method, url)))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = Url::clone(&self.database_url);

        let response = self
            .authorize(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|source| CouchDaoError::Database {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::Database {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)?
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                doc_id: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::Decode {
                        doc_id: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::Status {
                doc_id: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document; the `_rev` inside the payload decides whether CouchDB
    /// accepts it or answers `409 Conflict`.
    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<PutStatus>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)?
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                doc_id: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(PutStatus::Conflict),
            status if status.is_success() => Ok(PutStatus::Written),
            status => Err(CouchDaoError::Status {
                doc_id: doc_id.to_string(),
                status,
            }),
        }
    }

    async fn current_rev(&self, doc_id: &str) -> CouchResult<Option<String>> {
        Ok(self
            .get_document::<RevisionOnly>(doc_id)
            .await?
            .map(|doc| doc.rev))
    }

    /// Overwrite `body` at `doc_id`, re-reading the revision on every conflict.
    async fn upsert<T>(&self, doc_id: String, body: T) -> CouchResult<()>
    where
        T: Serialize + Clone,
    {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let rev = self.current_rev(&doc_id).await?;
            let document = CouchDocument::new(doc_id.clone(), rev, body.clone());
            if let PutStatus::Written = self.put_document(&doc_id, &document).await? {
                return Ok(());
            }
        }
        Err(CouchDaoError::WriteContention {
            doc_id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    /// Write `body` only when no document exists at `doc_id`.
    async fn insert_if_absent<T>(&self, doc_id: String, body: T) -> CouchResult<bool>
    where
        T: Serialize,
    {
        let document = CouchDocument::new(doc_id.clone(), None, body);
        match self.put_document(&doc_id, &document).await? {
            PutStatus::Written => Ok(true),
            PutStatus::Conflict => Ok(false),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let encode = |key: String| {
            serde_json::to_string(&key).map_err(|source| CouchDaoError::EncodeKey { source })
        };
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", encode(prefix.to_owned())?),
            ("endkey", encode(format!("{prefix}{END_SUFFIX}"))?),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)?
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                doc_id: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::Status {
                doc_id: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::Decode {
                doc_id: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::Document {
                    doc_id: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    async fn list_bodies<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        Ok(self
            .list_documents::<CouchDocument<T>>(prefix)
            .await?
            .into_iter()
            .map(|doc| doc.body)
            .collect())
    }

    async fn find_module_document(&self, id: &str) -> CouchResult<Option<CouchModuleDocument>> {
        self.get_document::<CouchModuleDocument>(&module_doc_id(id))
            .await
    }

    async fn save_module(&self, module: VoteModuleEntity) -> CouchResult<()> {
        let doc_id = module_doc_id(&module.id);
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut document = match self.find_module_document(&module.id).await? {
                Some(existing) => CouchModuleDocument {
                    module: module.clone(),
                    ..existing
                },
                None => CouchModuleDocument::new(module.clone()),
            };
            document.id = doc_id.clone();
            if let PutStatus::Written = self.put_document(&doc_id, &document).await? {
                return Ok(());
            }
        }
        Err(CouchDaoError::WriteContention {
            doc_id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    async fn lock_module(&self, id: String) -> CouchResult<Option<VoteModuleEntity>> {
        let doc_id = module_doc_id(&id);
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let Some(mut document) = self.find_module_document(&id).await? else {
                return Ok(None);
            };
            if document.module.locked {
                return Ok(Some(document.module));
            }
            document.module.locked = true;
            document.module.updated_at = SystemTime::now();
            if let PutStatus::Written = self.put_document(&doc_id, &document).await? {
                return Ok(Some(document.module));
            }
        }
        Err(CouchDaoError::WriteContention {
            doc_id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    /// Read the module at its current revision, apply the vote and write it
    /// back with that revision. A concurrent writer turns the PUT into a
    /// conflict and the vote is re-evaluated against the newer revision.
    async fn cast_vote(&self, command: VoteCommand) -> CouchResult<VoteOutcome> {
        let doc_id = module_doc_id(&command.module_id);
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let Some(mut document) = self.find_module_document(&command.module_id).await? else {
                return Ok(VoteOutcome::ModuleNotFound);
            };

            let already_voted = document.voters.contains_key(&command.user_id);
            if let Err(rejection) = tally_vote(&mut document.module, already_voted, &command) {
                return Ok(rejection.into());
            }
            document.voters.insert(
                command.user_id.clone(),
                CouchVoterRecord {
                    candidate_id: command.candidate_id.clone(),
                    voted_at: command.voted_at,
                },
            );

            match self.put_document(&doc_id, &document).await? {
                PutStatus::Written => return Ok(VoteOutcome::Recorded(document.module)),
                PutStatus::Conflict => {
                    debug!(
                        module_id = %command.module_id,
                        attempt,
                        "vote write conflicted; retrying"
                    );
                }
            }
        }
        Err(CouchDaoError::WriteContention {
            doc_id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }
}

impl VoteStore for CouchVoteStore {
    fn create_module(&self, module: VoteModuleEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let document = CouchModuleDocument::new(module);
            let doc_id = document.id.clone();
            match store.put_document(&doc_id, &document).await? {
                PutStatus::Written => Ok(true),
                PutStatus::Conflict => Ok(false),
            }
        })
    }

    fn save_module(&self, module: VoteModuleEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_module(module).await.map_err(Into::into) })
    }

    fn find_module(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteModuleEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store.find_module_document(&id).await?;
            Ok(document.map(|doc| doc.module))
        })
    }

    fn list_modules(&self) -> BoxFuture<'static, StorageResult<Vec<VoteModuleEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchModuleDocument>(MODULE_PREFIX)
                .await?;
            Ok(docs.into_iter().map(|doc| doc.module).collect())
        })
    }

    fn lock_module(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteModuleEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.lock_module(id).await.map_err(Into::into) })
    }

    fn cast_vote(&self, command: VoteCommand) -> BoxFuture<'static, StorageResult<VoteOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.cast_vote(command).await.map_err(Into::into) })
    }

    fn find_history(
        &self,
        module_id: String,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteHistoryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store.find_module_document(&module_id).await?;
            Ok(document.and_then(|doc| doc.history_of(&user_id)))
        })
    }

    fn list_history(
        &self,
        module_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteHistoryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store.find_module_document(&module_id).await?;
            Ok(document.map(|doc| doc.history()).unwrap_or_default())
        })
    }

    fn create_result(&self, result: VoteResultEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = result_doc_id(&result.module_id);
            store
                .insert_if_absent(doc_id, result)
                .await
                .map_err(Into::into)
        })
    }

    fn find_result(
        &self,
        module_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteResultEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .get_document::<CouchDocument<VoteResultEntity>>(&result_doc_id(&module_id))
                .await?;
            Ok(document.map(|doc| doc.body))
        })
    }

    fn list_results(&self) -> BoxFuture<'static, StorageResult<Vec<VoteResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_bodies(RESULT_PREFIX).await.map_err(Into::into) })
    }

    fn save_fixtures(&self, fixtures: Vec<FixtureEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            for fixture in fixtures {
                store.upsert(fixture_doc_id(&fixture.id), fixture).await?;
            }
            Ok(())
        })
    }

    fn list_fixtures(&self) -> BoxFuture<'static, StorageResult<Vec<FixtureEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_bodies(FIXTURE_PREFIX).await.map_err(Into::into) })
    }

    fn list_fixtures_between(
        &self,
        from: SystemTime,
        to: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<FixtureEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let fixtures: Vec<FixtureEntity> = store.list_bodies(FIXTURE_PREFIX).await?;
            Ok(fixtures
                .into_iter()
                .filter(|fixture| fixture.kickoff >= from && fixture.kickoff < to)
                .collect())
        })
    }

    fn save_squad(&self, squad: SquadEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert(squad_doc_id(&squad.id), squad)
                .await
                .map_err(Into::into)
        })
    }

    fn find_squad(
        &self,
        team_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<SquadEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .get_document::<CouchDocument<SquadEntity>>(&squad_doc_id(&team_id))
                .await?;
            Ok(document.map(|doc| doc.body))
        })
    }

    fn save_posts(&self, posts: Vec<PostEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            for post in posts {
                store.upsert(post_doc_id(&post.id), post).await?;
            }
            Ok(())
        })
    }

    fn list_recent_posts(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<PostEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut posts: Vec<PostEntity> = store.list_bodies(POST_PREFIX).await?;
            posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
            posts.truncate(limit);
            Ok(posts)
        })
    }

    fn append_points(&self, log: PointsLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = format!("{}{}", points_prefix(&log.user_id), log.id.simple());
            store.insert_if_absent(doc_id, log).await?;
            Ok(())
        })
    }

    fn list_points(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PointsLogEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_bodies(&points_prefix(&user_id))
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let database = store.database.to_string();
            let response = store
                .authorize(store.client.get(Url::clone(&store.database_url)))
                .send()
                .await
                .map_err(|source| CouchDaoError::Database {
                    database: database.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::DatabaseStatus {
                    database,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeMap, HashMap},
        sync::{Arc, Mutex},
        time::Duration,
    };

    use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::StatusCode as HttpStatus,
        response::{IntoResponse, Response},
        routing::get,
    };
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use uuid::Uuid;

    use super::*;
    use crate::dao::{
        storage::StorageError,
        vote_store::fixtures::{candidate, module},
    };

    /// In-process CouchDB answering the handful of endpoints the store uses.
    #[derive(Default)]
    struct FakeCouch {
        docs: BTreeMap<String, Value>,
        revision: u64,
        /// PUTs answered with `409` before revisions are even looked at.
        forced_conflicts: u32,
        module_puts: u32,
        /// `(database, doc_id)` of every document request, as decoded by the server.
        seen: Vec<(String, String)>,
    }

    type Fake = Arc<Mutex<FakeCouch>>;

    async fn database() -> HttpStatus {
        HttpStatus::OK
    }

    async fn get_doc(
        State(fake): State<Fake>,
        Path((db, doc_id)): Path<(String, String)>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Response {
        let mut fake = fake.lock().unwrap();
        fake.seen.push((db, doc_id.clone()));

        if doc_id == "_all_docs" {
            let keys = query.get("startkey").zip(query.get("endkey")).and_then(|(start, end)| {
                let start = serde_json::from_str::<String>(start).ok()?;
                let end = serde_json::from_str::<String>(end).ok()?;
                Some((start, end))
            });
            let Some((start, end)) = keys else {
                return HttpStatus::BAD_REQUEST.into_response();
            };
            let rows: Vec<Value> = fake
                .docs
                .range(start..=end)
                .map(|(_, doc)| json!({ "doc": doc }))
                .collect();
            return Json(json!({ "rows": rows })).into_response();
        }

        match fake.docs.get(&doc_id) {
            Some(doc) => Json(doc.clone()).into_response(),
            None => HttpStatus::NOT_FOUND.into_response(),
        }
    }

    async fn put_doc(
        State(fake): State<Fake>,
        Path((db, doc_id)): Path<(String, String)>,
        Json(mut body): Json<Value>,
    ) -> Response {
        let mut fake = fake.lock().unwrap();
        fake.seen.push((db, doc_id.clone()));
        if doc_id.starts_with(MODULE_PREFIX) {
            fake.module_puts += 1;
        }
        if fake.forced_conflicts > 0 {
            fake.forced_conflicts -= 1;
            return HttpStatus::CONFLICT.into_response();
        }

        let current = fake.docs.get(&doc_id).and_then(|doc| doc.get("_rev")).cloned();
        if body.get("_rev").cloned() != current {
            return HttpStatus::CONFLICT.into_response();
        }

        fake.revision += 1;
        let rev = format!("{}-fake", fake.revision);
        body["_rev"] = json!(rev);
        fake.docs.insert(doc_id.clone(), body);
        (
            HttpStatus::CREATED,
            Json(json!({ "ok": true, "id": doc_id, "rev": rev })),
        )
            .into_response()
    }

    async fn fake_store(fake: Fake) -> CouchVoteStore {
        let app = Router::new()
            .route("/{db}", get(database).put(database))
            .route("/{db}/{doc}", get(get_doc).put(put_doc))
            .with_state(fake);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let config = CouchConfig::new(&format!("http://{addr}"), None).unwrap();
        CouchVoteStore::connect(config).await.unwrap()
    }

    fn vote(user: &str, candidate_id: &str) -> VoteCommand {
        VoteCommand {
            module_id: "leinster_m1".into(),
            user_id: user.into(),
            candidate_id: candidate_id.into(),
            voted_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_100),
        }
    }

    async fn seeded(fake: &Fake) -> CouchVoteStore {
        let store = fake_store(fake.clone()).await;
        let created = VoteStore::create_module(
            &store,
            module("leinster_m1", vec![candidate("a", 3), candidate("b", 5)]),
        )
        .await
        .unwrap();
        assert!(created);
        store
    }

    fn offline_store() -> CouchVoteStore {
        CouchVoteStore::new(CouchConfig::new("http://couch:5984/", None).unwrap()).unwrap()
    }

    #[test]
    fn document_ids_stay_inside_the_database() {
        let store = offline_store();

        let traversal = store
            .document_url(&module_doc_id("a/../../_users/org.couchdb.user:bob"))
            .unwrap();
        let segments: Vec<&str> = traversal.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "venuescope");
        assert!(segments[1].starts_with("module::a%2F..%2F..%2F_users"));

        let query = store.document_url(&module_doc_id("x?rev=1")).unwrap();
        assert_eq!(query.query(), None);
        assert_eq!(query.path_segments().unwrap().count(), 2);
    }

    #[test]
    fn base_url_path_is_kept() {
        let store =
            CouchVoteStore::new(CouchConfig::new("https://db.example/couch", None).unwrap())
                .unwrap();
        assert_eq!(
            store.document_url("module::x").unwrap().as_str(),
            "https://db.example/couch/venuescope/module::x"
        );
    }

    #[tokio::test]
    async fn unusual_ids_reach_the_server_as_one_document() {
        let fake = Fake::default();
        let store = fake_store(fake.clone()).await;

        let found = VoteStore::find_module(&store, "a/../../_users/org.couchdb.user:bob".into())
            .await
            .unwrap();
        assert!(found.is_none());

        let found = VoteStore::find_module(&store, "x?rev=1".into()).await.unwrap();
        assert!(found.is_none());

        let seen = fake.lock().unwrap().seen.clone();
        assert_eq!(
            seen,
            [
                (
                    "venuescope".to_string(),
                    "module::a/../../_users/org.couchdb.user:bob".to_string()
                ),
                ("venuescope".to_string(), "module::x?rev=1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn quoted_user_ids_list_their_own_points() {
        let fake = Fake::default();
        let store = fake_store(fake.clone()).await;
        let user = "fan\"1";

        assert!(VoteStore::list_points(&store, user.into()).await.unwrap().is_empty());

        VoteStore::append_points(
            &store,
            PointsLogEntity {
                id: Uuid::new_v4(),
                user_id: user.into(),
                action: "mom_vote".into(),
                points: 5,
                reference: Some("leinster_m1".into()),
                created_at: SystemTime::UNIX_EPOCH,
            },
        )
        .await
        .unwrap();

        let entries = VoteStore::list_points(&store, user.into()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, user);
        assert!(VoteStore::list_points(&store, "fan".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conflicted_vote_is_retried_and_counted_once() {
        let fake = Fake::default();
        let store = seeded(&fake).await;
        fake.lock().unwrap().forced_conflicts = 1;

        let outcome = VoteStore::cast_vote(&store, vote("u1", "a")).await.unwrap();
        let recorded = match outcome {
            VoteOutcome::Recorded(module) => module,
            other => panic!("expected a recorded vote, got {other:?}"),
        };
        assert_eq!(recorded.candidates[0].votes, 4);
        assert_eq!(recorded.candidates[1].votes, 5);

        // creation, the conflicted write and the retry
        assert_eq!(fake.lock().unwrap().module_puts, 3);

        let stored = VoteStore::find_module(&store, "leinster_m1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.candidates[0].votes, 4);
        let history = VoteStore::list_history(&store, "leinster_m1".into()).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn parallel_votes_from_one_user_count_once() {
        let fake = Fake::default();
        let store = seeded(&fake).await;

        let ballots = (0..6).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { VoteStore::cast_vote(&store, vote("u1", "a")).await })
        });
        let outcomes = futures::future::join_all(ballots).await;

        let mut recorded = 0;
        for outcome in outcomes {
            match outcome.unwrap().unwrap() {
                VoteOutcome::Recorded(_) => recorded += 1,
                VoteOutcome::AlreadyVoted => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(recorded, 1);

        let stored = VoteStore::find_module(&store, "leinster_m1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.candidates[0].votes, 4);
        assert_eq!(stored.candidates[1].votes, 5);
        let history = VoteStore::list_history(&store, "leinster_m1".into()).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn parallel_votes_from_different_users_all_land() {
        let fake = Fake::default();
        let store = seeded(&fake).await;

        let ballots = (0..6).map(|i| {
            let store = store.clone();
            tokio::spawn(
                async move { VoteStore::cast_vote(&store, vote(&format!("u{i}"), "b")).await },
            )
        });
        for outcome in futures::future::join_all(ballots).await {
            assert!(matches!(outcome.unwrap().unwrap(), VoteOutcome::Recorded(_)));
        }

        let stored = VoteStore::find_module(&store, "leinster_m1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.candidates[1].votes, 11);
    }

    #[tokio::test]
    async fn endless_conflicts_surface_as_contention() {
        let fake = Fake::default();
        let store = seeded(&fake).await;
        fake.lock().unwrap().forced_conflicts = u32::MAX;

        let err = VoteStore::cast_vote(&store, vote("u1", "a")).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Contention {
                attempts: MAX_WRITE_ATTEMPTS,
                ..
            }
        ));

        fake.lock().unwrap().forced_conflicts = 0;
        let stored = VoteStore::find_module(&store, "leinster_m1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.candidates[0].votes, 3);
        assert!(
            VoteStore::list_history(&store, "leinster_m1".into())
                .await
                .unwrap()
                .is_empty()
        );
    }
}
