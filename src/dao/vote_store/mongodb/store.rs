use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database,
    bson::{DateTime, doc},
    error::{
        Error as MongoError, ErrorKind, TRANSIENT_TRANSACTION_ERROR,
        UNKNOWN_TRANSACTION_COMMIT_RESULT, WriteFailure,
    },
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::{ConnectPolicy, establish_connection, ping},
    error::{MongoDaoError, MongoResult},
    models::{
        MongoFixtureDocument, MongoPointsLogDocument, MongoPostDocument, MongoSquadDocument,
        MongoVoteHistoryDocument, MongoVoteModuleDocument, MongoVoteResultDocument, doc_id,
        history_doc_id,
    },
};
use crate::dao::{
    models::{
        FixtureEntity, PointsLogEntity, PostEntity, SquadEntity, VoteHistoryEntity,
        VoteModuleEntity, VoteResultEntity,
    },
    storage::StorageResult,
    vote_store::{VoteCommand, VoteOutcome, VoteStore, tally_vote},
};

const MODULE_COLLECTION_NAME: &str = "vote_modules";
const HISTORY_COLLECTION_NAME: &str = "vote_history";
const RESULT_COLLECTION_NAME: &str = "vote_results";
const FIXTURE_COLLECTION_NAME: &str = "fixtures";
const SQUAD_COLLECTION_NAME: &str = "teams";
const POST_COLLECTION_NAME: &str = "posts";
const POINTS_COLLECTION_NAME: &str = "points_logs";

const DUPLICATE_KEY_CODE: i32 = 11000;
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;
const MAX_COMMIT_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct MongoVoteStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        ping(&database)
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(
            &self.config.options,
            &self.config.database_name,
            ConnectPolicy::QUICK,
        )
        .await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl MongoVoteStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    ///
    /// Votes run in multi-document transactions, so the server must be a
    /// replica set or a sharded cluster.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name, ConnectPolicy::PATIENT)
                .await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, mongodb::bson::Document); 5] = [
            (HISTORY_COLLECTION_NAME, "module_id", doc! {"module_id": 1}),
            (MODULE_COLLECTION_NAME, "team_id", doc! {"team_id": 1, "kickoff": -1}),
            (FIXTURE_COLLECTION_NAME, "kickoff", doc! {"kickoff": 1}),
            (POST_COLLECTION_NAME, "created_at", doc! {"created_at": -1}),
            (POINTS_COLLECTION_NAME, "user_id", doc! {"user_id": 1, "created_at": -1}),
        ];

        for (collection_name, index_name, keys) in indexes {
            let collection = database.collection::<mongodb::bson::Document>(collection_name);
            let index = mongodb::IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection_name}_{index_name}_idx")))
                        .build(),
                )
                .build();

            collection
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: collection_name,
                    index: index_name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn create_module(&self, module: VoteModuleEntity) -> MongoResult<bool> {
        let id = module.id.clone();
        let document: MongoVoteModuleDocument = module.into();
        let collection = self
            .collection::<MongoVoteModuleDocument>(MODULE_COLLECTION_NAME)
            .await;

        match collection.insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::SaveModule { id, source }),
        }
    }

    async fn save_module(&self, module: VoteModuleEntity) -> MongoResult<()> {
        let id = module.id.clone();
        let document: MongoVoteModuleDocument = module.into();
        self.collection::<MongoVoteModuleDocument>(MODULE_COLLECTION_NAME)
            .await
            .replace_one(doc_id(&id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveModule { id, source })?;
        Ok(())
    }

    async fn find_module(&self, id: String) -> MongoResult<Option<VoteModuleEntity>> {
        let document = self
            .collection::<MongoVoteModuleDocument>(MODULE_COLLECTION_NAME)
            .await
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadModule { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_modules(&self) -> MongoResult<Vec<VoteModuleEntity>> {
        let documents: Vec<MongoVoteModuleDocument> = self
            .collection::<MongoVoteModuleDocument>(MODULE_COLLECTION_NAME)
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListModules { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListModules { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn lock_module(&self, id: String) -> MongoResult<Option<VoteModuleEntity>> {
        let document = self
            .collection::<MongoVoteModuleDocument>(MODULE_COLLECTION_NAME)
            .await
            .find_one_and_update(
                doc_id(&id),
                doc! {"$set": {"locked": true, "updated_at": DateTime::now()}},
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveModule { id, source })?;
        Ok(document.map(Into::into))
    }

    /// Run the vote inside a session transaction, retrying the whole
    /// transaction on transient errors (write conflicts with a concurrent vote).
    async fn cast_vote(&self, command: VoteCommand) -> MongoResult<VoteOutcome> {
        let client = self.client().await;
        let database = self.database().await;
        let modules = database.collection::<MongoVoteModuleDocument>(MODULE_COLLECTION_NAME);
        let history = database.collection::<MongoVoteHistoryDocument>(HISTORY_COLLECTION_NAME);
        let cast_error = |source| MongoDaoError::CastVote {
            module_id: command.module_id.clone(),
            source,
        };

        let mut session = client.start_session().await.map_err(cast_error)?;

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            session.start_transaction().await.map_err(cast_error)?;

            match vote_transaction(&modules, &history, &mut session, &command).await {
                Ok(outcome @ VoteOutcome::Recorded(_)) => {
                    match commit_with_retry(&mut session).await {
                        Ok(()) => return Ok(outcome),
                        Err(err) if err.contains_label(TRANSIENT_TRANSACTION_ERROR) => {
                            debug!(
                                module_id = %command.module_id,
                                attempt,
                                "vote commit conflicted; retrying"
                            );
                        }
                        Err(err) => return Err(cast_error(err)),
                    }
                }
                Ok(rejected) => {
                    let _ = session.abort_transaction().await;
                    return Ok(rejected);
                }
                Err(err) if err.contains_label(TRANSIENT_TRANSACTION_ERROR) => {
                    let _ = session.abort_transaction().await;
                    debug!(
                        module_id = %command.module_id,
                        attempt,
                        "vote transaction conflicted; retrying"
                    );
                }
                // The composite history `_id` rejects a racing second marker.
                Err(err) if is_duplicate_key(&err) => {
                    let _ = session.abort_transaction().await;
                    return Ok(VoteOutcome::AlreadyVoted);
                }
                Err(err) => {
                    let _ = session.abort_transaction().await;
                    return Err(cast_error(err));
                }
            }
        }

        Err(MongoDaoError::TransactionContention {
            module_id: command.module_id.clone(),
            attempts: MAX_TRANSACTION_ATTEMPTS,
        })
    }

    async fn find_history(
        &self,
        module_id: String,
        user_id: String,
    ) -> MongoResult<Option<VoteHistoryEntity>> {
        let document = self
            .collection::<MongoVoteHistoryDocument>(HISTORY_COLLECTION_NAME)
            .await
            .find_one(doc_id(&history_doc_id(&module_id, &user_id)))
            .await
            .map_err(|source| MongoDaoError::LoadHistory { module_id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_history(&self, module_id: String) -> MongoResult<Vec<VoteHistoryEntity>> {
        let cursor = self
            .collection::<MongoVoteHistoryDocument>(HISTORY_COLLECTION_NAME)
            .await
            .find(doc! {"module_id": module_id.as_str()})
            .await;
        let documents: Vec<MongoVoteHistoryDocument> = match cursor {
            Ok(cursor) => cursor.try_collect().await,
            Err(err) => Err(err),
        }
        .map_err(|source| MongoDaoError::LoadHistory { module_id, source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn create_result(&self, result: VoteResultEntity) -> MongoResult<bool> {
        let module_id = result.module_id.clone();
        let document: MongoVoteResultDocument = result.into();
        match self
            .collection::<MongoVoteResultDocument>(RESULT_COLLECTION_NAME)
            .await
            .insert_one(&document)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::SaveResult { module_id, source }),
        }
    }

    async fn find_result(&self, module_id: String) -> MongoResult<Option<VoteResultEntity>> {
        let document = self
            .collection::<MongoVoteResultDocument>(RESULT_COLLECTION_NAME)
            .await
            .find_one(doc_id(&module_id))
            .await
            .map_err(|source| MongoDaoError::LoadResults { source })?;
        Ok(document.map(Into::into))
    }

    async fn list_results(&self) -> MongoResult<Vec<VoteResultEntity>> {
        let documents: Vec<MongoVoteResultDocument> = self
            .collection::<MongoVoteResultDocument>(RESULT_COLLECTION_NAME)
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::LoadResults { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadResults { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_fixtures(&self, fixtures: Vec<FixtureEntity>) -> MongoResult<()> {
        let collection = self
            .collection::<MongoFixtureDocument>(FIXTURE_COLLECTION_NAME)
            .await;
        for fixture in fixtures {
            let id = fixture.id.clone();
            let document: MongoFixtureDocument = fixture.into();
            collection
                .replace_one(doc_id(&id), &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::SaveFixture { id, source })?;
        }
        Ok(())
    }

    async fn find_fixtures(
        &self,
        filter: mongodb::bson::Document,
    ) -> MongoResult<Vec<FixtureEntity>> {
        let documents: Vec<MongoFixtureDocument> = self
            .collection::<MongoFixtureDocument>(FIXTURE_COLLECTION_NAME)
            .await
            .find(filter)
            .sort(doc! {"kickoff": 1})
            .await
            .map_err(|source| MongoDaoError::LoadFixtures { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadFixtures { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_squad(&self, squad: SquadEntity) -> MongoResult<()> {
        let id = squad.id.clone();
        let document: MongoSquadDocument = squad.into();
        self.collection::<MongoSquadDocument>(SQUAD_COLLECTION_NAME)
            .await
            .replace_one(doc_id(&id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSquad { id, source })?;
        Ok(())
    }

    async fn find_squad(&self, id: String) -> MongoResult<Option<SquadEntity>> {
        let document = self
            .collection::<MongoSquadDocument>(SQUAD_COLLECTION_NAME)
            .await
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadSquad { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn save_posts(&self, posts: Vec<PostEntity>) -> MongoResult<()> {
        let collection = self.collection::<MongoPostDocument>(POST_COLLECTION_NAME).await;
        for post in posts {
            let id = post.id.clone();
            let document: MongoPostDocument = post.into();
            collection
                .replace_one(doc_id(&id), &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::SavePost { id, source })?;
        }
        Ok(())
    }

    async fn list_recent_posts(&self, limit: usize) -> MongoResult<Vec<PostEntity>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let documents: Vec<MongoPostDocument> = self
            .collection::<MongoPostDocument>(POST_COLLECTION_NAME)
            .await
            .find(doc! {})
            .sort(doc! {"created_at": -1, "_id": 1})
            .limit(limit)
            .await
            .map_err(|source| MongoDaoError::LoadPosts { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadPosts { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn append_points(&self, log: PointsLogEntity) -> MongoResult<()> {
        let user_id = log.user_id.clone();
        let document: MongoPointsLogDocument = log.into();
        self.collection::<MongoPointsLogDocument>(POINTS_COLLECTION_NAME)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SavePoints { user_id, source })?;
        Ok(())
    }

    async fn list_points(&self, user_id: String) -> MongoResult<Vec<PointsLogEntity>> {
        let cursor = self
            .collection::<MongoPointsLogDocument>(POINTS_COLLECTION_NAME)
            .await
            .find(doc! {"user_id": user_id.as_str()})
            .sort(doc! {"created_at": -1})
            .await;
        let documents: Vec<MongoPointsLogDocument> = match cursor {
            Ok(cursor) => cursor.try_collect().await,
            Err(err) => Err(err),
        }
        .map_err(|source| MongoDaoError::LoadPoints { user_id, source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }
}

/// Body of one vote transaction attempt.
async fn vote_transaction(
    modules: &Collection<MongoVoteModuleDocument>,
    history: &Collection<MongoVoteHistoryDocument>,
    session: &mut ClientSession,
    command: &VoteCommand,
) -> Result<VoteOutcome, MongoError> {
    let Some(document) = modules
        .find_one(doc_id(&command.module_id))
        .session(&mut *session)
        .await?
    else {
        return Ok(VoteOutcome::ModuleNotFound);
    };

    let already_voted = history
        .find_one(doc_id(&history_doc_id(&command.module_id, &command.user_id)))
        .session(&mut *session)
        .await?
        .is_some();

    let mut module: VoteModuleEntity = document.into();
    if let Err(rejection) = tally_vote(&mut module, already_voted, command) {
        return Ok(rejection.into());
    }

    let updated: MongoVoteModuleDocument = module.clone().into();
    modules
        .replace_one(doc_id(&module.id), &updated)
        .session(&mut *session)
        .await?;

    let marker: MongoVoteHistoryDocument = command.history().into();
    history.insert_one(&marker).session(&mut *session).await?;

    Ok(VoteOutcome::Recorded(module))
}

async fn commit_with_retry(session: &mut ClientSession) -> Result<(), MongoError> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Err(err)
                if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_COMMIT_ATTEMPTS =>
            {
                attempt += 1;
            }
            other => return other,
        }
    }
}

impl VoteStore for MongoVoteStore {
    fn create_module(&self, module: VoteModuleEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.create_module(module).await.map_err(Into::into) })
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
        Box::pin(async move { store.find_module(id).await.map_err(Into::into) })
    }

    fn list_modules(&self) -> BoxFuture<'static, StorageResult<Vec<VoteModuleEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_modules().await.map_err(Into::into) })
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
            store
                .find_history(module_id, user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_history(
        &self,
        module_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteHistoryEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_history(module_id).await.map_err(Into::into) })
    }

    fn create_result(&self, result: VoteResultEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.create_result(result).await.map_err(Into::into) })
    }

    fn find_result(
        &self,
        module_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_result(module_id).await.map_err(Into::into) })
    }

    fn list_results(&self) -> BoxFuture<'static, StorageResult<Vec<VoteResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_results().await.map_err(Into::into) })
    }

    fn save_fixtures(&self, fixtures: Vec<FixtureEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_fixtures(fixtures).await.map_err(Into::into) })
    }

    fn list_fixtures(&self) -> BoxFuture<'static, StorageResult<Vec<FixtureEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_fixtures(doc! {}).await.map_err(Into::into) })
    }

    fn list_fixtures_between(
        &self,
        from: SystemTime,
        to: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<FixtureEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = doc! {
                "kickoff": {
                    "$gte": DateTime::from_system_time(from),
                    "$lt": DateTime::from_system_time(to),
                }
            };
            store.find_fixtures(filter).await.map_err(Into::into)
        })
    }

    fn save_squad(&self, squad: SquadEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_squad(squad).await.map_err(Into::into) })
    }

    fn find_squad(
        &self,
        team_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<SquadEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_squad(team_id).await.map_err(Into::into) })
    }

    fn save_posts(&self, posts: Vec<PostEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_posts(posts).await.map_err(Into::into) })
    }

    fn list_recent_posts(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<PostEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_recent_posts(limit).await.map_err(Into::into) })
    }

    fn append_points(&self, log: PointsLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_points(log).await.map_err(Into::into) })
    }

    fn list_points(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PointsLogEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_points(user_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
