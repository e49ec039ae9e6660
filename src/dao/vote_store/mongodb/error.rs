use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save vote module `{id}`")]
    SaveModule {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load vote module `{id}`")]
    LoadModule {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list vote modules")]
    ListModules {
        #[source]
        source: MongoError,
    },
    #[error("vote transaction on `{module_id}` failed")]
    CastVote {
        module_id: String,
        #[source]
        source: MongoError,
    },
    #[error("vote transaction on `{module_id}` kept conflicting after {attempts} attempt(s)")]
    TransactionContention { module_id: String, attempts: u32 },
    #[error("failed to load vote history of `{module_id}`")]
    LoadHistory {
        module_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save vote result `{module_id}`")]
    SaveResult {
        module_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load vote results")]
    LoadResults {
        #[source]
        source: MongoError,
    },
    #[error("failed to save fixture `{id}`")]
    SaveFixture {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load fixtures")]
    LoadFixtures {
        #[source]
        source: MongoError,
    },
    #[error("failed to save squad `{id}`")]
    SaveSquad {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load squad `{id}`")]
    LoadSquad {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save post `{id}`")]
    SavePost {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load posts")]
    LoadPosts {
        #[source]
        source: MongoError,
    },
    #[error("failed to write points for user `{user_id}`")]
    SavePoints {
        user_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load points for user `{user_id}`")]
    LoadPoints {
        user_id: String,
        #[source]
        source: MongoError,
    },
}
