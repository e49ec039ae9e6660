pub mod config;
pub mod error;
mod models;
pub mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchVoteStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::WriteContention { doc_id, attempts } => {
                StorageError::contention(doc_id, attempts)
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
