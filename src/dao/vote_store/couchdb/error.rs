use reqwest::StatusCode;
use thiserror::Error;

pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures of the CouchDB vote store.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("CouchDB base URL `{url}` must start with http:// or https://")]
    InvalidBaseUrl { url: String },
    #[error("failed to build CouchDB HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    /// Querying or creating the database itself failed.
    #[error("CouchDB database `{database}` is unreachable")]
    Database {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} while preparing database `{database}`")]
    DatabaseStatus {
        database: String,
        status: StatusCode,
    },
    #[error("request for CouchDB document `{doc_id}` could not be sent")]
    Transport {
        doc_id: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} for document `{doc_id}`")]
    Status { doc_id: String, status: StatusCode },
    #[error("CouchDB body for `{doc_id}` is not valid JSON")]
    Decode {
        doc_id: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB document `{doc_id}` does not match the expected shape")]
    Document {
        doc_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode CouchDB view key")]
    EncodeKey {
        #[source]
        source: serde_json::Error,
    },
    /// Every `_rev` checked write attempt hit `409 Conflict`.
    #[error("CouchDB document `{doc_id}` kept conflicting after {attempts} attempt(s)")]
    WriteContention { doc_id: String, attempts: u32 },
}
