use super::error::{CouchDaoError, CouchResult};

const BASE_URL_ENV: &str = "COUCH_BASE_URL";
const DEFAULT_DATABASE: &str = "venuescope";

/// Basic-auth pair sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchCredentials {
    pub username: String,
    pub password: String,
}

/// Where the vote store lives on a CouchDB server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    pub credentials: Option<CouchCredentials>,
}

impl CouchConfig {
    /// Check the URL scheme and strip trailing slashes.
    pub fn new(base_url: &str, database: Option<String>) -> CouchResult<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(CouchDaoError::InvalidBaseUrl {
                url: base_url.to_owned(),
            });
        }

        Ok(Self {
            base_url: trimmed.to_owned(),
            database: database
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DATABASE.to_owned()),
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.credentials = Some(CouchCredentials { username, password });
        self
    }

    /// Read `COUCH_BASE_URL`, `COUCH_DB` and the optional `COUCH_USERNAME`/`COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = std::env::var(BASE_URL_ENV)
            .map_err(|_| CouchDaoError::MissingEnvVar { var: BASE_URL_ENV })?;
        let config = Self::new(&base_url, std::env::var("COUCH_DB").ok())?;

        match (
            std::env::var("COUCH_USERNAME").ok(),
            std::env::var("COUCH_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Ok(config.with_credentials(username, password)),
            _ => Ok(config),
        }
    }
}
