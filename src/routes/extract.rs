use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::{dto::validation::validate_identifier, error::AppError};

/// Single `{id}` path segment restricted to identifier characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPath(pub String);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        validate_identifier(&id)
            .map_err(|err| AppError::BadRequest(format!("invalid identifier `{id}`: {err}")))?;
        Ok(Self(id))
    }
}
