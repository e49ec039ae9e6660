//! Request guards for caller identity and admin access.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{dto::validation::validate_identifier, error::AppError, state::SharedState};

const USER_ID_HEADER: &str = "x-user-id";
const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Caller identity set by the upstream gateway, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

fn header_value<'a>(req: &'a Request<Body>, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Reject requests without a well-formed `X-User-Id` and expose it as [`UserId`].
pub async fn require_user(mut req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let user_id = header_value(&req, USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("missing user header `X-User-Id`".into()))?
        .to_owned();

    validate_identifier(&user_id)
        .map_err(|_| AppError::Unauthorized("malformed user header `X-User-Id`".into()))?;

    req.extensions_mut().insert(UserId(user_id));
    Ok(next.run(req).await)
}

/// Reject requests whose `X-Admin-Token` does not match the configured token.
pub async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config().admin_token.as_deref() else {
        return Err(AppError::Unauthorized(
            "admin access is disabled: no admin token configured".into(),
        ));
    };

    let provided = header_value(&req, ADMIN_TOKEN_HEADER).ok_or_else(|| {
        AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
    })?;

    if provided != expected {
        return Err(AppError::Unauthorized("invalid admin token".into()));
    }
    Ok(next.run(req).await)
}
