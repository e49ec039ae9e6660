use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{post, put},
};

use validator::Validate;

use crate::{
    dto::{
        lifecycle::{FixtureInput, ImportResponse, SquadInput},
        trending::PostInput,
        vote::{CreateModuleRequest, VoteModuleView},
    },
    error::AppError,
    routes::{auth::require_admin_token, extract::IdPath},
    services::{lifecycle_service, trending_service, vote_service},
    state::SharedState,
};

/// Admin-only management endpoints for vote modules and seed data.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/votes", post(create_module))
        .route("/admin/votes/{id}/lock", post(lock_module))
        .route("/admin/fixtures", put(import_fixtures))
        .route("/admin/squads", put(import_squads))
        .route("/admin/posts", put(import_posts))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

#[utoipa::path(
    post,
    path = "/admin/votes",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = CreateModuleRequest,
    responses(
        (status = 201, description = "Vote module created", body = VoteModuleView),
        (status = 409, description = "A module already exists for this team and match")
    )
)]
/// Open a vote module by hand.
pub async fn create_module(
    State(state): State<SharedState>,
    Json(payload): Json<CreateModuleRequest>,
) -> Result<(StatusCode, Json<VoteModuleView>), AppError> {
    payload.validate()?;
    let module = vote_service::create_module(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

#[utoipa::path(
    post,
    path = "/admin/votes/{id}/lock",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token"),
    ("id" = String, Path, description = "Identifier of the module to lock")),
    responses((status = 200, description = "Module locked", body = VoteModuleView))
)]
/// Close a module to further ballots; locking twice is harmless.
pub async fn lock_module(
    State(state): State<SharedState>,
    IdPath(id): IdPath,
) -> Result<Json<VoteModuleView>, AppError> {
    Ok(Json(vote_service::lock_module(&state, &id).await?))
}

#[utoipa::path(
    put,
    path = "/admin/fixtures",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = [FixtureInput],
    responses((status = 200, description = "Fixtures upserted", body = ImportResponse))
)]
pub async fn import_fixtures(
    State(state): State<SharedState>,
    Json(payload): Json<Vec<FixtureInput>>,
) -> Result<Json<ImportResponse>, AppError> {
    Ok(Json(
        lifecycle_service::import_fixtures(&state, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/admin/squads",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = [SquadInput],
    responses((status = 200, description = "Squads upserted", body = ImportResponse))
)]
pub async fn import_squads(
    State(state): State<SharedState>,
    Json(payload): Json<Vec<SquadInput>>,
) -> Result<Json<ImportResponse>, AppError> {
    Ok(Json(lifecycle_service::import_squads(&state, payload).await?))
}

#[utoipa::path(
    put,
    path = "/admin/posts",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = [PostInput],
    responses((status = 200, description = "Posts upserted", body = ImportResponse))
)]
pub async fn import_posts(
    State(state): State<SharedState>,
    Json(payload): Json<Vec<PostInput>>,
) -> Result<Json<ImportResponse>, AppError> {
    Ok(Json(trending_service::import_posts(&state, payload).await?))
}
