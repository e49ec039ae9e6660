use std::time::SystemTime;

use axum::{Json, Router, extract::State, middleware, routing::post};

use crate::{
    dto::lifecycle::{AutoCreateReport, AutoLockReport, BackupReport, LifecycleReport},
    error::AppError,
    routes::auth::require_admin_token,
    services::lifecycle_service,
    state::SharedState,
};

/// Sweep endpoints triggered by the external scheduler.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/cron/auto-create", post(auto_create))
        .route("/cron/auto-lock", post(auto_lock))
        .route("/cron/backup", post(backup))
        .route("/cron/run", post(run_all))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

#[utoipa::path(
    post,
    path = "/cron/auto-create",
    tag = "cron",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    responses(
        (status = 200, description = "Modules opened for today's fixtures", body = AutoCreateReport)
    )
)]
pub async fn auto_create(
    State(state): State<SharedState>,
) -> Result<Json<AutoCreateReport>, AppError> {
    Ok(Json(
        lifecycle_service::auto_create(&state, SystemTime::now()).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/cron/auto-lock",
    tag = "cron",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    responses((status = 200, description = "Expired modules locked", body = AutoLockReport))
)]
pub async fn auto_lock(State(state): State<SharedState>) -> Result<Json<AutoLockReport>, AppError> {
    Ok(Json(
        lifecycle_service::auto_lock(&state, SystemTime::now()).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/cron/backup",
    tag = "cron",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    responses((status = 200, description = "Locked modules archived", body = BackupReport))
)]
pub async fn backup(State(state): State<SharedState>) -> Result<Json<BackupReport>, AppError> {
    Ok(Json(
        lifecycle_service::backup(&state, SystemTime::now()).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/cron/run",
    tag = "cron",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    responses((status = 200, description = "All three sweeps, in order", body = LifecycleReport))
)]
/// Run auto-create, auto-lock and backup sequentially.
pub async fn run_all(State(state): State<SharedState>) -> Result<Json<LifecycleReport>, AppError> {
    Ok(Json(
        lifecycle_service::run_all(&state, SystemTime::now()).await?,
    ))
}
