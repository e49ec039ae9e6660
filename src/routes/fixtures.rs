use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::lifecycle::{FixtureView, FixturesQuery},
    error::AppError,
    services::lifecycle_service,
    state::SharedState,
};

/// Public fixture listing.
pub fn router() -> Router<SharedState> {
    Router::new().route("/fixtures", get(list_fixtures))
}

#[utoipa::path(
    get,
    path = "/fixtures",
    tag = "fixtures",
    params(FixturesQuery),
    responses((status = 200, description = "Fixtures ordered by kickoff", body = [FixtureView]))
)]
/// List fixtures with their upcoming/live/finished window.
pub async fn list_fixtures(
    State(state): State<SharedState>,
    Query(query): Query<FixturesQuery>,
) -> Result<Json<Vec<FixtureView>>, AppError> {
    Ok(Json(
        lifecycle_service::list_fixtures(&state, query, SystemTime::now()).await?,
    ))
}
