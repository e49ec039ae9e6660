use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::points::UserPointsResponse, error::AppError, routes::extract::IdPath,
    services::points_service, state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new().route("/users/{id}/points", get(user_points))
}

#[utoipa::path(
    get,
    path = "/users/{id}/points",
    tag = "points",
    params(("id" = String, Path, description = "User identifier")),
    responses((status = 200, description = "Points balance and history", body = UserPointsResponse))
)]
pub async fn user_points(
    State(state): State<SharedState>,
    IdPath(id): IdPath,
) -> Result<Json<UserPointsResponse>, AppError> {
    Ok(Json(points_service::user_points(&state, id).await?))
}
