use std::time::SystemTime;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::trending::{TrendingQuery, TrendingResponse},
    error::AppError,
    services::trending_service,
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new().route("/posts/trending", get(trending_posts))
}

#[utoipa::path(
    get,
    path = "/posts/trending",
    tag = "posts",
    params(TrendingQuery),
    responses((status = 200, description = "Ranked posts", body = TrendingResponse))
)]
/// Rank recent posts by engagement or by decayed engagement.
pub async fn trending_posts(
    State(state): State<SharedState>,
    Query(query): Query<TrendingQuery>,
) -> Result<Json<TrendingResponse>, AppError> {
    let mode = query.mode.unwrap_or_default();
    Ok(Json(
        trending_service::trending(&state, mode, query.limit, SystemTime::now()).await?,
    ))
}
