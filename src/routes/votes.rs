use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::vote::{
        CastVoteRequest, ResultsQuery, UserVoteResponse, VoteActivityResponse, VoteModuleView,
        VoteReceipt, VoteResultView, VoteSummaryResponse,
    },
    error::AppError,
    routes::{
        auth::{UserId, require_user},
        extract::IdPath,
    },
    services::vote_service,
    state::SharedState,
};

/// Public vote module reads plus the ballot endpoints guarded by `X-User-Id`.
pub fn router() -> Router<SharedState> {
    let ballots = Router::new()
        .route("/votes/{id}/vote", post(cast_vote))
        .route("/votes/{id}/me", get(my_vote))
        .route_layer(middleware::from_fn(require_user));

    Router::new()
        .route("/votes/{id}", get(get_module))
        .route("/votes/{id}/summary", get(get_summary))
        .route("/votes/{id}/activity", get(get_activity))
        .route("/votes/{id}/result", get(get_result))
        .route("/teams/{team_id}/votes", get(list_team_modules))
        .route("/results", get(list_results))
        .merge(ballots)
}

#[utoipa::path(
    get,
    path = "/votes/{id}",
    tag = "votes",
    params(("id" = String, Path, description = "Vote module identifier (`{team_id}_{match_id}`)")),
    responses(
        (status = 200, description = "Vote module with tallies", body = VoteModuleView),
        (status = 404, description = "Unknown module")
    )
)]
/// Return a module with its tallies, candidates in stored order.
pub async fn get_module(
    State(state): State<SharedState>,
    IdPath(id): IdPath,
) -> Result<Json<VoteModuleView>, AppError> {
    Ok(Json(vote_service::get_module(&state, &id).await?))
}

#[utoipa::path(
    get,
    path = "/votes/{id}/summary",
    tag = "votes",
    params(("id" = String, Path, description = "Vote module identifier")),
    responses((status = 200, description = "Standings, highest first", body = VoteSummaryResponse))
)]
pub async fn get_summary(
    State(state): State<SharedState>,
    IdPath(id): IdPath,
) -> Result<Json<VoteSummaryResponse>, AppError> {
    Ok(Json(vote_service::summary(&state, &id).await?))
}

#[utoipa::path(
    get,
    path = "/votes/{id}/activity",
    tag = "votes",
    params(("id" = String, Path, description = "Vote module identifier")),
    responses((status = 200, description = "Ballots per UTC hour", body = VoteActivityResponse))
)]
/// Hourly ballot distribution and peak hour.
pub async fn get_activity(
    State(state): State<SharedState>,
    IdPath(id): IdPath,
) -> Result<Json<VoteActivityResponse>, AppError> {
    Ok(Json(vote_service::activity(&state, &id).await?))
}

#[utoipa::path(
    get,
    path = "/votes/{id}/result",
    tag = "votes",
    params(("id" = String, Path, description = "Vote module identifier")),
    responses(
        (status = 200, description = "Archived standings", body = VoteResultView),
        (status = 404, description = "Module not archived yet")
    )
)]
pub async fn get_result(
    State(state): State<SharedState>,
    IdPath(id): IdPath,
) -> Result<Json<VoteResultView>, AppError> {
    Ok(Json(vote_service::get_result(&state, &id).await?))
}

#[utoipa::path(
    post,
    path = "/votes/{id}/vote",
    tag = "votes",
    params(
        ("id" = String, Path, description = "Vote module identifier"),
        ("X-User-Id" = String, Header, description = "Caller identity set by the gateway")
    ),
    request_body = CastVoteRequest,
    responses(
        (status = 200, description = "Ballot recorded", body = VoteReceipt),
        (status = 400, description = "Unknown candidate"),
        (status = 401, description = "Missing caller identity"),
        (status = 404, description = "Unknown module"),
        (status = 409, description = "Module locked or user already voted")
    )
)]
/// Cast the caller's single ballot on a module.
pub async fn cast_vote(
    State(state): State<SharedState>,
    IdPath(id): IdPath,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(payload): Json<CastVoteRequest>,
) -> Result<Json<VoteReceipt>, AppError> {
    payload.validate()?;
    Ok(Json(
        vote_service::cast_vote(&state, id, user_id, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/votes/{id}/me",
    tag = "votes",
    params(
        ("id" = String, Path, description = "Vote module identifier"),
        ("X-User-Id" = String, Header, description = "Caller identity set by the gateway")
    ),
    responses(
        (status = 200, description = "The caller's ballot", body = UserVoteResponse),
        (status = 404, description = "No ballot cast yet")
    )
)]
pub async fn my_vote(
    State(state): State<SharedState>,
    IdPath(id): IdPath,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Json<UserVoteResponse>, AppError> {
    Ok(Json(vote_service::user_vote(&state, &id, &user_id).await?))
}

#[utoipa::path(
    get,
    path = "/teams/{team_id}/votes",
    tag = "votes",
    params(("team_id" = String, Path, description = "Team identifier")),
    responses(
        (
            status = 200,
            description = "Modules of the team, newest kickoff first",
            body = [VoteModuleView]
        )
    )
)]
pub async fn list_team_modules(
    State(state): State<SharedState>,
    IdPath(team_id): IdPath,
) -> Result<Json<Vec<VoteModuleView>>, AppError> {
    Ok(Json(
        vote_service::list_team_modules(&state, &team_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/results",
    tag = "votes",
    params(ResultsQuery),
    responses((status = 200, description = "Archived results", body = [VoteResultView]))
)]
/// List archived results, optionally for a single team.
pub async fn list_results(
    State(state): State<SharedState>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<Vec<VoteResultView>>, AppError> {
    Ok(Json(
        vote_service::list_results(&state, query.team_id.as_deref()).await?,
    ))
}
