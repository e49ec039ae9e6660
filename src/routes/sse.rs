use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    routes::extract::IdPath,
    services::{sse_service, vote_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/votes/{id}",
    tag = "sse",
    params(("id" = String, Path, description = "Vote module identifier")),
    responses(
        (
            status = 200,
            description = "Live `tally` events of the module",
            content_type = "text/event-stream",
            body = String
        ),
        (status = 404, description = "Unknown module")
    )
)]
/// Stream the live tally of one module, starting with its current state.
pub async fn vote_stream(
    State(state): State<SharedState>,
    IdPath(id): IdPath,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let current = vote_service::get_module(&state, &id).await?;
    let receiver = sse_service::subscribe_votes(&state, &id);
    info!(module_id = %id, "new vote SSE connection");
    sse_service::publish_tally(&state, &current);
    Ok(sse_service::to_sse_stream(receiver, state, id))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/votes/{id}", get(vote_stream))
}
