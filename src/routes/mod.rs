use axum::Router;

use crate::state::SharedState;

pub mod admin;
pub mod auth;
pub mod cron;
pub mod docs;
pub mod extract;
pub mod fixtures;
pub mod health;
pub mod points;
pub mod sse;
pub mod trending;
pub mod votes;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(votes::router())
        .merge(fixtures::router())
        .merge(trending::router())
        .merge(points::router())
        .merge(sse::router())
        .merge(admin::router(state.clone()))
        .merge(cron::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
