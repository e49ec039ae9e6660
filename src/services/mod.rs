/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Scheduled sweeps and fixture bookkeeping.
pub mod lifecycle_service;
/// Gamification points ledger.
pub mod points_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Post ranking.
pub mod trending_service;
/// Man-of-the-Match ballots and tallies.
pub mod vote_service;
