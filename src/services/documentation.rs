use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the VenueScope backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::votes::get_module,
        crate::routes::votes::get_summary,
        crate::routes::votes::get_activity,
        crate::routes::votes::get_result,
        crate::routes::votes::cast_vote,
        crate::routes::votes::my_vote,
        crate::routes::votes::list_team_modules,
        crate::routes::votes::list_results,
        crate::routes::fixtures::list_fixtures,
        crate::routes::trending::trending_posts,
        crate::routes::points::user_points,
        crate::routes::sse::vote_stream,
        crate::routes::admin::create_module,
        crate::routes::admin::lock_module,
        crate::routes::admin::import_fixtures,
        crate::routes::admin::import_squads,
        crate::routes::admin::import_posts,
        crate::routes::cron::auto_create,
        crate::routes::cron::auto_lock,
        crate::routes::cron::backup,
        crate::routes::cron::run_all,
    ),
    components(
        schemas(
            crate::dto::health::HealthStatus,
            crate::dto::health::HealthResponse,
            crate::dto::vote::CandidateView,
            crate::dto::vote::VoteModuleView,
            crate::dto::vote::VoteSummaryResponse,
            crate::dto::vote::CastVoteRequest,
            crate::dto::vote::VoteReceipt,
            crate::dto::vote::UserVoteResponse,
            crate::dto::vote::ActivityBucket,
            crate::dto::vote::VoteActivityResponse,
            crate::dto::vote::CandidateInput,
            crate::dto::vote::CreateModuleRequest,
            crate::dto::vote::VoteResultView,
            crate::dto::lifecycle::FixtureWindow,
            crate::dto::lifecycle::FixtureView,
            crate::dto::lifecycle::FixtureInput,
            crate::dto::lifecycle::PlayerInput,
            crate::dto::lifecycle::SquadInput,
            crate::dto::lifecycle::ImportResponse,
            crate::dto::lifecycle::AutoCreateReport,
            crate::dto::lifecycle::AutoLockReport,
            crate::dto::lifecycle::BackupReport,
            crate::dto::lifecycle::LifecycleReport,
            crate::dto::trending::TrendingMode,
            crate::dto::trending::RankedPost,
            crate::dto::trending::TrendingResponse,
            crate::dto::trending::PostInput,
            crate::dto::points::PointsEntry,
            crate::dto::points::UserPointsResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "votes", description = "Man-of-the-Match vote modules"),
        (name = "fixtures", description = "Fixture listing"),
        (name = "posts", description = "Trending social posts"),
        (name = "points", description = "Gamification ledger"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "admin", description = "Admin management, requires `X-Admin-Token`"),
        (name = "cron", description = "Lifecycle sweeps, requires `X-Admin-Token`"),
    )
)]
pub struct ApiDoc;
