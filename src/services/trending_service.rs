//! Post ranking by raw engagement or by time-decayed engagement.

use std::time::SystemTime;

use tracing::info;
use validator::Validate;

use crate::{
    dao::models::PostEntity,
    dto::{
        lifecycle::ImportResponse,
        trending::{PostInput, RankedPost, TrendingMode, TrendingResponse},
    },
    error::ServiceError,
    services::lifecycle_service::invalid,
    state::SharedState,
};

/// `likes * 2 + comments`.
pub fn engagement_score(post: &PostEntity) -> f64 {
    f64::from(post.likes) * 2.0 + f64::from(post.comments)
}

/// Engagement halved every `half_life_hours` of age. Posts dated after `now` count as fresh.
pub fn trending_score(post: &PostEntity, now: SystemTime, half_life_hours: f64) -> f64 {
    let age_hours = now
        .duration_since(post.created_at)
        .map(|age| age.as_secs_f64() / 3600.0)
        .unwrap_or(0.0);
    engagement_score(post) * 0.5_f64.powf(age_hours / half_life_hours)
}

/// Score, sort descending and keep the first `limit` posts.
///
/// Equal scores keep their input order.
pub fn rank(
    posts: Vec<PostEntity>,
    mode: TrendingMode,
    limit: usize,
    now: SystemTime,
    half_life_hours: f64,
) -> Vec<RankedPost> {
    let mut scored: Vec<(f64, PostEntity)> = posts
        .into_iter()
        .map(|post| {
            let score = match mode {
                TrendingMode::Engagement => engagement_score(&post),
                TrendingMode::Trending => trending_score(&post, now, half_life_hours),
            };
            (score, post)
        })
        .collect();

    scored.sort_by(|(a, _), (b, _)| b.total_cmp(a));
    scored.truncate(limit);
    scored
        .into_iter()
        .map(|(score, post)| RankedPost::new(post, score))
        .collect()
}

/// Rank the most recent posts at `now`.
pub async fn trending(
    state: &SharedState,
    mode: TrendingMode,
    limit: Option<usize>,
    now: SystemTime,
) -> Result<TrendingResponse, ServiceError> {
    let config = state.config();
    let limit = config.trending_limit(limit);

    let store = state.require_vote_store().await?;
    let posts = state
        .bounded(store.list_recent_posts(config.recent_posts_limit))
        .await?;

    Ok(TrendingResponse {
        mode,
        posts: rank(posts, mode, limit, now, config.trending_half_life_hours),
    })
}

/// Upsert a snapshot of posts; the whole batch is rejected if one row is invalid.
pub async fn import_posts(
    state: &SharedState,
    posts: Vec<PostInput>,
) -> Result<ImportResponse, ServiceError> {
    let entities = posts
        .into_iter()
        .map(|post| {
            post.validate().map_err(invalid)?;
            PostEntity::try_from(post)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let imported = entities.len();
    let store = state.require_vote_store().await?;
    state.bounded(store.save_posts(entities)).await?;
    info!(imported, "posts imported");
    Ok(ImportResponse { imported })
}
