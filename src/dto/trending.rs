use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::PostEntity,
    dto::{format_system_time, parse_timestamp, validation::validate_identifier},
    error::ServiceError,
};

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Scoring used to rank posts.
pub enum TrendingMode {
    /// `likes * 2 + comments`.
    Engagement,
    /// Engagement halved every configured half-life of age.
    #[default]
    Trending,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Parameters of `GET /posts/trending`.
pub struct TrendingQuery {
    pub mode: Option<TrendingMode>,
    /// Number of posts to return, clamped to the configured maximum.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
/// Post with the score it was ranked by.
pub struct RankedPost {
    pub id: String,
    pub source: String,
    pub author_id: String,
    pub title: String,
    pub likes: u32,
    pub comments: u32,
    pub created_at: String,
    pub score: f64,
}

impl RankedPost {
    pub fn new(post: PostEntity, score: f64) -> Self {
        Self {
            id: post.id,
            source: post.source,
            author_id: post.author_id,
            title: post.title,
            likes: post.likes,
            comments: post.comments,
            created_at: format_system_time(post.created_at),
            score,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrendingResponse {
    pub mode: TrendingMode,
    pub posts: Vec<RankedPost>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
/// Post snapshot accepted by `PUT /admin/posts`.
pub struct PostInput {
    #[validate(custom(function = "validate_identifier"))]
    pub id: String,
    /// Subsystem the post comes from (fan hub, meetup, ...).
    pub source: String,
    pub author_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub comments: u32,
    /// RFC 3339 creation instant.
    pub created_at: String,
}

impl TryFrom<PostInput> for PostEntity {
    type Error = ServiceError;

    fn try_from(value: PostInput) -> Result<Self, Self::Error> {
        Ok(Self {
            created_at: parse_timestamp("created_at", &value.created_at)?,
            id: value.id,
            source: value.source,
            author_id: value.author_id,
            title: value.title,
            likes: value.likes,
            comments: value.comments,
        })
    }
}
