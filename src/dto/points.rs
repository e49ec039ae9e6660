use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dao::models::PointsLogEntity, dto::format_system_time};

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
/// One line of a user's points ledger.
pub struct PointsEntry {
    pub id: Uuid,
    pub action: String,
    pub points: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub created_at: String,
}

impl From<PointsLogEntity> for PointsEntry {
    fn from(value: PointsLogEntity) -> Self {
        Self {
            id: value.id,
            action: value.action,
            points: value.points,
            reference: value.reference,
            created_at: format_system_time(value.created_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Balance and history of `GET /users/{id}/points`.
pub struct UserPointsResponse {
    pub user_id: String,
    pub total: i64,
    /// Newest first.
    pub entries: Vec<PointsEntry>,
}
