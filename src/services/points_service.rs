//! Gamification ledger: append-only point awards per user.

use std::time::SystemTime;

use uuid::Uuid;

use crate::{
    dao::models::PointsLogEntity,
    dto::points::{PointsEntry, UserPointsResponse},
    error::ServiceError,
    state::SharedState,
};

/// Action label recorded for a Man-of-the-Match ballot.
pub const MOM_VOTE_ACTION: &str = "mom_vote";

/// Append `points` for `action` to the ledger of `user_id`.
pub async fn award(
    state: &SharedState,
    user_id: &str,
    action: &str,
    points: i32,
    reference: Option<String>,
) -> Result<PointsLogEntity, ServiceError> {
    let store = state.require_vote_store().await?;
    let entry = PointsLogEntity {
        id: Uuid::new_v4(),
        user_id: user_id.to_owned(),
        action: action.to_owned(),
        points,
        reference,
        created_at: SystemTime::now(),
    };
    state.bounded(store.append_points(entry.clone())).await?;
    Ok(entry)
}

/// Balance and history of `user_id`, newest entries first.
pub async fn user_points(
    state: &SharedState,
    user_id: String,
) -> Result<UserPointsResponse, ServiceError> {
    let store = state.require_vote_store().await?;
    let mut entries = state.bounded(store.list_points(user_id.clone())).await?;
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total = entries.iter().map(|entry| i64::from(entry.points)).sum();
    Ok(UserPointsResponse {
        user_id,
        total,
        entries: entries.into_iter().map(PointsEntry::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::memory_state;

    #[tokio::test]
    async fn awards_accumulate_newest_first() {
        let (state, _) = memory_state().await;

        award(&state, "u1", MOM_VOTE_ACTION, 5, Some("leinster_m1".into()))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        award(&state, "u1", "bonus", -2, None).await.unwrap();
        award(&state, "u2", MOM_VOTE_ACTION, 5, None).await.unwrap();

        let points = user_points(&state, "u1".into()).await.unwrap();
        assert_eq!(points.total, 3);
        assert_eq!(points.entries.len(), 2);
        assert_eq!(points.entries[0].action, "bonus");
        assert_eq!(points.entries[1].reference.as_deref(), Some("leinster_m1"));
    }

    #[tokio::test]
    async fn unknown_user_has_an_empty_ledger() {
        let (state, _) = memory_state().await;
        let points = user_points(&state, "nobody".into()).await.unwrap();
        assert_eq!(points.total, 0);
        assert!(points.entries.is_empty());
    }
}
