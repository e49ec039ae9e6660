//! Man-of-the-Match ballots: casting votes, locking modules and read-side aggregation.

use std::time::SystemTime;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{CandidateEntity, VoteModuleEntity, module_id as build_module_id},
        vote_store::{VoteCommand, VoteOutcome},
    },
    dto::{
        parse_timestamp,
        validation::validate_unique_ids,
        vote::{
            ActivityBucket, CastVoteRequest, CreateModuleRequest, UserVoteResponse,
            VoteActivityResponse, VoteModuleView, VoteReceipt, VoteResultView, VoteSummaryResponse,
        },
    },
    error::ServiceError,
    services::{points_service, sse_service},
    state::SharedState,
};

fn module_not_found(module_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("vote module `{module_id}` not found"))
}

/// Order candidates by votes, highest first, keeping stored order between equal tallies.
pub fn standings(candidates: &[CandidateEntity]) -> Vec<CandidateEntity> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| b.votes.cmp(&a.votes));
    sorted
}

/// Record the ballot of `user_id` for `candidate_id` on `module_id`.
pub async fn cast_vote(
    state: &SharedState,
    module_id: String,
    user_id: String,
    request: CastVoteRequest,
) -> Result<VoteReceipt, ServiceError> {
    let store = state.require_vote_store().await?;
    let command = VoteCommand {
        module_id: module_id.clone(),
        user_id: user_id.clone(),
        candidate_id: request.candidate_id.clone(),
        voted_at: SystemTime::now(),
    };

    let module = match state.bounded(store.cast_vote(command)).await? {
        VoteOutcome::Recorded(module) => module,
        VoteOutcome::ModuleNotFound => return Err(module_not_found(&module_id)),
        VoteOutcome::Locked => {
            debug!(%module_id, %user_id, "vote rejected: module locked");
            return Err(ServiceError::Locked { module_id });
        }
        VoteOutcome::AlreadyVoted => {
            debug!(%module_id, %user_id, "vote rejected: already voted");
            return Err(ServiceError::Conflict(format!(
                "user `{user_id}` already voted on `{module_id}`"
            )));
        }
        VoteOutcome::UnknownCandidate => {
            debug!(
                %module_id,
                %user_id,
                candidate_id = %request.candidate_id,
                "vote rejected: unknown candidate"
            );
            return Err(ServiceError::InvalidInput(format!(
                "candidate `{}` is not part of `{module_id}`",
                request.candidate_id
            )));
        }
    };

    let points_awarded = credit_vote(state, &user_id, &module_id).await;
    let view = VoteModuleView::from(module);
    sse_service::publish_tally(state, &view);

    Ok(VoteReceipt {
        module_id,
        candidate_id: request.candidate_id,
        points_awarded,
        module: view,
    })
}

/// The ballot is already durable here; a ledger failure only costs the reward.
async fn credit_vote(state: &SharedState, user_id: &str, module_id: &str) -> i32 {
    let points = state.config().vote_points;
    if points == 0 {
        return 0;
    }
    match points_service::award(
        state,
        user_id,
        points_service::MOM_VOTE_ACTION,
        points,
        Some(module_id.to_owned()),
    )
    .await
    {
        Ok(entry) => entry.points,
        Err(err) => {
            warn!(%module_id, %user_id, error = %err, "failed to credit vote points");
            0
        }
    }
}

/// Create a module by hand; the id is derived from team and match.
pub async fn create_module(
    state: &SharedState,
    request: CreateModuleRequest,
) -> Result<VoteModuleView, ServiceError> {
    if request.title.trim().is_empty() {
        return Err(ServiceError::InvalidInput("title must not be blank".into()));
    }
    if request.candidates.is_empty() {
        return Err(ServiceError::InvalidInput(
            "at least one candidate is required".into(),
        ));
    }
    validate_unique_ids(request.candidates.iter().map(|c| c.id.as_str()))
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let kickoff = parse_timestamp("kickoff", &request.kickoff)?;
    let expires_at = match request.expires_at.as_deref() {
        Some(value) => parse_timestamp("expires_at", value)?,
        None => kickoff
            .checked_add(state.config().vote_window)
            .ok_or_else(|| {
                ServiceError::InvalidInput("`kickoff` plus the vote window is out of range".into())
            })?,
    };
    if expires_at <= kickoff {
        return Err(ServiceError::InvalidInput(
            "`expires_at` must be after `kickoff`".into(),
        ));
    }

    let now = SystemTime::now();
    let module = VoteModuleEntity {
        id: build_module_id(&request.team_id, &request.match_id),
        team_id: request.team_id,
        match_id: request.match_id,
        title: request.title.trim().to_owned(),
        opponent: request.opponent,
        kickoff,
        expires_at,
        locked: false,
        candidates: request.candidates.into_iter().map(Into::into).collect(),
        created_at: now,
        updated_at: now,
    };

    let store = state.require_vote_store().await?;
    if !state.bounded(store.create_module(module.clone())).await? {
        return Err(ServiceError::Conflict(format!(
            "vote module `{}` already exists",
            module.id
        )));
    }

    info!(module_id = %module.id, "vote module created");
    Ok(module.into())
}

async fn load_module(
    state: &SharedState,
    module_id: &str,
) -> Result<VoteModuleEntity, ServiceError> {
    let store = state.require_vote_store().await?;
    state
        .bounded(store.find_module(module_id.to_owned()))
        .await?
        .ok_or_else(|| module_not_found(module_id))
}

/// Module with tallies and percentages, candidates in stored order.
pub async fn get_module(
    state: &SharedState,
    module_id: &str,
) -> Result<VoteModuleView, ServiceError> {
    Ok(load_module(state, module_id).await?.into())
}

/// Standings of a module and its current leader.
pub async fn summary(
    state: &SharedState,
    module_id: &str,
) -> Result<VoteSummaryResponse, ServiceError> {
    let mut module = load_module(state, module_id).await?;
    module.candidates = standings(&module.candidates);

    let view = VoteModuleView::from(module);
    let leader = view
        .candidates
        .first()
        .filter(|candidate| candidate.votes > 0)
        .cloned();

    Ok(VoteSummaryResponse {
        module_id: view.id,
        title: view.title,
        locked: view.locked,
        total_votes: view.total_votes,
        candidates: view.candidates,
        leader,
    })
}

/// Modules of `team_id`, most recent kickoff first.
pub async fn list_team_modules(
    state: &SharedState,
    team_id: &str,
) -> Result<Vec<VoteModuleView>, ServiceError> {
    let store = state.require_vote_store().await?;
    let mut modules: Vec<_> = state
        .bounded(store.list_modules())
        .await?
        .into_iter()
        .filter(|module| module.team_id == team_id)
        .collect();
    modules.sort_by(|a, b| b.kickoff.cmp(&a.kickoff).then_with(|| a.id.cmp(&b.id)));
    Ok(modules.into_iter().map(Into::into).collect())
}

/// Ballot of `user_id` on `module_id`.
pub async fn user_vote(
    state: &SharedState,
    module_id: &str,
    user_id: &str,
) -> Result<UserVoteResponse, ServiceError> {
    let store = state.require_vote_store().await?;
    state
        .bounded(store.find_history(module_id.to_owned(), user_id.to_owned()))
        .await?
        .map(Into::into)
        .ok_or_else(|| {
            ServiceError::NotFound(format!("user `{user_id}` has not voted on `{module_id}`"))
        })
}

/// Ballots of a module bucketed by UTC hour of day.
pub async fn activity(
    state: &SharedState,
    module_id: &str,
) -> Result<VoteActivityResponse, ServiceError> {
    load_module(state, module_id).await?;
    let store = state.require_vote_store().await?;
    let history = state
        .bounded(store.list_history(module_id.to_owned()))
        .await?;

    let mut counts = [0u32; 24];
    for record in &history {
        let hour = usize::from(OffsetDateTime::from(record.voted_at).hour());
        counts[hour] = counts[hour].saturating_add(1);
    }

    Ok(VoteActivityResponse {
        module_id: module_id.to_owned(),
        total_votes: counts.iter().sum(),
        peak_hour: peak_hour(&counts),
        buckets: counts
            .iter()
            .zip(0u8..)
            .map(|(&votes, hour)| ActivityBucket { hour, votes })
            .collect(),
    })
}

/// Earliest hour holding the maximum; `None` when every bucket is empty.
fn peak_hour(counts: &[u32; 24]) -> Option<u8> {
    let max = counts.iter().copied().max().filter(|max| *max > 0)?;
    counts
        .iter()
        .position(|count| *count == max)
        .and_then(|hour| u8::try_from(hour).ok())
}

/// Close `module_id` to further ballots. Locking a locked module is a no-op.
pub async fn lock_module(
    state: &SharedState,
    module_id: &str,
) -> Result<VoteModuleView, ServiceError> {
    let store = state.require_vote_store().await?;
    let module = state
        .bounded(store.lock_module(module_id.to_owned()))
        .await?
        .ok_or_else(|| module_not_found(module_id))?;

    info!(%module_id, "vote module locked");
    let view = VoteModuleView::from(module);
    sse_service::publish_tally(state, &view);
    Ok(view)
}

/// Archived standings of `module_id`.
pub async fn get_result(
    state: &SharedState,
    module_id: &str,
) -> Result<VoteResultView, ServiceError> {
    let store = state.require_vote_store().await?;
    state
        .bounded(store.find_result(module_id.to_owned()))
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(format!("no result archived for `{module_id}`")))
}

/// Archived results, optionally of one team, most recent kickoff first.
pub async fn list_results(
    state: &SharedState,
    team_id: Option<&str>,
) -> Result<Vec<VoteResultView>, ServiceError> {
    let store = state.require_vote_store().await?;
    let mut results: Vec<_> = state
        .bounded(store.list_results())
        .await?
        .into_iter()
        .filter(|result| team_id.is_none_or(|team| result.team_id == team))
        .collect();
    results.sort_by(|a, b| {
        b.kickoff
            .cmp(&a.kickoff)
            .then_with(|| a.module_id.cmp(&b.module_id))
    });
    Ok(results.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::vote_store::{
            VoteStore,
            fixtures::{candidate, module},
        },
        dto::vote::CandidateInput,
        state::testing::{memory_state, memory_state_with},
    };

    async fn seeded(candidates: Vec<CandidateEntity>) -> SharedState {
        let (state, store) = memory_state().await;
        store
            .create_module(module("leinster_m1", candidates))
            .await
            .unwrap();
        state
    }

    fn ballot(candidate_id: &str) -> CastVoteRequest {
        CastVoteRequest {
            candidate_id: candidate_id.into(),
        }
    }

    fn create_request(candidates: &[&str]) -> CreateModuleRequest {
        CreateModuleRequest {
            team_id: "leinster".into(),
            match_id: "m2".into(),
            title: "Man of the Match".into(),
            opponent: "Ulster".into(),
            kickoff: "2024-03-02T17:00:00Z".into(),
            expires_at: None,
            candidates: candidates
                .iter()
                .map(|id| CandidateInput {
                    id: (*id).into(),
                    name: format!("Player {id}"),
                    position: None,
                    photo_url: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn vote_updates_tally_and_credits_points() {
        let state = seeded(vec![candidate("a", 3), candidate("b", 5)]).await;

        let receipt = cast_vote(&state, "leinster_m1".into(), "u1".into(), ballot("a"))
            .await
            .unwrap();

        assert_eq!(receipt.module.total_votes, 9);
        assert_eq!(receipt.module.candidates[0].votes, 4);
        assert_eq!(receipt.module.candidates[1].votes, 5);
        assert_eq!(receipt.points_awarded, state.config().vote_points);

        let points = points_service::user_points(&state, "u1".into()).await.unwrap();
        assert_eq!(points.total, i64::from(state.config().vote_points));
    }

    #[tokio::test]
    async fn second_vote_is_a_conflict() {
        let state = seeded(vec![candidate("a", 0), candidate("b", 0)]).await;

        cast_vote(&state, "leinster_m1".into(), "u1".into(), ballot("a"))
            .await
            .unwrap();
        let err = cast_vote(&state, "leinster_m1".into(), "u1".into(), ballot("b"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Conflict(_)));
        let view = get_module(&state, "leinster_m1").await.unwrap();
        assert_eq!(view.total_votes, 1);
    }

    #[tokio::test]
    async fn rejections_map_to_distinct_errors() {
        let state = seeded(vec![candidate("a", 2)]).await;

        let missing = cast_vote(&state, "nope".into(), "u1".into(), ballot("a")).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        let unknown = cast_vote(&state, "leinster_m1".into(), "u1".into(), ballot("zz")).await;
        assert!(matches!(unknown, Err(ServiceError::InvalidInput(_))));

        lock_module(&state, "leinster_m1").await.unwrap();
        let locked = cast_vote(&state, "leinster_m1".into(), "u1".into(), ballot("a")).await;
        assert!(matches!(locked, Err(ServiceError::Locked { .. })));

        assert_eq!(get_module(&state, "leinster_m1").await.unwrap().total_votes, 2);
    }

    #[tokio::test]
    async fn zero_points_config_skips_the_ledger() {
        let config = AppConfig {
            vote_points: 0,
            ..AppConfig::default()
        };
        let (state, store) = memory_state_with(config).await;
        store
            .create_module(module("leinster_m1", vec![candidate("a", 0)]))
            .await
            .unwrap();

        let receipt = cast_vote(&state, "leinster_m1".into(), "u1".into(), ballot("a"))
            .await
            .unwrap();
        assert_eq!(receipt.points_awarded, 0);
        assert!(store.list_points("u1".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_sorts_stably_and_names_leader() {
        let state = seeded(vec![
            candidate("a", 2),
            candidate("b", 5),
            candidate("c", 2),
            candidate("d", 1),
        ])
        .await;

        let summary = summary(&state, "leinster_m1").await.unwrap();
        let order: Vec<_> = summary.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, ["b", "a", "c", "d"]);
        assert_eq!(summary.total_votes, 10);
        assert_eq!(summary.candidates[0].percentage, 50.0);
        assert_eq!(summary.leader.map(|c| c.id), Some("b".to_string()));
    }

    #[tokio::test]
    async fn summary_without_votes_has_no_leader() {
        let state = seeded(vec![candidate("a", 0), candidate("b", 0)]).await;
        let summary = summary(&state, "leinster_m1").await.unwrap();
        assert!(summary.leader.is_none());
        assert!(summary.candidates.iter().all(|c| c.percentage == 0.0));
    }

    #[tokio::test]
    async fn activity_buckets_by_utc_hour() {
        let state = seeded(vec![candidate("a", 0), candidate("b", 0)]).await;
        for user in ["u1", "u2", "u3"] {
            cast_vote(&state, "leinster_m1".into(), user.into(), ballot("a"))
                .await
                .unwrap();
        }

        let activity = activity(&state, "leinster_m1").await.unwrap();
        assert_eq!(activity.buckets.len(), 24);
        assert_eq!(activity.total_votes, 3);

        let peak = activity.peak_hour.unwrap();
        assert!(peak < 24);
        assert!(activity.buckets[usize::from(peak)].votes >= 2);
    }

    #[test]
    fn peak_hour_prefers_the_earliest_maximum() {
        let mut counts = [0u32; 24];
        assert_eq!(peak_hour(&counts), None);

        counts[20] = 4;
        counts[9] = 4;
        counts[12] = 1;
        assert_eq!(peak_hour(&counts), Some(9));
    }

    #[tokio::test]
    async fn create_module_defaults_expiry_and_rejects_duplicates() {
        let (state, _) = memory_state().await;

        let view = create_module(&state, create_request(&["p1", "p2"]))
            .await
            .unwrap();
        assert_eq!(view.id, "leinster_m2");
        assert_eq!(view.expires_at, "2024-03-03T17:00:00Z");
        assert_eq!(view.total_votes, 0);

        let again = create_module(&state, create_request(&["p1"])).await;
        assert!(matches!(again, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn overflowing_vote_window_is_rejected() {
        let config = AppConfig {
            vote_window: Duration::MAX,
            ..AppConfig::default()
        };
        let (state, _) = memory_state_with(config).await;

        let result = create_module(&state, create_request(&["p1"])).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn create_module_validates_candidates_and_title() {
        let (state, _) = memory_state().await;

        let duplicate = create_module(&state, create_request(&["p1", "p1"])).await;
        assert!(matches!(duplicate, Err(ServiceError::InvalidInput(_))));

        let empty = create_module(&state, create_request(&[])).await;
        assert!(matches!(empty, Err(ServiceError::InvalidInput(_))));

        let blank = CreateModuleRequest {
            title: "  ".into(),
            ..create_request(&["p1"])
        };
        assert!(matches!(
            create_module(&state, blank).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let backwards = CreateModuleRequest {
            expires_at: Some("2024-03-01T17:00:00Z".into()),
            ..create_request(&["p1"])
        };
        assert!(matches!(
            create_module(&state, backwards).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn lock_is_idempotent_and_missing_module_is_not_found() {
        let state = seeded(vec![candidate("a", 1)]).await;

        assert!(lock_module(&state, "leinster_m1").await.unwrap().locked);
        assert!(lock_module(&state, "leinster_m1").await.unwrap().locked);
        assert!(matches!(
            lock_module(&state, "ghost").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn user_vote_reports_own_ballot() {
        let state = seeded(vec![candidate("a", 0), candidate("b", 0)]).await;
        cast_vote(&state, "leinster_m1".into(), "u1".into(), ballot("b"))
            .await
            .unwrap();

        let mine = user_vote(&state, "leinster_m1", "u1").await.unwrap();
        assert_eq!(mine.candidate_id, "b");
        assert!(matches!(
            user_vote(&state, "leinster_m1", "u2").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn team_modules_are_newest_first() {
        let (state, store) = memory_state().await;
        let older = module("leinster_m1", vec![candidate("a", 0)]);
        let newer = VoteModuleEntity {
            id: "leinster_m2".into(),
            match_id: "m2".into(),
            kickoff: older.kickoff + Duration::from_secs(7 * 86_400),
            ..older.clone()
        };
        let foreign = VoteModuleEntity {
            id: "munster_m1".into(),
            team_id: "munster".into(),
            ..older.clone()
        };
        for m in [older, newer, foreign] {
            store.create_module(m).await.unwrap();
        }

        let modules = list_team_modules(&state, "leinster").await.unwrap();
        let ids: Vec<_> = modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["leinster_m2", "leinster_m1"]);
    }

    #[tokio::test]
    async fn degraded_state_refuses_votes() {
        let state = seeded(vec![candidate("a", 0)]).await;
        state.update_degraded(true).await;

        let result = cast_vote(&state, "leinster_m1".into(), "u1".into(), ballot("a")).await;
        assert!(matches!(result, Err(ServiceError::Degraded)));
    }
}
