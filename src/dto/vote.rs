use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{CandidateEntity, VoteHistoryEntity, VoteModuleEntity, VoteResultEntity},
    dto::{
        format_system_time,
        validation::{validate_identifier, validate_not_blank},
    },
};

/// Share of `votes` in `total`, as a percentage rounded to one decimal.
pub fn percentage(votes: u32, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (f64::from(votes) * 1000.0 / total as f64).round() / 10.0
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
/// Candidate as exposed to clients, with its share of the vote.
pub struct CandidateView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub votes: u32,
    /// Percentage of all votes, one decimal.
    pub percentage: f64,
}

impl CandidateView {
    fn from_entity(candidate: CandidateEntity, total: u64) -> Self {
        Self {
            percentage: percentage(candidate.votes, total),
            id: candidate.id,
            name: candidate.name,
            position: candidate.position,
            photo_url: candidate.photo_url,
            votes: candidate.votes,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
/// Vote module with tallies, candidates in stored order.
pub struct VoteModuleView {
    pub id: String,
    pub team_id: String,
    pub match_id: String,
    pub title: String,
    pub opponent: String,
    /// RFC 3339 kickoff.
    pub kickoff: String,
    /// RFC 3339 instant after which the poll closes.
    pub expires_at: String,
    pub locked: bool,
    pub total_votes: u64,
    pub candidates: Vec<CandidateView>,
}

impl From<VoteModuleEntity> for VoteModuleView {
    fn from(value: VoteModuleEntity) -> Self {
        let total = value.total_votes();
        Self {
            id: value.id,
            team_id: value.team_id,
            match_id: value.match_id,
            title: value.title,
            opponent: value.opponent,
            kickoff: format_system_time(value.kickoff),
            expires_at: format_system_time(value.expires_at),
            locked: value.locked,
            total_votes: total,
            candidates: value
                .candidates
                .into_iter()
                .map(|candidate| CandidateView::from_entity(candidate, total))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Standings of a module, highest tally first.
pub struct VoteSummaryResponse {
    pub module_id: String,
    pub title: String,
    pub locked: bool,
    pub total_votes: u64,
    /// Sorted by votes descending; equal tallies keep their stored order.
    pub candidates: Vec<CandidateView>,
    /// First candidate of the standings once at least one vote exists.
    pub leader: Option<CandidateView>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
/// Body of `POST /votes/{id}/vote`.
pub struct CastVoteRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub candidate_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Confirmation returned after a recorded vote.
pub struct VoteReceipt {
    pub module_id: String,
    pub candidate_id: String,
    /// Points credited to the voter; 0 when the ledger write failed.
    pub points_awarded: i32,
    pub module: VoteModuleView,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
/// The caller's own ballot on a module.
pub struct UserVoteResponse {
    pub module_id: String,
    pub user_id: String,
    pub candidate_id: String,
    pub voted_at: String,
}

impl From<VoteHistoryEntity> for UserVoteResponse {
    fn from(value: VoteHistoryEntity) -> Self {
        Self {
            module_id: value.module_id,
            user_id: value.user_id,
            candidate_id: value.candidate_id,
            voted_at: format_system_time(value.voted_at),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
/// Number of ballots cast during one UTC hour of the day.
pub struct ActivityBucket {
    /// Hour of day, 0 to 23.
    pub hour: u8,
    pub votes: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Hourly distribution of ballots for one module.
pub struct VoteActivityResponse {
    pub module_id: String,
    pub total_votes: u32,
    /// Always 24 entries, hour 0 first.
    pub buckets: Vec<ActivityBucket>,
    /// Earliest hour holding the highest count; absent without votes.
    pub peak_hour: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
/// Candidate supplied when creating a module by hand.
pub struct CandidateInput {
    #[validate(custom(function = "validate_identifier"))]
    pub id: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub photo_url: Option<String>,
}

impl From<CandidateInput> for CandidateEntity {
    fn from(value: CandidateInput) -> Self {
        Self {
            id: value.id,
            name: value.name,
            position: value.position,
            photo_url: value.photo_url,
            votes: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
/// Body of `POST /admin/votes`.
pub struct CreateModuleRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub team_id: String,
    #[validate(custom(function = "validate_identifier"))]
    pub match_id: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub title: String,
    pub opponent: String,
    /// RFC 3339 kickoff.
    pub kickoff: String,
    /// RFC 3339 closing instant; defaults to kickoff plus the configured vote window.
    #[serde(default)]
    pub expires_at: Option<String>,
    #[validate(length(min = 1, message = "at least one candidate is required"), nested)]
    pub candidates: Vec<CandidateInput>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
/// Archived standings of a locked module.
pub struct VoteResultView {
    pub module_id: String,
    pub team_id: String,
    pub match_id: String,
    pub title: String,
    pub opponent: String,
    pub kickoff: String,
    pub candidates: Vec<CandidateView>,
    pub total_votes: u64,
    pub winner_id: Option<String>,
    pub archived_at: String,
}

impl From<VoteResultEntity> for VoteResultView {
    fn from(value: VoteResultEntity) -> Self {
        let total = value.total_votes;
        Self {
            module_id: value.module_id,
            team_id: value.team_id,
            match_id: value.match_id,
            title: value.title,
            opponent: value.opponent,
            kickoff: format_system_time(value.kickoff),
            candidates: value
                .candidates
                .into_iter()
                .map(|candidate| CandidateView::from_entity(candidate, total))
                .collect(),
            total_votes: total,
            winner_id: value.winner_id,
            archived_at: format_system_time(value.archived_at),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Filter of `GET /results`.
pub struct ResultsQuery {
    /// Only return archives of this team.
    pub team_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::vote_store::fixtures::{candidate, module};

    #[test]
    fn percentages_use_one_decimal() {
        assert_eq!(percentage(4, 9), 44.4);
        assert_eq!(percentage(5, 9), 55.6);
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(3, 3), 100.0);
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn module_view_keeps_stored_order() {
        let view = VoteModuleView::from(module(
            "leinster_m1",
            vec![candidate("a", 3), candidate("b", 5)],
        ));

        assert_eq!(view.total_votes, 8);
        assert_eq!(view.candidates[0].id, "a");
        assert_eq!(view.candidates[0].percentage, 37.5);
        assert_eq!(view.candidates[1].percentage, 62.5);
        assert_eq!(view.kickoff, "2023-11-14T22:13:20Z");
    }

    #[test]
    fn create_request_requires_candidates() {
        let request = CreateModuleRequest {
            team_id: "leinster".into(),
            match_id: "m1".into(),
            title: "Man of the Match".into(),
            opponent: "Munster".into(),
            kickoff: "2023-11-14T22:13:20Z".into(),
            expires_at: None,
            candidates: vec![],
        };
        assert!(request.validate().is_err());

        let request = CreateModuleRequest {
            candidates: vec![CandidateInput {
                id: "p1".into(),
                name: "Player One".into(),
                position: None,
                photo_url: None,
            }],
            ..request
        };
        assert!(request.validate().is_ok());
    }
}
