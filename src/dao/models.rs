use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Build the identifier of the vote module attached to `team_id` for `match_id`.
pub fn module_id(team_id: &str, match_id: &str) -> String {
    format!("{team_id}_{match_id}")
}

/// Player that can receive Man-of-the-Match votes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateEntity {
    /// Identifier of the candidate, unique within its module.
    pub id: String,
    /// Display name of the player.
    pub name: String,
    /// Playing position, when known.
    pub position: Option<String>,
    /// Link to a portrait of the player.
    pub photo_url: Option<String>,
    /// Number of votes received so far.
    pub votes: u32,
}

/// Man-of-the-Match poll attached to one team for one match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteModuleEntity {
    /// Primary key, see [`module_id`].
    pub id: String,
    /// Team the poll belongs to.
    pub team_id: String,
    /// Fixture the poll is about.
    pub match_id: String,
    /// Display title of the poll.
    pub title: String,
    /// Name of the opposing side.
    pub opponent: String,
    /// Kickoff of the match.
    pub kickoff: SystemTime,
    /// Instant after which the auto-lock sweep closes the poll.
    pub expires_at: SystemTime,
    /// Once set, vote counts must not change anymore.
    pub locked: bool,
    /// Ordered list of candidates and their counters.
    pub candidates: Vec<CandidateEntity>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the module was written.
    pub updated_at: SystemTime,
}

impl VoteModuleEntity {
    /// Sum of every candidate counter.
    pub fn total_votes(&self) -> u64 {
        self.candidates.iter().map(|c| u64::from(c.votes)).sum()
    }
}

/// Marker proving a user already voted on a module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteHistoryEntity {
    pub module_id: String,
    pub user_id: String,
    pub candidate_id: String,
    pub voted_at: SystemTime,
}

/// Frozen copy of a locked module written by the backup sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteResultEntity {
    pub module_id: String,
    pub team_id: String,
    pub match_id: String,
    pub title: String,
    pub opponent: String,
    pub kickoff: SystemTime,
    /// Candidates sorted by votes, highest first.
    pub candidates: Vec<CandidateEntity>,
    pub total_votes: u64,
    /// First candidate after sorting, provided it received at least one vote.
    pub winner_id: Option<String>,
    pub archived_at: SystemTime,
}

/// Scheduled match between two sides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixtureEntity {
    pub id: String,
    /// Sport label (e.g. "football", "rugby").
    pub sport: String,
    pub competition: String,
    pub home_team_id: String,
    pub home_team: String,
    pub away_team_id: String,
    pub away_team: String,
    pub kickoff: SystemTime,
    pub city: String,
    pub venue: String,
}

/// Registered squad of a team, used to seed vote candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SquadEntity {
    /// Team identifier.
    pub id: String,
    pub name: String,
    pub city: String,
    pub players: Vec<PlayerEntity>,
}

/// Squad member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    pub id: String,
    pub name: String,
    pub position: Option<String>,
    pub photo_url: Option<String>,
}

impl From<PlayerEntity> for CandidateEntity {
    fn from(player: PlayerEntity) -> Self {
        Self {
            id: player.id,
            name: player.name,
            position: player.position,
            photo_url: player.photo_url,
            votes: 0,
        }
    }
}

/// Social post snapshot ranked by the trending endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostEntity {
    pub id: String,
    /// Origin collection of the post (fan hub, meetups, ...).
    pub source: String,
    pub author_id: String,
    pub title: String,
    pub likes: u32,
    pub comments: u32,
    pub created_at: SystemTime,
}

/// Entry of the gamification ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PointsLogEntity {
    pub id: Uuid,
    pub user_id: String,
    /// Machine readable action label, e.g. `mom_vote`.
    pub action: String,
    pub points: i32,
    /// Identifier of the object that triggered the reward.
    pub reference: Option<String>,
    pub created_at: SystemTime,
}
