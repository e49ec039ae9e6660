use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    CandidateEntity, FixtureEntity, PlayerEntity, PointsLogEntity, PostEntity, SquadEntity,
    VoteHistoryEntity, VoteModuleEntity, VoteResultEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteModuleDocument {
    #[serde(rename = "_id")]
    id: String,
    team_id: String,
    match_id: String,
    title: String,
    opponent: String,
    kickoff: DateTime,
    expires_at: DateTime,
    #[serde(default)]
    locked: bool,
    candidates: Vec<CandidateEntity>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<VoteModuleEntity> for MongoVoteModuleDocument {
    fn from(value: VoteModuleEntity) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            match_id: value.match_id,
            title: value.title,
            opponent: value.opponent,
            kickoff: DateTime::from_system_time(value.kickoff),
            expires_at: DateTime::from_system_time(value.expires_at),
            locked: value.locked,
            candidates: value.candidates,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoVoteModuleDocument> for VoteModuleEntity {
    fn from(value: MongoVoteModuleDocument) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            match_id: value.match_id,
            title: value.title,
            opponent: value.opponent,
            kickoff: value.kickoff.to_system_time(),
            expires_at: value.expires_at.to_system_time(),
            locked: value.locked,
            candidates: value.candidates,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// History marker; the composite `_id` makes a second marker for the same
/// user and module a duplicate-key write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteHistoryDocument {
    #[serde(rename = "_id")]
    id: String,
    module_id: String,
    user_id: String,
    candidate_id: String,
    voted_at: DateTime,
}

pub fn history_doc_id(module_id: &str, user_id: &str) -> String {
    format!("{module_id}::{user_id}")
}

impl From<VoteHistoryEntity> for MongoVoteHistoryDocument {
    fn from(value: VoteHistoryEntity) -> Self {
        Self {
            id: history_doc_id(&value.module_id, &value.user_id),
            module_id: value.module_id,
            user_id: value.user_id,
            candidate_id: value.candidate_id,
            voted_at: DateTime::from_system_time(value.voted_at),
        }
    }
}

impl From<MongoVoteHistoryDocument> for VoteHistoryEntity {
    fn from(value: MongoVoteHistoryDocument) -> Self {
        Self {
            module_id: value.module_id,
            user_id: value.user_id,
            candidate_id: value.candidate_id,
            voted_at: value.voted_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteResultDocument {
    /// Module id; one archive per module.
    #[serde(rename = "_id")]
    module_id: String,
    team_id: String,
    match_id: String,
    title: String,
    opponent: String,
    kickoff: DateTime,
    candidates: Vec<CandidateEntity>,
    total_votes: i64,
    winner_id: Option<String>,
    archived_at: DateTime,
}

impl From<VoteResultEntity> for MongoVoteResultDocument {
    fn from(value: VoteResultEntity) -> Self {
        Self {
            module_id: value.module_id,
            team_id: value.team_id,
            match_id: value.match_id,
            title: value.title,
            opponent: value.opponent,
            kickoff: DateTime::from_system_time(value.kickoff),
            candidates: value.candidates,
            total_votes: i64::try_from(value.total_votes).unwrap_or(i64::MAX),
            winner_id: value.winner_id,
            archived_at: DateTime::from_system_time(value.archived_at),
        }
    }
}

impl From<MongoVoteResultDocument> for VoteResultEntity {
    fn from(value: MongoVoteResultDocument) -> Self {
        Self {
            module_id: value.module_id,
            team_id: value.team_id,
            match_id: value.match_id,
            title: value.title,
            opponent: value.opponent,
            kickoff: value.kickoff.to_system_time(),
            candidates: value.candidates,
            total_votes: u64::try_from(value.total_votes).unwrap_or_default(),
            winner_id: value.winner_id,
            archived_at: value.archived_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoFixtureDocument {
    #[serde(rename = "_id")]
    id: String,
    sport: String,
    competition: String,
    home_team_id: String,
    home_team: String,
    away_team_id: String,
    away_team: String,
    kickoff: DateTime,
    city: String,
    venue: String,
}

impl From<FixtureEntity> for MongoFixtureDocument {
    fn from(value: FixtureEntity) -> Self {
        Self {
            id: value.id,
            sport: value.sport,
            competition: value.competition,
            home_team_id: value.home_team_id,
            home_team: value.home_team,
            away_team_id: value.away_team_id,
            away_team: value.away_team,
            kickoff: DateTime::from_system_time(value.kickoff),
            city: value.city,
            venue: value.venue,
        }
    }
}

impl From<MongoFixtureDocument> for FixtureEntity {
    fn from(value: MongoFixtureDocument) -> Self {
        Self {
            id: value.id,
            sport: value.sport,
            competition: value.competition,
            home_team_id: value.home_team_id,
            home_team: value.home_team,
            away_team_id: value.away_team_id,
            away_team: value.away_team,
            kickoff: value.kickoff.to_system_time(),
            city: value.city,
            venue: value.venue,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSquadDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    city: String,
    players: Vec<PlayerEntity>,
}

impl From<SquadEntity> for MongoSquadDocument {
    fn from(value: SquadEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            city: value.city,
            players: value.players,
        }
    }
}

impl From<MongoSquadDocument> for SquadEntity {
    fn from(value: MongoSquadDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            city: value.city,
            players: value.players,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPostDocument {
    #[serde(rename = "_id")]
    id: String,
    source: String,
    author_id: String,
    title: String,
    likes: u32,
    comments: u32,
    created_at: DateTime,
}

impl From<PostEntity> for MongoPostDocument {
    fn from(value: PostEntity) -> Self {
        Self {
            id: value.id,
            source: value.source,
            author_id: value.author_id,
            title: value.title,
            likes: value.likes,
            comments: value.comments,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoPostDocument> for PostEntity {
    fn from(value: MongoPostDocument) -> Self {
        Self {
            id: value.id,
            source: value.source,
            author_id: value.author_id,
            title: value.title,
            likes: value.likes,
            comments: value.comments,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPointsLogDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    user_id: String,
    action: String,
    points: i32,
    reference: Option<String>,
    created_at: DateTime,
}

impl From<PointsLogEntity> for MongoPointsLogDocument {
    fn from(value: PointsLogEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            action: value.action,
            points: value.points,
            reference: value.reference,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoPointsLogDocument> for PointsLogEntity {
    fn from(value: MongoPointsLogDocument) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            action: value.action,
            points: value.points,
            reference: value.reference,
            created_at: value.created_at.to_system_time(),
        }
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}
