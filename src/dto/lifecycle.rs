use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{FixtureEntity, PlayerEntity, SquadEntity},
    dto::{
        format_system_time, parse_timestamp,
        validation::{validate_identifier, validate_not_blank},
    },
    error::ServiceError,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Where a fixture stands relative to the current instant.
pub enum FixtureWindow {
    Upcoming,
    Live,
    Finished,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Filters of `GET /fixtures`; text filters ignore case.
pub struct FixturesQuery {
    pub city: Option<String>,
    pub sport: Option<String>,
    pub window: Option<FixtureWindow>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Fixture enriched with its time window.
pub struct FixtureView {
    pub id: String,
    pub sport: String,
    pub competition: String,
    pub home_team_id: String,
    pub home_team: String,
    pub away_team_id: String,
    pub away_team: String,
    pub kickoff: String,
    pub city: String,
    pub venue: String,
    pub window: FixtureWindow,
}

impl FixtureView {
    pub fn new(fixture: FixtureEntity, window: FixtureWindow) -> Self {
        Self {
            id: fixture.id,
            sport: fixture.sport,
            competition: fixture.competition,
            home_team_id: fixture.home_team_id,
            home_team: fixture.home_team,
            away_team_id: fixture.away_team_id,
            away_team: fixture.away_team,
            kickoff: format_system_time(fixture.kickoff),
            city: fixture.city,
            venue: fixture.venue,
            window,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
/// Fixture row accepted by `PUT /admin/fixtures`.
pub struct FixtureInput {
    #[validate(custom(function = "validate_identifier"))]
    pub id: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub sport: String,
    #[serde(default)]
    pub competition: String,
    #[validate(custom(function = "validate_identifier"))]
    pub home_team_id: String,
    pub home_team: String,
    #[validate(custom(function = "validate_identifier"))]
    pub away_team_id: String,
    pub away_team: String,
    /// RFC 3339 kickoff.
    pub kickoff: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub venue: String,
}

impl TryFrom<FixtureInput> for FixtureEntity {
    type Error = ServiceError;

    fn try_from(value: FixtureInput) -> Result<Self, Self::Error> {
        if value.home_team_id == value.away_team_id {
            return Err(ServiceError::InvalidInput(format!(
                "fixture `{}` opposes `{}` to itself",
                value.id, value.home_team_id
            )));
        }
        Ok(Self {
            kickoff: parse_timestamp("kickoff", &value.kickoff)?,
            id: value.id,
            sport: value.sport,
            competition: value.competition,
            home_team_id: value.home_team_id,
            home_team: value.home_team,
            away_team_id: value.away_team_id,
            away_team: value.away_team,
            city: value.city,
            venue: value.venue,
        })
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
/// Player listed in a squad import.
pub struct PlayerInput {
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

impl From<PlayerInput> for PlayerEntity {
    fn from(value: PlayerInput) -> Self {
        Self {
            id: value.id,
            name: value.name,
            position: value.position,
            photo_url: value.photo_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
/// Squad accepted by `PUT /admin/squads`, keyed by team id.
pub struct SquadInput {
    #[validate(custom(function = "validate_identifier"))]
    pub id: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[validate(nested)]
    pub players: Vec<PlayerInput>,
}

impl From<SquadInput> for SquadEntity {
    fn from(value: SquadInput) -> Self {
        Self {
            id: value.id,
            name: value.name,
            city: value.city,
            players: value.players.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
/// Count of rows written by an import.
pub struct ImportResponse {
    pub imported: usize,
}

#[derive(Debug, Default, Clone, Serialize, ToSchema, PartialEq, Eq)]
/// Outcome of the auto-create sweep.
pub struct AutoCreateReport {
    /// Fixtures kicking off on the sweep's UTC day.
    pub scanned: usize,
    /// Module ids created during this run.
    pub created: Vec<String>,
    /// Team sides skipped because the module exists or no squad is known.
    pub skipped: usize,
}

#[derive(Debug, Default, Clone, Serialize, ToSchema, PartialEq, Eq)]
/// Outcome of the auto-lock sweep.
pub struct AutoLockReport {
    pub scanned: usize,
    /// Module ids locked during this run.
    pub locked: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize, ToSchema, PartialEq, Eq)]
/// Outcome of the backup sweep.
pub struct BackupReport {
    pub scanned: usize,
    /// Module ids archived during this run.
    pub archived: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
/// Combined outcome of `POST /cron/run`.
pub struct LifecycleReport {
    pub auto_create: AutoCreateReport,
    pub auto_lock: AutoLockReport,
    pub backup: BackupReport,
}
