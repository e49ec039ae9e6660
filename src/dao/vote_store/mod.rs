#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;

use crate::dao::models::{
    FixtureEntity, PointsLogEntity, PostEntity, SquadEntity, VoteHistoryEntity, VoteModuleEntity,
    VoteResultEntity,
};
use crate::dao::storage::StorageResult;

/// Request to record one vote, handed to the backend transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteCommand {
    pub module_id: String,
    pub user_id: String,
    pub candidate_id: String,
    pub voted_at: SystemTime,
}

impl VoteCommand {
    /// History marker written alongside the counter increment.
    pub fn history(&self) -> VoteHistoryEntity {
        VoteHistoryEntity {
            module_id: self.module_id.clone(),
            user_id: self.user_id.clone(),
            candidate_id: self.candidate_id.clone(),
            voted_at: self.voted_at,
        }
    }
}

/// Result of a vote transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was counted; carries the module as written.
    Recorded(VoteModuleEntity),
    ModuleNotFound,
    Locked,
    AlreadyVoted,
    UnknownCandidate,
}

/// Reason a vote cannot be applied to a loaded module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteRejection {
    Locked,
    AlreadyVoted,
    UnknownCandidate,
}

impl From<VoteRejection> for VoteOutcome {
    fn from(value: VoteRejection) -> Self {
        match value {
            VoteRejection::Locked => VoteOutcome::Locked,
            VoteRejection::AlreadyVoted => VoteOutcome::AlreadyVoted,
            VoteRejection::UnknownCandidate => VoteOutcome::UnknownCandidate,
        }
    }
}

/// Apply a vote to a module loaded inside a backend transaction.
///
/// Checks run in order: lock flag, existing history marker, candidate lookup.
/// On success exactly one counter grows by one; on rejection `module` is left
/// untouched.
pub fn tally_vote(
    module: &mut VoteModuleEntity,
    already_voted: bool,
    command: &VoteCommand,
) -> Result<(), VoteRejection> {
    if module.locked {
        return Err(VoteRejection::Locked);
    }
    if already_voted {
        return Err(VoteRejection::AlreadyVoted);
    }
    let candidate = module
        .candidates
        .iter_mut()
        .find(|candidate| candidate.id == command.candidate_id)
        .ok_or(VoteRejection::UnknownCandidate)?;

    candidate.votes = candidate.votes.saturating_add(1);
    module.updated_at = command.voted_at;
    Ok(())
}

/// Abstraction over the persistence layer for vote modules and their satellites.
pub trait VoteStore: Send + Sync {
    /// Insert the module unless one with the same id exists; returns whether it was inserted.
    fn create_module(&self, module: VoteModuleEntity) -> BoxFuture<'static, StorageResult<bool>>;
    fn save_module(&self, module: VoteModuleEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_module(&self, id: String)
    -> BoxFuture<'static, StorageResult<Option<VoteModuleEntity>>>;
    fn list_modules(&self) -> BoxFuture<'static, StorageResult<Vec<VoteModuleEntity>>>;
    /// Set the lock flag and return the module as written.
    fn lock_module(&self, id: String)
    -> BoxFuture<'static, StorageResult<Option<VoteModuleEntity>>>;
    /// Atomically check the lock and history marker, bump the counter and write the marker.
    fn cast_vote(&self, command: VoteCommand) -> BoxFuture<'static, StorageResult<VoteOutcome>>;
    fn find_history(
        &self,
        module_id: String,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteHistoryEntity>>>;
    fn list_history(
        &self,
        module_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteHistoryEntity>>>;
    /// Insert the archive unless one exists for the module; returns whether it was inserted.
    fn create_result(&self, result: VoteResultEntity) -> BoxFuture<'static, StorageResult<bool>>;
    fn find_result(
        &self,
        module_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteResultEntity>>>;
    fn list_results(&self) -> BoxFuture<'static, StorageResult<Vec<VoteResultEntity>>>;
    fn save_fixtures(&self, fixtures: Vec<FixtureEntity>) -> BoxFuture<'static, StorageResult<()>>;
    fn list_fixtures(&self) -> BoxFuture<'static, StorageResult<Vec<FixtureEntity>>>;
    /// Fixtures with `from <= kickoff < to`.
    fn list_fixtures_between(
        &self,
        from: SystemTime,
        to: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<FixtureEntity>>>;
    fn save_squad(&self, squad: SquadEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_squad(&self, team_id: String)
    -> BoxFuture<'static, StorageResult<Option<SquadEntity>>>;
    fn save_posts(&self, posts: Vec<PostEntity>) -> BoxFuture<'static, StorageResult<()>>;
    /// Most recent posts first, at most `limit` of them.
    fn list_recent_posts(&self, limit: usize)
    -> BoxFuture<'static, StorageResult<Vec<PostEntity>>>;
    fn append_points(&self, log: PointsLogEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_points(&self, user_id: String)
    -> BoxFuture<'static, StorageResult<Vec<PointsLogEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
