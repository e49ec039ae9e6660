//! Process-local store used for development runs and tests.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
    time::SystemTime,
};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::{
    models::{
        FixtureEntity, PointsLogEntity, PostEntity, SquadEntity, VoteHistoryEntity,
        VoteModuleEntity, VoteResultEntity,
    },
    storage::StorageResult,
    vote_store::{VoteCommand, VoteOutcome, VoteStore, tally_vote},
};

/// Store keeping every collection in memory behind a single lock.
#[derive(Clone, Default)]
pub struct MemoryVoteStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    modules: HashMap<String, VoteModuleEntity>,
    /// Keyed by `(module_id, user_id)`.
    history: HashMap<(String, String), VoteHistoryEntity>,
    results: HashMap<String, VoteResultEntity>,
    fixtures: HashMap<String, FixtureEntity>,
    squads: HashMap<String, SquadEntity>,
    posts: HashMap<String, PostEntity>,
    points: Vec<PointsLogEntity>,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoteStore for MemoryVoteStore {
    fn create_module(&self, module: VoteModuleEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.write().await;
            match state.modules.entry(module.id.clone()) {
                Entry::Occupied(_) => Ok(false),
                Entry::Vacant(slot) => {
                    slot.insert(module);
                    Ok(true)
                }
            }
        })
    }

    fn save_module(&self, module: VoteModuleEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write().await.modules.insert(module.id.clone(), module);
            Ok(())
        })
    }

    fn find_module(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteModuleEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.modules.get(&id).cloned()) })
    }

    fn list_modules(&self) -> BoxFuture<'static, StorageResult<Vec<VoteModuleEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.modules.values().cloned().collect()) })
    }

    fn lock_module(
        &self,
        id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteModuleEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.write().await;
            Ok(state.modules.get_mut(&id).map(|module| {
                if !module.locked {
                    module.locked = true;
                    module.updated_at = SystemTime::now();
                }
                module.clone()
            }))
        })
    }

    fn cast_vote(&self, command: VoteCommand) -> BoxFuture<'static, StorageResult<VoteOutcome>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let state = &mut *guard;
            let Some(module) = state.modules.get_mut(&command.module_id) else {
                return Ok(VoteOutcome::ModuleNotFound);
            };

            let key = (command.module_id.clone(), command.user_id.clone());
            let already_voted = state.history.contains_key(&key);
            if let Err(rejection) = tally_vote(module, already_voted, &command) {
                return Ok(rejection.into());
            }

            state.history.insert(key, command.history());
            Ok(VoteOutcome::Recorded(module.clone()))
        })
    }

    fn find_history(
        &self,
        module_id: String,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteHistoryEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .history
                .get(&(module_id, user_id))
                .cloned())
        })
    }

    fn list_history(
        &self,
        module_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteHistoryEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .history
                .values()
                .filter(|entry| entry.module_id == module_id)
                .cloned()
                .collect())
        })
    }

    fn create_result(&self, result: VoteResultEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.write().await;
            match state.results.entry(result.module_id.clone()) {
                Entry::Occupied(_) => Ok(false),
                Entry::Vacant(slot) => {
                    slot.insert(result);
                    Ok(true)
                }
            }
        })
    }

    fn find_result(
        &self,
        module_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<VoteResultEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.results.get(&module_id).cloned()) })
    }

    fn list_results(&self) -> BoxFuture<'static, StorageResult<Vec<VoteResultEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.results.values().cloned().collect()) })
    }

    fn save_fixtures(&self, fixtures: Vec<FixtureEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.write().await;
            for fixture in fixtures {
                state.fixtures.insert(fixture.id.clone(), fixture);
            }
            Ok(())
        })
    }

    fn list_fixtures(&self) -> BoxFuture<'static, StorageResult<Vec<FixtureEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.fixtures.values().cloned().collect()) })
    }

    fn list_fixtures_between(
        &self,
        from: SystemTime,
        to: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<FixtureEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .fixtures
                .values()
                .filter(|fixture| fixture.kickoff >= from && fixture.kickoff < to)
                .cloned()
                .collect())
        })
    }

    fn save_squad(&self, squad: SquadEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write().await.squads.insert(squad.id.clone(), squad);
            Ok(())
        })
    }

    fn find_squad(
        &self,
        team_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<SquadEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.squads.get(&team_id).cloned()) })
    }

    fn save_posts(&self, posts: Vec<PostEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.write().await;
            for post in posts {
                state.posts.insert(post.id.clone(), post);
            }
            Ok(())
        })
    }

    fn list_recent_posts(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<PostEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut posts: Vec<PostEntity> = inner.read().await.posts.values().cloned().collect();
            // HashMap order is arbitrary; the id keeps equal timestamps deterministic.
            posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
            posts.truncate(limit);
            Ok(posts)
        })
    }

    fn append_points(&self, log: PointsLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write().await.points.push(log);
            Ok(())
        })
    }

    fn list_points(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PointsLogEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .points
                .iter()
                .filter(|log| log.user_id == user_id)
                .cloned()
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::vote_store::fixtures::{candidate, module};

    fn vote(user: &str, candidate_id: &str) -> VoteCommand {
        VoteCommand {
            module_id: "leinster_m1".into(),
            user_id: user.into(),
            candidate_id: candidate_id.into(),
            voted_at: SystemTime::now(),
        }
    }

    async fn seeded_store() -> MemoryVoteStore {
        let store = MemoryVoteStore::new();
        let inserted = store
            .create_module(module(
                "leinster_m1",
                vec![candidate("a", 3), candidate("b", 5)],
            ))
            .await
            .unwrap();
        assert!(inserted);
        store
    }

    #[tokio::test]
    async fn parallel_votes_from_one_user_count_once() {
        let store = seeded_store().await;

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                let target = if i % 2 == 0 { "a" } else { "b" };
                tokio::spawn(async move { store.cast_vote(vote("u1", target)).await.unwrap() })
            })
            .collect();

        let mut recorded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                VoteOutcome::Recorded(_) => recorded += 1,
                VoteOutcome::AlreadyVoted => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(recorded, 1);

        let module = store
            .find_module("leinster_m1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(module.total_votes(), 9);
        let history = store.list_history("leinster_m1".into()).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn recorded_vote_matches_worked_example() {
        let store = seeded_store().await;

        let outcome = store.cast_vote(vote("u1", "a")).await.unwrap();
        let VoteOutcome::Recorded(module) = outcome else {
            panic!("expected a recorded vote, got {outcome:?}");
        };
        let counts: Vec<_> = module.candidates.iter().map(|c| c.votes).collect();
        assert_eq!(counts, vec![4, 5]);
        assert_eq!(module.total_votes(), 9);

        let history = store
            .find_history("leinster_m1".into(), "u1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(history.candidate_id, "a");
    }

    #[tokio::test]
    async fn locked_module_rejects_and_keeps_counts() {
        let store = seeded_store().await;
        store.lock_module("leinster_m1".into()).await.unwrap();

        let outcome = store.cast_vote(vote("u1", "a")).await.unwrap();
        assert_eq!(outcome, VoteOutcome::Locked);

        let module = store
            .find_module("leinster_m1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(module.total_votes(), 8);
        assert!(
            store
                .find_history("leinster_m1".into(), "u1".into())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn unknown_candidate_and_missing_module() {
        let store = seeded_store().await;

        assert_eq!(
            store.cast_vote(vote("u1", "zz")).await.unwrap(),
            VoteOutcome::UnknownCandidate
        );
        // A rejected vote must not burn the user's single vote.
        assert!(matches!(
            store.cast_vote(vote("u1", "b")).await.unwrap(),
            VoteOutcome::Recorded(_)
        ));

        let mut missing = vote("u1", "a");
        missing.module_id = "nope".into();
        assert_eq!(
            store.cast_vote(missing).await.unwrap(),
            VoteOutcome::ModuleNotFound
        );
    }

    #[tokio::test]
    async fn create_module_keeps_existing_votes() {
        let store = seeded_store().await;
        let again = store
            .create_module(module("leinster_m1", vec![candidate("x", 0)]))
            .await
            .unwrap();
        assert!(!again);

        let kept = store
            .find_module("leinster_m1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.candidates.len(), 2);
    }
}
