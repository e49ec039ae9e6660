use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{storage::StorageError, vote_store::VoteStore},
    state::SharedState,
};

/// Timing knobs of the supervisor loop.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub health_interval: Duration,
    /// In-place reconnects tried before the store is dropped and rebuilt.
    pub max_reconnect_attempts: u32,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(10),
            health_interval: Duration::from_secs(5),
            max_reconnect_attempts: 3,
        }
    }
}

impl SupervisorPolicy {
    fn backoff(&self, delay: Duration) -> Duration {
        (delay * 2).min(self.max_delay)
    }
}

/// Keep a vote store installed, toggling degraded mode while `backend` is unreachable.
pub async fn run<F, Fut>(state: SharedState, backend: &'static str, connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn VoteStore>, StorageError>> + Send,
{
    run_with_policy(state, backend, SupervisorPolicy::default(), connect).await
}

/// [`run`] with explicit timings.
pub async fn run_with_policy<F, Fut>(
    state: SharedState,
    backend: &'static str,
    policy: SupervisorPolicy,
    mut connect: F,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn VoteStore>, StorageError>> + Send,
{
    let mut delay = policy.initial_delay;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_vote_store(store.clone()).await;
                info!(backend, "storage connection established; leaving degraded mode");
                delay = policy.initial_delay;

                watch_store(&state, backend, &policy, store.as_ref()).await;

                warn!(backend, "exhausted storage reconnect attempts; rebuilding connection");
                state.clear_vote_store().await;
            }
            Err(err) => {
                warn!(backend, error = %err, "storage connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = policy.backoff(delay);
    }
}

/// Poll the health of `store` and repair it in place; returns once it cannot be repaired.
async fn watch_store(
    state: &SharedState,
    backend: &'static str,
    policy: &SupervisorPolicy,
    store: &dyn VoteStore,
) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!(backend, "storage healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(backend, error = %err, "storage health check failed");
                if !reconnect(state, backend, policy, store).await {
                    return;
                }
                state.update_degraded(false).await;
            }
        }
        sleep(policy.health_interval).await;
    }
}

async fn reconnect(
    state: &SharedState,
    backend: &'static str,
    policy: &SupervisorPolicy,
    store: &dyn VoteStore,
) -> bool {
    let mut delay = policy.initial_delay;
    for attempt in 0..policy.max_reconnect_attempts {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(backend, attempt, "storage reconnection succeeded");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        backend,
                        error = %err,
                        "storage reconnect failed; entering degraded mode"
                    );
                    state.update_degraded(true).await;
                } else {
                    warn!(backend, attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(delay).await;
                delay = policy.backoff(delay);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{config::AppConfig, dao::vote_store::memory::MemoryVoteStore, state::AppState};

    #[derive(Debug, thiserror::Error)]
    #[error("refused")]
    struct Refused;

    fn fast() -> SupervisorPolicy {
        SupervisorPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            health_interval: Duration::from_millis(5),
            max_reconnect_attempts: 2,
        }
    }

    #[tokio::test]
    async fn leaves_degraded_mode_after_a_failed_first_attempt() {
        let state = AppState::new(AppConfig::default());
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let task = tokio::spawn(run_with_policy(state.clone(), "memory", fast(), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StorageError::unavailable("refused".into(), Refused))
                } else {
                    Ok(Arc::new(MemoryVoteStore::new()) as Arc<dyn VoteStore>)
                }
            }
        }));

        let mut watcher = state.degraded_watcher();
        tokio::time::timeout(Duration::from_secs(2), watcher.wait_for(|degraded| !degraded))
            .await
            .unwrap()
            .unwrap();
        task.abort();

        assert!(attempts.load(Ordering::SeqCst) >= 2);
        assert!(state.require_vote_store().await.is_ok());
    }
}
