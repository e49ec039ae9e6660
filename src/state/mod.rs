mod sse;

use std::{future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{RwLock, broadcast, watch};
use tokio::time::timeout;

use crate::{
    config::AppConfig,
    dao::{storage::StorageResult, vote_store::VoteStore},
    dto::sse::ServerEvent,
    error::ServiceError,
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;
/// Upper bound for a single storage call on the request path.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
/// Buffered events per vote feed before slow subscribers start lagging.
const VOTE_FEED_CAPACITY: usize = 16;

/// Central application state storing the storage handle, configuration and live feeds.
pub struct AppState {
    config: AppConfig,
    vote_store: RwLock<Option<Arc<dyn VoteStore>>>,
    vote_feeds: DashMap<String, SseHub>,
    degraded: watch::Sender<bool>,
    store_timeout: Duration,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            vote_store: RwLock::new(None),
            vote_feeds: DashMap::new(),
            degraded: degraded_tx,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current vote store, if one is installed.
    pub async fn vote_store(&self) -> Option<Arc<dyn VoteStore>> {
        let guard = self.vote_store.read().await;
        guard.as_ref().cloned()
    }

    /// Return the vote store or [`ServiceError::Degraded`] while storage is unusable.
    pub async fn require_vote_store(&self) -> Result<Arc<dyn VoteStore>, ServiceError> {
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        self.vote_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new vote store implementation and leave degraded mode.
    pub async fn set_vote_store(&self, store: Arc<dyn VoteStore>) {
        {
            let mut guard = self.vote_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current vote store and enter degraded mode.
    pub async fn clear_vote_store(&self) {
        {
            let mut guard = self.vote_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Run a storage call under the request timeout.
    pub async fn bounded<T, F>(&self, call: F) -> Result<T, ServiceError>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(ServiceError::Timeout),
        }
    }

    /// Subscribe to the live tally of `module_id`, creating its hub on first use.
    ///
    /// The receiver is registered while the entry is held so a concurrent
    /// [`release_vote_feed`](Self::release_vote_feed) cannot drop the hub in between.
    pub fn subscribe_vote_feed(&self, module_id: &str) -> broadcast::Receiver<ServerEvent> {
        self.vote_feeds
            .entry(module_id.to_owned())
            .or_insert_with(|| SseHub::new(VOTE_FEED_CAPACITY))
            .subscribe()
    }

    /// Hub for `module_id` only when someone is watching it.
    pub fn existing_vote_feed(&self, module_id: &str) -> Option<SseHub> {
        self.vote_feeds.get(module_id).map(|hub| hub.clone())
    }

    /// Drop the hub of `module_id` once its last subscriber is gone.
    pub fn release_vote_feed(&self, module_id: &str) {
        self.vote_feeds
            .remove_if(module_id, |_, hub| hub.subscriber_count() == 0);
    }
}
