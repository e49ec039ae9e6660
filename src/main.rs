//! VenueScope backend entrypoint wiring REST, SSE and the storage supervisor.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use venuescope_back::{
    build_app,
    config::AppConfig,
    dao::{
        storage::StorageError,
        vote_store::{VoteStore, memory::MemoryVoteStore},
    },
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "mongo".into());
    start_storage(app_state.clone(), &backend).await?;

    let app = build_app(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, backend, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the selected vote store, supervising networked backends in the background.
async fn start_storage(state: SharedState, backend: &str) -> anyhow::Result<()> {
    match backend {
        "memory" => {
            info!("using in-memory storage; data is lost on shutdown");
            state
                .set_vote_store(Arc::new(MemoryVoteStore::new()) as Arc<dyn VoteStore>)
                .await;
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use venuescope_back::dao::vote_store::mongodb::{MongoConfig, MongoVoteStore};
            use venuescope_back::services::storage_supervisor;

            let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
            let db_name = env::var("MONGO_DB").ok();
            tokio::spawn(storage_supervisor::run(state, "mongo", move || {
                let uri = uri.clone();
                let db_name = db_name.clone();
                async move {
                    let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
                    let store = MongoVoteStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn VoteStore>)
                }
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use venuescope_back::dao::vote_store::couchdb::{CouchConfig, CouchVoteStore};
            use venuescope_back::services::storage_supervisor;

            let config = CouchConfig::from_env().context("reading CouchDB configuration")?;
            tokio::spawn(storage_supervisor::run(state, "couch", move || {
                let config = config.clone();
                async move {
                    let store = CouchVoteStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn VoteStore>)
                }
            }));
        }
        other => bail!("unsupported STORAGE_BACKEND `{other}`"),
    }
    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
