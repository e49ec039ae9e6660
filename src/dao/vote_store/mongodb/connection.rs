use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

/// How long to wait for a fresh client to answer its first ping.
#[derive(Debug, Clone, Copy)]
pub struct ConnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ConnectPolicy {
    /// Used on startup, where the server may still be booting.
    pub const PATIENT: Self = Self {
        max_attempts: 10,
        initial_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(5),
    };

    /// Used for in-place reconnects; the storage supervisor retries on top of this.
    pub const QUICK: Self = Self {
        max_attempts: 2,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(200),
    };
}

pub async fn ping(database: &Database) -> Result<(), mongodb::error::Error> {
    database.run_command(doc! { "ping": 1 }).await.map(|_| ())
}

/// Build a client for `database_name` and wait until it answers a ping.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
    policy: ConnectPolicy,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut delay = policy.initial_delay;
    let mut attempt = 1;
    loop {
        match ping(&database).await {
            Ok(()) => return Ok((client, database)),
            Err(source) if attempt >= policy.max_attempts => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                debug!(attempt, error = %err, "MongoDB not answering yet");
                sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
                attempt += 1;
            }
        }
    }
}
