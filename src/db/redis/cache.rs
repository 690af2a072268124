use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Embedding of a free-text query, namespaced by model
    QueryEmbedding { model: String, text: String },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::QueryEmbedding { model, text } => {
                write!(f, "embed:{}:{}", model, text.trim())
            }
        }
    }
}

/// Creates a Redis client for caching
///
/// Opening the client does not connect yet; connections are made per
/// operation, so an unreachable Redis shows up as cache misses and failed
/// background writes rather than as a startup error.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Redis-backed cache whose writes happen on a background task
///
/// Reads go straight to Redis. Writes are queued on an unbounded channel and
/// applied by the writer task spawned in [`Cache::new`], so callers never
/// wait on Redis to store a value. Clones share the same queue.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Stops the writer task after flushing pending writes
    ///
    /// Every write queued before this call is sent to Redis before the task
    /// exits, and this method returns only once it has. Writes queued later
    /// through a surviving [`Cache`] clone are dropped.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");

        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task ended abnormally");
        }
    }
}

impl Cache {
    /// Creates a cache and spawns its writer task
    ///
    /// The writer applies queued writes one at a time with `SET EX`. A failed
    /// write is logged and dropped; it never reaches the caller that queued
    /// it. Keep the returned [`CacheWriterHandle`] and call
    /// [`shutdown`](CacheWriterHandle::shutdown) before exiting, or queued
    /// writes may be lost.
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        let task = tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        (cache, CacheWriterHandle { shutdown_tx, task })
    }

    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");
        let mut failed_writes = 0usize;

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        failed_writes += 1;
                        tracing::error!(error = %e, failed_writes, "Failed to write to Redis cache");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cache writer shutting down, flushing remaining writes");

                    // Senders live in every Cache clone, so drain what is queued now
                    while let Ok(msg) = write_rx.try_recv() {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush cache write during shutdown");
                        }
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    /// Reads and deserializes a cached value; `None` on a miss
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Queues a value for writing without waiting for Redis
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheWriteMessage {
            key: key.to_string(),
            value: json,
            ttl,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }
}
