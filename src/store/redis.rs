use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::error::{BridgeError, BridgeResult};
use crate::store::{PopConnection, Store};
use crate::types::QueueKey;

/// Redis-backed store, the production side of the bridge.
///
/// Writes go through a [`ConnectionManager`] (auto-reconnecting, cheap to
/// clone); blocking pops go through dedicated multiplexed connections so a
/// `BRPOP` never stalls producer commands. Queue lists are `LPUSH`/`BRPOP`,
/// the schedule is a `ZADD` sorted set, and the discovery index a `SADD`
/// set, matching the structures the backend job processor reads.
pub struct RedisStore {
    client: redis::Client,
    manager: RwLock<Option<ConnectionManager>>,
}

impl RedisStore {
    /// Create a store handle without connecting. Commands fail with
    /// [`BridgeError::StoreNotReady`] until [`RedisStore::establish`] runs.
    pub fn new(url: &str) -> BridgeResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| BridgeError::Store(format!("invalid redis url: {e}")))?;
        Ok(Self {
            client,
            manager: RwLock::new(None),
        })
    }

    /// Create a store handle and connect immediately
    pub async fn connect(url: &str) -> BridgeResult<Self> {
        let store = Self::new(url)?;
        store.establish().await?;
        Ok(store)
    }

    /// Establish the managed write connection
    pub async fn establish(&self) -> BridgeResult<()> {
        debug!("Connecting to redis store");
        let manager = ConnectionManager::new(self.client.clone()).await?;
        *self.manager.write() = Some(manager);
        info!("Connected to redis store");
        Ok(())
    }

    /// Drop the write connection; subsequent commands fail with
    /// [`BridgeError::StoreNotReady`]
    pub fn close(&self) {
        *self.manager.write() = None;
    }

    fn write_conn(&self) -> BridgeResult<ConnectionManager> {
        self.manager.read().clone().ok_or(BridgeError::StoreNotReady)
    }
}

#[async_trait]
impl Store for RedisStore {
    fn is_ready(&self) -> bool {
        self.manager.read().is_some()
    }

    async fn push(&self, key: &QueueKey, raw: String) -> BridgeResult<()> {
        let mut conn = self.write_conn()?;
        conn.lpush::<_, _, ()>(key.as_str(), raw).await?;
        Ok(())
    }

    async fn schedule(&self, key: &str, score_ms: i64, raw: String) -> BridgeResult<()> {
        let mut conn = self.write_conn()?;
        conn.zadd::<_, _, _, ()>(key, raw, score_ms).await?;
        Ok(())
    }

    async fn register_queue(&self, key: &str, queue_name: &str) -> BridgeResult<()> {
        let mut conn = self.write_conn()?;
        conn.sadd::<_, _, ()>(key, queue_name).await?;
        Ok(())
    }

    async fn registered_queues(&self, key: &str) -> BridgeResult<Vec<String>> {
        let mut conn = self.write_conn()?;
        Ok(conn.smembers(key).await?)
    }

    async fn pop_connection(&self) -> BridgeResult<Box<dyn PopConnection>> {
        if !self.is_ready() {
            return Err(BridgeError::StoreNotReady);
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(Box::new(RedisPopConnection { conn }))
    }
}

struct RedisPopConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl PopConnection for RedisPopConnection {
    async fn blocking_pop(
        &mut self,
        key: &QueueKey,
        timeout: Duration,
    ) -> BridgeResult<Option<String>> {
        // BRPOP returns (key, value) or nil on timeout
        let reply: Option<(String, String)> = self
            .conn
            .brpop(key.as_str(), timeout.as_secs_f64())
            .await?;
        Ok(reply.map(|(_, raw)| raw))
    }
}
