use crate::core::pacing::store::PacingStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

/// Redis-backed pacing store. INCRBYFLOAT/INCRBY give the atomicity the
/// engine's contract needs; keys carry the UTC date so rollover is free.
pub struct RedisPacingStore {
    conn: ConnectionManager,
}

impl RedisPacingStore {
    /// Connects eagerly so a bad URL fails startup, not the first bid.
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(url, "pacing store connected");
        Ok(Self { conn })
    }

    /// TTL goes on the write that created the key; later writes leave the
    /// original expiry in place.
    async fn expire_if_new(
        &self,
        key: &str,
        created: bool,
        ttl: Option<Duration>,
    ) -> Result<(), anyhow::Error> {
        if let (true, Some(ttl)) = (created, ttl) {
            let mut conn = self.conn.clone();
            conn.expire::<_, ()>(key, ttl.as_secs() as i64).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PacingStore for RedisPacingStore {
    async fn get_float(&self, key: &str) -> Result<Option<f64>, anyhow::Error> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn incr_float(
        &self,
        key: &str,
        delta: f64,
        ttl: Option<Duration>,
    ) -> Result<f64, anyhow::Error> {
        let mut conn = self.conn.clone();
        let value: f64 = conn.incr(key, delta).await?;
        self.expire_if_new(key, (value - delta).abs() < f64::EPSILON, ttl)
            .await?;
        Ok(value)
    }

    async fn get_int(&self, key: &str) -> Result<Option<i64>, anyhow::Error> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn incr_int(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, anyhow::Error> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, delta).await?;
        self.expire_if_new(key, value == delta, ttl).await?;
        Ok(value)
    }
}
