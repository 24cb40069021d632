use async_trait::async_trait;
use std::time::Duration;

/// Counter-store capability set the pacing engine runs on. Increments
/// are atomic on the backing store; `ttl` is applied on the write that
/// creates the key and `None` means the key never expires.
#[async_trait]
pub trait PacingStore: Send + Sync {
    async fn get_float(&self, key: &str) -> Result<Option<f64>, anyhow::Error>;

    /// Atomic float increment, returns the post-increment value.
    async fn incr_float(
        &self,
        key: &str,
        delta: f64,
        ttl: Option<Duration>,
    ) -> Result<f64, anyhow::Error>;

    async fn get_int(&self, key: &str) -> Result<Option<i64>, anyhow::Error>;

    /// Atomic integer increment (negative delta decrements), returns the
    /// post-increment value.
    async fn incr_int(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, anyhow::Error>;
}
