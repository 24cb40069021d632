use crate::core::pacing::store::PacingStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

enum Value {
    Float(f64),
    Int(i64),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

/// Process-local pacing store for tests and single-node deployments.
/// Expiry is lazy: dead entries are replaced on the next write and
/// ignored on read.
#[derive(Default)]
pub struct MemoryPacingStore {
    entries: DashMap<String, Entry>,
}

impl MemoryPacingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PacingStore for MemoryPacingStore {
    async fn get_float(&self, key: &str) -> Result<Option<f64>, anyhow::Error> {
        Ok(self.entries.get(key).and_then(|e| match (&e.value, e.live()) {
            (Value::Float(v), true) => Some(*v),
            _ => None,
        }))
    }

    async fn incr_float(
        &self,
        key: &str,
        delta: f64,
        ttl: Option<Duration>,
    ) -> Result<f64, anyhow::Error> {
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Float(0.0),
            expires_at: ttl.map(|t| Instant::now() + t),
        });

        if !entry.live() {
            *entry = Entry {
                value: Value::Float(0.0),
                expires_at: ttl.map(|t| Instant::now() + t),
            };
        }

        match &mut entry.value {
            Value::Float(v) => {
                *v += delta;
                Ok(*v)
            }
            Value::Int(_) => anyhow::bail!("wrong type for float incr on {key}"),
        }
    }

    async fn get_int(&self, key: &str) -> Result<Option<i64>, anyhow::Error> {
        Ok(self.entries.get(key).and_then(|e| match (&e.value, e.live()) {
            (Value::Int(v), true) => Some(*v),
            _ => None,
        }))
    }

    async fn incr_int(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, anyhow::Error> {
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Int(0),
            expires_at: ttl.map(|t| Instant::now() + t),
        });

        if !entry.live() {
            *entry = Entry {
                value: Value::Int(0),
                expires_at: ttl.map(|t| Instant::now() + t),
            };
        }

        match &mut entry.value {
            Value::Int(v) => {
                *v += delta;
                Ok(*v)
            }
            Value::Float(_) => anyhow::bail!("wrong type for int incr on {key}"),
        }
    }
}
