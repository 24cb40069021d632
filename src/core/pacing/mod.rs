//! Distributed budget and frequency accounting. Keys are UTC-day scoped
//! so the daily rollover is implicit; no reset task exists anywhere.

mod engine;
mod memory;
mod redis_store;
mod store;

pub use engine::{PacingEngine, PacingStats, ANONYMOUS_USER};
pub use memory::MemoryPacingStore;
pub use redis_store::RedisPacingStore;
pub use store::PacingStore;
