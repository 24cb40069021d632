mod engine;
mod version;

pub use engine::{TargetingContext, TargetingEngine, TargetingResult};
pub use version::cmp_versions;
