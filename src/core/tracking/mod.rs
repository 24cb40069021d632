mod macros;
mod service;

pub use macros::MacroContext;
pub use service::{ClickParams, ClickRegistration, TrackingService, ViewParams};
