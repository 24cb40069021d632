mod dispatch;
mod handler;
mod vendors;

pub use dispatch::PostbackDispatcher;
pub use handler::{PostbackHandler, PostbackResult};
pub use vendors::{Mmp, PostbackRequest};
