mod service;

pub use service::{S2sAdRequest, S2sAdResponse, S2sAdService, S2sCreative};
