use crate::app::config::KiteConfig;
use crate::core::bidding::BidService;
use crate::core::events::EventStore;
use crate::core::managers::{CampaignManager, SourceManager};
use crate::core::pacing::PacingEngine;
use crate::core::postback::PostbackHandler;
use crate::core::s2s::S2sAdService;
use crate::core::tracking::TrackingService;
use governor::DefaultDirectRateLimiter;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything the HTTP handlers need, wired once at startup. No global
/// mutable state lives outside this graph; every component received
/// its collaborators at construction.
pub struct AppContext {
    pub config: KiteConfig,
    pub campaigns: Arc<CampaignManager>,
    pub sources: Arc<SourceManager>,
    pub events: Arc<dyn EventStore>,
    pub pacing: Arc<PacingEngine>,
    pub bids: Arc<BidService>,
    pub tracking: Arc<TrackingService>,
    pub postbacks: Arc<PostbackHandler>,
    pub s2s: Arc<S2sAdService>,
    /// Per-exchange QPS ceilings, keyed by RTB source id.
    pub rtb_qps: HashMap<String, DefaultDirectRateLimiter>,
}
