use crate::app::config::{EventsBackend, KiteConfig, PacingBackend};
use crate::app::context::AppContext;
use crate::core::bidding::BidService;
use crate::core::currency::UsdPassthrough;
use crate::core::enrichment::DeviceLookup;
use crate::core::events::{EventStore, MemoryEventStore, RedisEventStore};
use crate::core::geo::GeoResolver;
use crate::core::managers::{CampaignManager, SourceManager};
use crate::core::outbound::OutboundClient;
use crate::core::pacing::{MemoryPacingStore, PacingEngine, PacingStore, RedisPacingStore};
use crate::core::postback::{PostbackDispatcher, PostbackHandler};
use crate::core::s2s::S2sAdService;
use crate::core::providers::{ConfigCampaignProvider, ConfigLinkProvider, ConfigSourceProvider};
use crate::core::targeting::TargetingEngine;
use crate::core::tracking::TrackingService;
use anyhow::{Context, Result};
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builds the full collaborator graph from config. Fails fast: a bad
/// redis URL or empty catalog surfaces here, not on the first request.
pub async fn build(config: KiteConfig) -> Result<AppContext> {
    url::Url::parse(&config.server.external_url)
        .context("server.external_url must be an absolute URL")?;
    warn_on_invalid_line_items(&config);

    let campaigns = CampaignManager::start(Arc::new(ConfigCampaignProvider::new(
        config.catalog.campaigns.clone(),
    )))
    .await?;
    let sources = SourceManager::start(
        Arc::new(ConfigSourceProvider::new(config.catalog.sources.clone())),
        Arc::new(ConfigLinkProvider::new(config.catalog.links.clone())),
    )
    .await?;
    info!(
        campaigns = config.catalog.campaigns.len(),
        "catalog loaded"
    );

    let pacing_store: Arc<dyn PacingStore> = match &config.pacing {
        PacingBackend::Memory => {
            info!("pacing on in-process store");
            Arc::new(MemoryPacingStore::new())
        }
        PacingBackend::Redis { url } => Arc::new(RedisPacingStore::connect(url).await?),
    };
    let pacing = Arc::new(PacingEngine::new(pacing_store));

    // geo provider is deployment-specific; the resolver alone still
    // caches and degrades to empty geo (strict country lists then fail)
    let geo = Arc::new(GeoResolver::new(
        None,
        config.caches.geo_entries,
        config.caches.geo_ttl,
    ));
    let targeting = Arc::new(TargetingEngine::new(geo.clone()));
    let devices = Arc::new(DeviceLookup::new(config.caches.device_entries));

    let events: Arc<dyn EventStore> = match &config.events {
        EventsBackend::Memory => {
            let backend = Arc::new(MemoryEventStore::new(
                config.attribution.click_retention,
                config.attribution.conversion_retention,
            ));
            // redis enforces retention by key expiry; memory needs the sweep
            spawn_retention_sweep(backend.clone());
            backend
        }
        EventsBackend::Redis { url } => Arc::new(
            RedisEventStore::connect(
                url,
                config.attribution.click_retention,
                config.attribution.conversion_retention,
            )
            .await?,
        ),
    };

    let outbound = Arc::new(OutboundClient::new(config.outbound.max_inflight)?);

    let bids = Arc::new(BidService::new(
        campaigns.clone(),
        targeting.clone(),
        pacing.clone(),
        config.server.external_url.clone(),
    ));

    let tracking = Arc::new(TrackingService::new(
        campaigns.clone(),
        sources.clone(),
        events.clone(),
        geo.clone(),
        devices,
        outbound.clone(),
        config.outbound.view_ping_timeout,
    ));

    let dispatcher = Arc::new(PostbackDispatcher::new(
        sources.clone(),
        outbound.clone(),
        config.outbound.postback_timeout,
    ));
    let postbacks = Arc::new(PostbackHandler::new(
        events.clone(),
        campaigns.clone(),
        dispatcher,
        Arc::new(UsdPassthrough::default()),
    ));

    let s2s = Arc::new(S2sAdService::new(
        sources.clone(),
        campaigns.clone(),
        targeting,
        events.clone(),
        config.server.external_url.clone(),
    ));

    let rtb_qps = build_qps_limiters(&sources);

    Ok(AppContext {
        config,
        campaigns,
        sources,
        events,
        pacing,
        bids,
        tracking,
        postbacks,
        s2s,
        rtb_qps,
    })
}

/// One direct limiter per exchange that declared a QPS ceiling.
fn build_qps_limiters(
    sources: &SourceManager,
) -> HashMap<String, governor::DefaultDirectRateLimiter> {
    let mut limiters = HashMap::new();
    for source in sources.rtb_all() {
        let Some(qps) = source.qps_limit.and_then(NonZeroU32::new) else {
            continue;
        };
        info!(source = %source.id, qps = qps.get(), "exchange QPS ceiling set");
        limiters.insert(
            source.id.clone(),
            RateLimiter::direct(Quota::per_second(qps)),
        );
    }
    limiters
}

/// A line item needs a positive daily budget and at least one
/// creative to ever win an auction; flag catalog entries that cannot.
fn warn_on_invalid_line_items(config: &KiteConfig) {
    use tracing::warn;
    for campaign in &config.catalog.campaigns {
        for li in &campaign.line_items {
            if li.creatives.is_empty() {
                warn!(line_item = %li.id, "line item has no creatives, it will never serve");
            }
            if li.pacing.daily_budget <= 0.0 {
                warn!(
                    line_item = %li.id,
                    "line item has no daily budget, spend is ungated"
                );
            }
        }
    }
}

fn spawn_retention_sweep(store: Arc<MemoryEventStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            store.sweep(chrono::Utc::now());
        }
    });
}
