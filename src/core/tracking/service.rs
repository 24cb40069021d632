use crate::core::enrichment::DeviceLookup;
use crate::core::errors::{CoreError, CoreResult};
use crate::core::events::EventStore;
use crate::core::geo::GeoResolver;
use crate::core::managers::{CampaignManager, SourceManager};
use crate::core::models::campaign::Campaign;
use crate::core::models::events::{Click, Impression};
use crate::core::models::source::{PostbackMethod, SourceType};
use crate::core::outbound::OutboundClient;
use crate::core::tracking::macros::MacroContext;
use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Query-level inputs of a `/track/click` call.
#[derive(Debug, Clone, Default)]
pub struct ClickParams {
    pub campaign_id: String,
    pub creative_id: String,
    pub line_item_id: String,
    pub source_type: SourceType,
    pub source_id: String,
    pub impression_id: String,
    pub gaid: String,
    pub idfa: String,
    pub ip: String,
    pub user_agent: String,
    pub sub1: String,
    pub sub2: String,
    pub sub3: String,
    pub sub4: String,
    pub sub5: String,
}

pub type ViewParams = ClickParams;

#[derive(Debug, Clone)]
pub struct ClickRegistration {
    pub click_id: String,
    /// Where to 302 the user; empty means answer 200 with no redirect.
    pub redirect_url: String,
}

/// Click/view intake: issues event ids, enriches with geo and device
/// facts, renders partner URLs and persists the records that postbacks
/// later reconcile against.
pub struct TrackingService {
    campaigns: Arc<CampaignManager>,
    sources: Arc<SourceManager>,
    events: Arc<dyn EventStore>,
    geo: Arc<GeoResolver>,
    devices: Arc<DeviceLookup>,
    outbound: Arc<OutboundClient>,
    view_ping_timeout: Duration,
}

impl TrackingService {
    pub fn new(
        campaigns: Arc<CampaignManager>,
        sources: Arc<SourceManager>,
        events: Arc<dyn EventStore>,
        geo: Arc<GeoResolver>,
        devices: Arc<DeviceLookup>,
        outbound: Arc<OutboundClient>,
        view_ping_timeout: Duration,
    ) -> Self {
        Self {
            campaigns,
            sources,
            events,
            geo,
            devices,
            outbound,
            view_ping_timeout,
        }
    }

    fn source_name(&self, source_type: SourceType, source_id: &str) -> String {
        match source_type {
            SourceType::S2s => self
                .sources
                .s2s(source_id)
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            SourceType::Rtb => self
                .sources
                .rtb(source_id)
                .map(|s| s.name.clone())
                .unwrap_or_default(),
        }
    }

    async fn build_click(&self, p: &ClickParams, campaign: &Campaign) -> Click {
        let geo = self.geo.resolve(&p.ip).await;
        let device = self.devices.lookup_ua(&p.user_agent);
        let device_ifa = if p.gaid.is_empty() {
            p.idfa.clone()
        } else {
            p.gaid.clone()
        };

        Click {
            click_id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            campaign_id: campaign.id.clone(),
            line_item_id: p.line_item_id.clone(),
            creative_id: p.creative_id.clone(),
            source_type: p.source_type,
            source_id: p.source_id.clone(),
            device_ifa,
            gaid: p.gaid.clone(),
            idfa: p.idfa.clone(),
            ip: p.ip.clone(),
            user_agent: p.user_agent.clone(),
            country: geo.country,
            region: geo.region,
            city: geo.city,
            device_os: device.os,
            device_type: device.device_type,
            device_make: device.make,
            device_model: device.model,
            sub1: p.sub1.clone(),
            sub2: p.sub2.clone(),
            sub3: p.sub3.clone(),
            sub4: p.sub4.clone(),
            sub5: p.sub5.clone(),
            target_url: String::new(),
        }
    }

    fn click_context(&self, click: &Click, campaign: &Campaign, impression_id: &str) -> MacroContext {
        MacroContext {
            impression_id: impression_id.to_string(),
            campaign_name: campaign.name.clone(),
            source_name: self.source_name(click.source_type, &click.source_id),
            ..MacroContext::for_click(click)
        }
    }

    /// Registers a click and returns the MMP redirect. The click is
    /// durably written before this returns — a failed write aborts the
    /// redirect because a click the store never saw can never be
    /// attributed.
    pub async fn register_click(&self, p: ClickParams) -> CoreResult<ClickRegistration> {
        let campaign = self
            .campaigns
            .get(&p.campaign_id)
            .ok_or_else(|| CoreError::not_found("campaign", &p.campaign_id))?;

        let mut click = self.build_click(&p, &campaign).await;

        let ctx = self.click_context(&click, &campaign, &p.impression_id);
        click.target_url = match &campaign.mmp {
            Some(mmp) if !mmp.click_url.is_empty() => {
                ctx.substitute_with_renames(&mmp.click_url, &mmp.macro_renames)
            }
            _ => campaign.app_store_url.clone(),
        };

        let click_id = click.click_id.clone();
        let redirect_url = click.target_url.clone();
        self.events.put_click(click).await?;

        counter!("tracking.click", "campaign" => p.campaign_id.clone()).increment(1);
        debug!(%click_id, campaign = %p.campaign_id, "click registered");

        Ok(ClickRegistration {
            click_id,
            redirect_url,
        })
    }

    /// Registers a view. The impression write and the partner view ping
    /// are both detached: neither can delay or fail the pixel response.
    pub async fn register_view(&self, p: ViewParams) -> CoreResult<String> {
        let campaign = self
            .campaigns
            .get(&p.campaign_id)
            .ok_or_else(|| CoreError::not_found("campaign", &p.campaign_id))?;

        let impression_id = if p.impression_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            p.impression_id.clone()
        };

        let click = self.build_click(&p, &campaign).await;
        let ctx = self.click_context(&click, &campaign, &impression_id);

        let impression = Impression {
            impression_id: impression_id.clone(),
            ts: click.ts,
            campaign_id: click.campaign_id.clone(),
            line_item_id: click.line_item_id.clone(),
            creative_id: click.creative_id.clone(),
            source_type: click.source_type,
            source_id: click.source_id.clone(),
            device_ifa: click.device_ifa.clone(),
            ip: click.ip.clone(),
            win_price: None,
        };

        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(e) = events.put_impression(impression).await {
                warn!(error = %e, "impression write failed");
                counter!("tracking.impression_write_failed").increment(1);
            }
        });

        if let Some(mmp) = &campaign.mmp
            && !mmp.view_url.is_empty()
        {
            let view_url = ctx.substitute_with_renames(&mmp.view_url, &mmp.macro_renames);
            self.outbound.fire_and_forget(
                "mmp_view",
                PostbackMethod::Get,
                view_url,
                self.view_ping_timeout,
            );
        }

        counter!("tracking.view", "campaign" => p.campaign_id.clone()).increment(1);
        Ok(impression_id)
    }
}
