use crate::core::errors::{CoreError, CoreResult};
use crate::core::events::EventStore;
use crate::core::managers::{CampaignManager, SourceManager};
use crate::core::models::campaign::{Campaign, Creative, CreativeFormat, LineItem, PayoutType};
use crate::core::models::source::{LinkStatus, S2sSource, SourceStatus, SourceType};
use crate::core::targeting::{TargetingContext, TargetingEngine};
use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Inputs of a partner's `GET /s2s/{slug}/ad` call, with the client IP
/// already derived by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct S2sAdRequest {
    pub slug: String,
    pub token: String,
    pub client_ip: String,
    pub country: String,
    pub os: String,
    pub device_type: String,
    pub gaid: String,
    pub idfa: String,
    pub sub1: String,
    pub sub2: String,
    pub sub3: String,
    pub sub4: String,
    pub sub5: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct S2sCreative {
    pub id: String,
    #[serde(rename = "type")]
    pub creative_type: String,
    pub url: String,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct S2sAdResponse {
    pub success: bool,
    pub campaign_id: String,
    pub app_bundle: String,
    pub creative: S2sCreative,
    pub click_url: String,
    pub view_url: String,
    pub payout: f64,
}

/// Timing-safe string equality for the partner token check.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// OpenRTB device-type code for the partner's free-text hint.
fn device_type_code(device_type: &str) -> Option<i32> {
    match device_type.to_lowercase().as_str() {
        "" => None,
        "phone" | "mobile" => Some(4),
        "tablet" => Some(5),
        "desktop" | "pc" => Some(2),
        "tv" | "ctv" => Some(3),
        other => other.parse().ok(),
    }
}

/// The direct-supply mirror of the auction: a partner asks for an ad,
/// gets the first matching campaign plus ready-to-fire tracking URLs.
pub struct S2sAdService {
    sources: Arc<SourceManager>,
    campaigns: Arc<CampaignManager>,
    targeting: Arc<TargetingEngine>,
    events: Arc<dyn EventStore>,
    /// Public base for the returned click/view URLs.
    external_url: String,
}

impl S2sAdService {
    pub fn new(
        sources: Arc<SourceManager>,
        campaigns: Arc<CampaignManager>,
        targeting: Arc<TargetingEngine>,
        events: Arc<dyn EventStore>,
        external_url: String,
    ) -> Self {
        Self {
            sources,
            campaigns,
            targeting,
            events,
            external_url: external_url.trim_end_matches('/').to_string(),
        }
    }

    /// A capped link stops filling once today's conversions reach the
    /// cap. The count rides the store's aggregation interface, which
    /// has no latency promise, so the check is best-effort on error.
    async fn link_capped(&self, campaign_id: &str, cap: Option<u64>) -> bool {
        let Some(cap) = cap else {
            return false;
        };
        let day_start = Utc::now()
            .date_naive()
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();
        match self.events.count_conversions(campaign_id, day_start).await {
            Ok(count) => count >= cap,
            Err(_) => false,
        }
    }

    fn authenticate(&self, source: &S2sSource, req: &S2sAdRequest) -> CoreResult<()> {
        if let Some(token) = &source.api_token
            && !token.is_empty()
            && !constant_time_eq(token, &req.token)
        {
            counter!("s2s.auth_failed", "reason" => "token").increment(1);
            return Err(CoreError::Unauthorized("invalid token".into()));
        }

        if !source.allowed_ips.is_empty() {
            let allowed = source
                .allowed_ips
                .iter()
                .any(|ip| ip == "*" || ip == &req.client_ip);
            if !allowed {
                counter!("s2s.auth_failed", "reason" => "ip").increment(1);
                return Err(CoreError::Unauthorized(format!(
                    "ip {} not allowed",
                    req.client_ip
                )));
            }
        }

        Ok(())
    }

    fn select<'a>(
        &self,
        campaign: &'a Campaign,
        ctx: &TargetingContext,
    ) -> Option<(&'a LineItem, &'a Creative)> {
        if !campaign.is_biddable() {
            return None;
        }
        campaign
            .line_items
            .iter()
            .filter(|li| li.is_active)
            .find_map(|li| {
                let result = self.targeting.evaluate_ctx(&li.targeting, ctx);
                if !result.matched {
                    debug!(
                        line_item = %li.id,
                        criterion = result.failed_criterion.unwrap_or("unknown"),
                        "s2s candidate dropped"
                    );
                    return None;
                }
                li.creatives.first().map(|cr| (li, cr))
            })
    }

    fn tracking_url(&self, path: &str, campaign: &Campaign, li: &LineItem, cr: &Creative, source: &S2sSource, impression_id: &str, req: &S2sAdRequest) -> String {
        // the base is validated at startup; a parse failure here means
        // the path literal is broken, which only a code change can do
        let mut url = Url::parse(&format!("{}{}", self.external_url, path))
            .unwrap_or_else(|_| Url::parse("http://localhost/").expect("literal url"));

        url.query_pairs_mut()
            .append_pair("cid", &campaign.id)
            .append_pair("cr", &cr.id)
            .append_pair("li", &li.id)
            .append_pair("src", &source.id)
            .append_pair("st", &SourceType::S2s.to_string())
            .append_pair("imp", impression_id)
            .append_pair("gaid", &req.gaid)
            .append_pair("idfa", &req.idfa)
            .append_pair("sub1", &req.sub1)
            .append_pair("sub2", &req.sub2)
            .append_pair("sub3", &req.sub3)
            .append_pair("sub4", &req.sub4)
            .append_pair("sub5", &req.sub5);

        url.to_string()
    }

    fn payout_for(&self, campaign: &Campaign, source: &S2sSource, link_payout: Option<&crate::core::models::source::PayoutOverride>) -> f64 {
        match link_payout {
            Some(over) => match over.payout_type {
                PayoutType::Fixed => over.amount,
                // percent shares the campaign's own conversion price
                PayoutType::Percent => over.amount * campaign.payout.amount,
            },
            None => source.default_payout,
        }
    }

    pub async fn serve(&self, req: &S2sAdRequest) -> CoreResult<S2sAdResponse> {
        let source = self
            .sources
            .s2s_by_slug(&req.slug)
            .filter(|s| s.status == SourceStatus::Active)
            .ok_or_else(|| CoreError::not_found("source", &req.slug))?;

        self.authenticate(&source, req)?;

        let ctx = TargetingContext {
            geo: crate::core::geo::GeoInfo {
                country: req.country.to_uppercase(),
                ..Default::default()
            },
            os: req.os.to_lowercase(),
            device_type: device_type_code(&req.device_type),
            now: Utc::now(),
            ..Default::default()
        };

        for link in self.sources.links_for(SourceType::S2s, &source.id) {
            if link.status != LinkStatus::Active {
                continue;
            }
            if self.link_capped(&link.campaign_id, link.cap).await {
                counter!("s2s.link_capped", "campaign" => link.campaign_id.clone()).increment(1);
                continue;
            }
            let Some(campaign) = self.campaigns.get(&link.campaign_id) else {
                continue;
            };
            let Some((line_item, creative)) = self.select(&campaign, &ctx) else {
                continue;
            };

            let impression_id = Uuid::new_v4().to_string();
            let click_url = self.tracking_url(
                "/track/click",
                &campaign,
                line_item,
                creative,
                &source,
                &impression_id,
                req,
            );
            let view_url = self.tracking_url(
                "/track/view",
                &campaign,
                line_item,
                creative,
                &source,
                &impression_id,
                req,
            );

            counter!("s2s.served", "source" => source.id.clone()).increment(1);

            return Ok(S2sAdResponse {
                success: true,
                campaign_id: campaign.id.clone(),
                app_bundle: campaign.app_bundle.clone(),
                creative: S2sCreative {
                    id: creative.id.clone(),
                    creative_type: creative.format.to_string(),
                    url: match creative.format {
                        CreativeFormat::Video => creative
                            .video_url
                            .clone()
                            .unwrap_or_else(|| creative.adm_template.clone()),
                        _ => creative.adm_template.clone(),
                    },
                    w: creative.w,
                    h: creative.h,
                },
                click_url,
                view_url,
                payout: self.payout_for(&campaign, &source, link.payout_override.as_ref()),
            });
        }

        counter!("s2s.no_fill", "source" => source.id.clone()).increment(1);
        Err(CoreError::not_found("campaign", "no matching campaign"))
    }
}
