use crate::core::currency::CurrencyOracle;
use crate::core::events::EventStore;
use crate::core::managers::CampaignManager;
use crate::core::models::events::Conversion;
use crate::core::postback::dispatch::PostbackDispatcher;
use crate::core::postback::vendors::Mmp;
use crate::core::models::source::SourceType;
use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Body returned to the MMP. Always under HTTP 200: vendors retry on
/// non-200, and a logic rejection must not trigger a retry storm.
#[derive(Debug, Clone, Serialize)]
pub struct PostbackResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_id: Option<String>,
}

impl PostbackResult {
    fn ok(conversion_id: String) -> Self {
        Self {
            status: "ok",
            message: None,
            conversion_id: Some(conversion_id),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: Some(message.into()),
            conversion_id: None,
        }
    }
}

/// Conversion intake: parses a vendor postback, reconciles it to the
/// originating click, prices the payout and hands the record to the
/// event store, then fans out to the S2S partner that sent the click.
pub struct PostbackHandler {
    events: Arc<dyn EventStore>,
    campaigns: Arc<CampaignManager>,
    dispatcher: Arc<PostbackDispatcher>,
    currency: Arc<dyn CurrencyOracle>,
}

impl PostbackHandler {
    pub fn new(
        events: Arc<dyn EventStore>,
        campaigns: Arc<CampaignManager>,
        dispatcher: Arc<PostbackDispatcher>,
        currency: Arc<dyn CurrencyOracle>,
    ) -> Self {
        Self {
            events,
            campaigns,
            dispatcher,
            currency,
        }
    }

    pub async fn handle(&self, vendor: Mmp, query: &HashMap<String, String>) -> PostbackResult {
        let request = vendor.parse(query);
        counter!("postback.received", "vendor" => vendor.to_string()).increment(1);

        if request.click_id.is_empty() {
            return PostbackResult::error("click_id required");
        }

        let click = match self.events.click(&request.click_id).await {
            Ok(Some(click)) => click,
            Ok(None) => {
                counter!("postback.click_not_found", "vendor" => vendor.to_string()).increment(1);
                return PostbackResult::error("click not found");
            }
            Err(e) => {
                warn!(error = %e, "click lookup failed");
                return PostbackResult::error("storage unavailable");
            }
        };

        let event = vendor.map_event(&request.event);

        // the campaign may have been archived since the click; a missing
        // payout config simply prices the conversion at zero
        let payout = self
            .campaigns
            .get(&click.campaign_id)
            .map(|campaign| {
                let trigger = &campaign.payout.event;
                if trigger.is_empty() || trigger.eq_ignore_ascii_case(&event) {
                    campaign.payout.amount
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0);

        let device_ifa = if !request.gaid.is_empty() {
            request.gaid.clone()
        } else if !request.idfa.is_empty() {
            request.idfa.clone()
        } else {
            click.device_ifa.clone()
        };

        let now = Utc::now();
        let conversion = Conversion {
            conversion_id: Uuid::new_v4().to_string(),
            ts: now,
            click_id: click.click_id.clone(),
            campaign_id: click.campaign_id.clone(),
            line_item_id: click.line_item_id.clone(),
            creative_id: click.creative_id.clone(),
            source_type: click.source_type,
            source_id: click.source_id.clone(),
            event: event.clone(),
            event_original: request.event.clone(),
            revenue: request.revenue,
            currency: request.currency.clone(),
            revenue_usd: self.currency.to_usd(request.revenue, &request.currency),
            payout,
            payout_usd: payout,
            device_ifa,
            external_id: request.external_id.clone(),
            transaction_id: request.transaction_id.clone(),
            time_to_install: Some((now - click.ts).num_seconds()),
        };

        let fresh_id = conversion.conversion_id.clone();
        let stored = match self.events.put_conversion(conversion).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "conversion write failed");
                return PostbackResult::error("storage unavailable");
            }
        };

        let duplicate = stored.conversion_id != fresh_id;
        if duplicate {
            debug!(
                conversion = %stored.conversion_id,
                "duplicate postback, echoing stored conversion"
            );
            counter!("postback.duplicate", "vendor" => vendor.to_string()).increment(1);
            return PostbackResult::ok(stored.conversion_id.clone());
        }

        counter!(
            "postback.converted",
            "vendor" => vendor.to_string(),
            "event" => event.clone()
        )
        .increment(1);

        // strictly after the durable write; never blocks the response
        if click.source_type == SourceType::S2s {
            self.dispatcher.dispatch(&click, &stored);
        }

        PostbackResult::ok(stored.conversion_id.clone())
    }
}
