use crate::app::context::AppContext;
use crate::core::models::events::Win;
use crate::core::openrtb::BidRequest;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize, Default)]
pub struct BidQuery {
    /// Exchange slug; optional for single-exchange deployments.
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub token: String,
}

/// `POST /openrtb2/bid` — the OpenRTB 2.5 endpoint. 200 with a
/// BidResponse, 204 for any flavor of no-bid, 400 for malformed JSON.
pub async fn bid(
    ctx: web::Data<AppContext>,
    query: web::Query<BidQuery>,
    body: web::Bytes,
) -> HttpResponse {
    let source = if query.src.is_empty() {
        None
    } else {
        match ctx.sources.rtb_by_slug(&query.src) {
            Some(source) => Some(source),
            None => {
                return HttpResponse::BadRequest()
                    .json(json!({"error": format!("unknown source '{}'", query.src)}));
            }
        }
    };

    if let Some(source) = &source {
        if let Some(expected) = &source.auth_token
            && !expected.is_empty()
            && expected != &query.token
        {
            counter!("bid.unauthorized", "source" => source.id.clone()).increment(1);
            return HttpResponse::NoContent().finish();
        }
        if let Some(limiter) = ctx.rtb_qps.get(&source.id)
            && limiter.check().is_err()
        {
            counter!("bid.qps_throttled", "source" => source.id.clone()).increment(1);
            return HttpResponse::NoContent().finish();
        }
    }

    let req: BidRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            debug!(error = %e, "malformed bid request");
            return HttpResponse::BadRequest().json(json!({"error": e.to_string()}));
        }
    };

    let deadline = req
        .tmax
        .filter(|t| *t > 0)
        .or_else(|| source.as_ref().and_then(|s| s.tmax_ms))
        .unwrap_or(ctx.config.server.tmax_default_ms);

    let auction = ctx.bids.build_bid_response(&req, source.as_deref());
    match tokio::time::timeout(Duration::from_millis(deadline), auction).await {
        Ok(Some(response)) => HttpResponse::Ok().json(response),
        Ok(None) => HttpResponse::NoContent().finish(),
        Err(_) => {
            counter!("bid.deadline_exceeded").increment(1);
            HttpResponse::NoContent().finish()
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct WinQuery {
    #[serde(default)]
    pub campaign_id: String,
    #[serde(default)]
    pub line_item_id: String,
    #[serde(default)]
    pub creative_id: String,
    #[serde(default)]
    pub imp_id: String,
    /// Clearing price; stays a string because an exchange that does not
    /// substitute `${AUCTION_PRICE}` sends the literal macro.
    #[serde(default)]
    pub price: String,
}

/// `GET /openrtb2/win` — win notice sink. Always 200; a failed write
/// is logged and metered, never surfaced to the exchange.
pub async fn win(ctx: web::Data<AppContext>, query: web::Query<WinQuery>) -> HttpResponse {
    let q = query.into_inner();
    let win = Win {
        ts: Utc::now(),
        campaign_id: q.campaign_id.clone(),
        line_item_id: q.line_item_id,
        creative_id: q.creative_id,
        imp_id: q.imp_id,
        price: q.price.parse().unwrap_or(0.0),
    };

    counter!("auction.win", "campaign" => q.campaign_id).increment(1);
    if let Err(e) = ctx.events.put_win(win).await {
        warn!(error = %e, "win notice write failed");
        counter!("auction.win_write_failed").increment(1);
    }

    HttpResponse::Ok().finish()
}

#[derive(Debug, Deserialize, Default)]
pub struct LossQuery {
    #[serde(default)]
    pub campaign_id: String,
    #[serde(default)]
    pub reason: String,
}

/// `GET /openrtb2/loss` — loss notice sink, metrics only.
pub async fn loss(query: web::Query<LossQuery>) -> HttpResponse {
    counter!(
        "auction.loss",
        "campaign" => query.campaign_id.clone(),
        "reason" => query.reason.clone()
    )
    .increment(1);
    HttpResponse::Ok().finish()
}
