use crate::core::bidding::fit::select_creative;
use crate::core::bidding::markup::build_adm;
use crate::core::bidding::price::bid_price;
use crate::core::managers::CampaignManager;
use crate::core::models::campaign::{Campaign, Creative, LineItem};
use crate::core::models::source::RtbSource;
use crate::core::openrtb::{Bid, BidRequest, BidResponse, Imp, SeatBid};
use crate::core::pacing::PacingEngine;
use crate::core::targeting::TargetingEngine;
use chrono::Utc;
use futures_util::future::join_all;
use metrics::counter;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug;

/// Pacing identity for a request: `user.id`, else `buyeruid`, else the
/// device advertising id, else the literal that disables frequency caps.
fn pacing_user_id(req: &BidRequest) -> &str {
    req.user
        .as_ref()
        .and_then(|u| u.id.as_deref().filter(|s| !s.is_empty()))
        .or_else(|| {
            req.user
                .as_ref()
                .and_then(|u| u.buyeruid.as_deref().filter(|s| !s.is_empty()))
        })
        .or_else(|| {
            req.device
                .as_ref()
                .and_then(|d| d.ifa.as_deref().filter(|s| !s.is_empty()))
        })
        .unwrap_or(crate::core::pacing::ANONYMOUS_USER)
}

struct Candidate<'a> {
    campaign: &'a Campaign,
    line_item: &'a LineItem,
    creative: &'a Creative,
    price: f64,
}

/// The auction half of the DSP: turns one bid request into at most one
/// bid per impression. All gating I/O (geo, pacing) happens candidate
/// by candidate; winner selection itself is pure.
pub struct BidService {
    campaigns: Arc<CampaignManager>,
    targeting: Arc<TargetingEngine>,
    pacing: Arc<PacingEngine>,
    /// Public base for win/loss notice URLs, e.g. "https://bid.kite.io".
    external_url: String,
}

impl BidService {
    pub fn new(
        campaigns: Arc<CampaignManager>,
        targeting: Arc<TargetingEngine>,
        pacing: Arc<PacingEngine>,
        external_url: String,
    ) -> Self {
        Self {
            campaigns,
            targeting,
            pacing,
            external_url: external_url.trim_end_matches('/').to_string(),
        }
    }

    /// Runs every impression's auction and assembles the response in
    /// request-impression order. `None` means no bid anywhere and maps
    /// to 204 at the HTTP boundary.
    pub async fn build_bid_response(
        &self,
        req: &BidRequest,
        source: Option<&RtbSource>,
    ) -> Option<BidResponse> {
        let campaigns = self.campaigns.active();
        if campaigns.is_empty() {
            counter!("bid.no_campaigns").increment(1);
            return None;
        }

        let user_id = pacing_user_id(req);
        let multiplier = source.map(|s| s.bid_multiplier).unwrap_or(1.0);

        // impressions are independent; run them concurrently and let
        // join_all restore request order
        let auctions = req
            .imp
            .iter()
            .map(|imp| self.auction_impression(req, imp, &campaigns, user_id, multiplier));
        let bids: Vec<Bid> = join_all(auctions).await.into_iter().flatten().collect();

        if bids.is_empty() {
            return None;
        }

        Some(BidResponse {
            id: req.id.clone(),
            cur: "USD".to_string(),
            seatbid: vec![SeatBid {
                bid: bids,
                seat: None,
                group: 0,
            }],
            ..Default::default()
        })
    }

    async fn auction_impression(
        &self,
        req: &BidRequest,
        imp: &Imp,
        campaigns: &[Arc<Campaign>],
        user_id: &str,
        multiplier: f64,
    ) -> Option<Bid> {
        let now = Utc::now();
        let mut candidates: SmallVec<[Candidate<'_>; 8]> = SmallVec::new();

        for campaign in campaigns {
            for line_item in &campaign.line_items {
                if !line_item.is_active || !line_item.pacing.in_flight(now) {
                    continue;
                }

                let targeting = self
                    .targeting
                    .evaluate(&line_item.targeting, req, imp)
                    .await;
                if !targeting.matched {
                    debug!(
                        line_item = %line_item.id,
                        criterion = targeting.failed_criterion.unwrap_or("unknown"),
                        "candidate dropped on targeting"
                    );
                    continue;
                }

                let mut price = bid_price(&line_item.strategy, imp.bidfloor) * multiplier;
                if price <= 0.0 {
                    continue;
                }

                if imp.bidfloor > 0.0 && price < imp.bidfloor {
                    counter!("bid.below_floor", "line_item" => line_item.id.clone()).increment(1);
                    continue;
                }

                if !self
                    .pacing
                    .allow(&line_item.id, user_id, &line_item.pacing, price)
                    .await
                {
                    continue;
                }

                let Some(creative) = select_creative(imp, &line_item.creatives) else {
                    counter!("bid.no_creative_fit", "line_item" => line_item.id.clone())
                        .increment(1);
                    continue;
                };

                // keep float comparisons well-defined before selection
                if !price.is_finite() {
                    price = 0.0;
                }

                candidates.push(Candidate {
                    campaign,
                    line_item,
                    creative,
                    price,
                });
            }
        }

        // highest priority wins, price breaks ties; beyond that the
        // earliest candidate in catalog order sticks (max_by keeps the
        // last equal element, so compare strictly-greater only)
        let winner = candidates.into_iter().fold(None::<Candidate<'_>>, |best, c| {
            match &best {
                None => Some(c),
                Some(b) => {
                    let better = c.line_item.priority > b.line_item.priority
                        || (c.line_item.priority == b.line_item.priority && c.price > b.price);
                    if better { Some(c) } else { best }
                }
            }
        })?;

        counter!("bid.won", "campaign" => winner.campaign.id.clone()).increment(1);
        Some(self.assemble_bid(imp, &winner))
    }

    fn assemble_bid(&self, imp: &Imp, winner: &Candidate<'_>) -> Bid {
        let notice_query = format!(
            "campaign_id={}&line_item_id={}&creative_id={}&imp_id={}",
            winner.campaign.id, winner.line_item.id, winner.creative.id, imp.id
        );

        Bid {
            id: format!("{}/{}", winner.line_item.id, imp.id),
            impid: imp.id.clone(),
            price: winner.price,
            // ${AUCTION_PRICE} must survive literally for the exchange
            // to substitute, so these are built without an encoder
            nurl: Some(format!(
                "{}/openrtb2/win?{}&price=${{AUCTION_PRICE}}",
                self.external_url, notice_query
            )),
            lurl: Some(format!(
                "{}/openrtb2/loss?campaign_id={}&reason=${{AUCTION_LOSS}}",
                self.external_url, winner.campaign.id
            )),
            adm: Some(build_adm(winner.creative)),
            adomain: winner.creative.adomain.clone(),
            bundle: None,
            cid: Some(winner.campaign.id.clone()),
            crid: Some(winner.creative.id.clone()),
            w: Some(winner.creative.w),
            h: Some(winner.creative.h),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::GeoResolver;
    use crate::core::models::campaign::{
        AuditStatus, BidStrategy, CampaignStatus, CreativeFormat,
    };
    use crate::core::models::targeting::Targeting;
    use crate::core::openrtb::request::{Banner, Device, User};
    use crate::core::pacing::{MemoryPacingStore, PacingEngine};
    use crate::core::providers::ConfigCampaignProvider;
    use std::time::Duration;

    fn creative(id: &str, w: u32, h: u32) -> Creative {
        Creative {
            id: id.into(),
            format: CreativeFormat::Banner,
            w,
            h,
            adomain: vec!["example.com".into()],
            adm_template: "<div>ad</div>".into(),
            audit_status: AuditStatus::Approved,
            ..Default::default()
        }
    }

    fn line_item(id: &str, priority: i32, cpm: f64, creatives: Vec<Creative>) -> LineItem {
        LineItem {
            id: id.into(),
            campaign_id: "c1".into(),
            priority,
            strategy: BidStrategy::FixedCpm { cpm },
            creatives,
            is_active: true,
            ..Default::default()
        }
    }

    fn campaign(id: &str, line_items: Vec<LineItem>) -> Campaign {
        Campaign {
            id: id.into(),
            status: CampaignStatus::Active,
            line_items,
            ..Default::default()
        }
    }

    async fn service(campaigns: Vec<Campaign>) -> BidService {
        let mgr = CampaignManager::start(Arc::new(ConfigCampaignProvider::new(campaigns)))
            .await
            .unwrap();
        let geo = Arc::new(GeoResolver::new(None, 16, Duration::from_secs(60)));
        BidService::new(
            mgr,
            Arc::new(TargetingEngine::new(geo)),
            Arc::new(PacingEngine::new(Arc::new(MemoryPacingStore::new()))),
            "https://bid.example.io".into(),
        )
    }

    fn banner_request(id: &str, floor: f64) -> BidRequest {
        BidRequest {
            id: id.into(),
            imp: vec![Imp {
                id: "1".into(),
                banner: Some(Banner {
                    w: Some(320),
                    h: Some(50),
                    ..Default::default()
                }),
                bidfloor: floor,
                ..Default::default()
            }],
            device: Some(Device {
                os: Some("android".into()),
                ifa: Some("abc".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn happy_path_banner_bid() {
        let svc = service(vec![campaign(
            "c1",
            vec![line_item("li1", 1, 1500.0, vec![creative("cr1", 320, 50)])],
        )])
        .await;

        let res = svc
            .build_bid_response(&banner_request("r1", 0.5), None)
            .await
            .expect("should bid");

        assert_eq!(res.id, "r1");
        assert_eq!(res.cur, "USD");
        let bid = &res.seatbid[0].bid[0];
        assert_eq!(bid.impid, "1");
        assert_eq!(bid.price, 1.5);
        assert_eq!(bid.id, "li1/1");
        assert_eq!(bid.crid.as_deref(), Some("cr1"));
        assert_eq!(bid.cid.as_deref(), Some("c1"));
        assert_eq!(bid.w, Some(320));
        assert_eq!(bid.h, Some(50));
        assert_eq!(bid.adomain, vec!["example.com"]);
        let nurl = bid.nurl.as_deref().unwrap();
        assert!(nurl.contains("campaign_id=c1"));
        assert!(nurl.contains("price=${AUCTION_PRICE}"));
    }

    #[tokio::test]
    async fn below_floor_is_no_bid() {
        let svc = service(vec![campaign(
            "c1",
            vec![line_item("li1", 1, 1500.0, vec![creative("cr1", 320, 50)])],
        )])
        .await;

        assert!(svc
            .build_bid_response(&banner_request("r2", 2.0), None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn no_active_campaign_is_no_bid() {
        let mut paused = campaign(
            "c1",
            vec![line_item("li1", 1, 1500.0, vec![creative("cr1", 320, 50)])],
        );
        paused.status = CampaignStatus::Paused;
        let svc = service(vec![paused]).await;

        assert!(svc
            .build_bid_response(&banner_request("r3", 0.0), None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn targeting_miss_is_no_bid() {
        let mut li = line_item("li1", 1, 1500.0, vec![creative("cr1", 320, 50)]);
        li.targeting = Targeting {
            countries: vec!["US".into()],
            ..Default::default()
        };
        // nil geo provider resolves nothing, so the US whitelist fails
        let svc = service(vec![campaign("c1", vec![li])]).await;

        assert!(svc
            .build_bid_response(&banner_request("r4", 0.0), None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn priority_then_price_selects_winner() {
        let svc = service(vec![campaign(
            "c1",
            vec![
                line_item("low-pri", 1, 9000.0, vec![creative("a", 320, 50)]),
                line_item("hi-pri-cheap", 5, 1000.0, vec![creative("b", 320, 50)]),
                line_item("hi-pri-rich", 5, 2000.0, vec![creative("c", 320, 50)]),
            ],
        )])
        .await;

        let res = svc
            .build_bid_response(&banner_request("r5", 0.0), None)
            .await
            .unwrap();
        let bid = &res.seatbid[0].bid[0];
        assert_eq!(bid.id, "hi-pri-rich/1");
        assert_eq!(bid.price, 2.0);
    }

    #[tokio::test]
    async fn equal_candidates_pick_catalog_order() {
        let svc = service(vec![campaign(
            "c1",
            vec![
                line_item("first", 3, 1000.0, vec![creative("a", 320, 50)]),
                line_item("second", 3, 1000.0, vec![creative("b", 320, 50)]),
            ],
        )])
        .await;

        let res = svc
            .build_bid_response(&banner_request("r6", 0.0), None)
            .await
            .unwrap();
        assert_eq!(res.seatbid[0].bid[0].id, "first/1");
    }

    #[tokio::test]
    async fn source_multiplier_scales_price() {
        let svc = service(vec![campaign(
            "c1",
            vec![line_item("li1", 1, 1000.0, vec![creative("cr1", 320, 50)])],
        )])
        .await;

        let source = RtbSource {
            id: "x1".into(),
            bid_multiplier: 2.0,
            ..Default::default()
        };
        let res = svc
            .build_bid_response(&banner_request("r7", 0.0), Some(&source))
            .await
            .unwrap();
        assert_eq!(res.seatbid[0].bid[0].price, 2.0);
    }

    #[test]
    fn pacing_user_preference_order() {
        let mut req = BidRequest {
            user: Some(User {
                id: Some("uid".into()),
                buyeruid: Some("buid".into()),
            }),
            device: Some(Device {
                ifa: Some("ifa".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(pacing_user_id(&req), "uid");

        req.user.as_mut().unwrap().id = None;
        assert_eq!(pacing_user_id(&req), "buid");

        req.user = None;
        assert_eq!(pacing_user_id(&req), "ifa");

        req.device = None;
        assert_eq!(pacing_user_id(&req), "anonymous");
    }
}
