use crate::app::context::AppContext;
use crate::app::handlers;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub fn configure(app: &mut web::ServiceConfig) {
    app.route("/openrtb2/bid", web::post().to(handlers::bid::bid))
        .route("/openrtb2/win", web::get().to(handlers::bid::win))
        .route("/openrtb2/loss", web::get().to(handlers::bid::loss))
        .route("/track/click", web::get().to(handlers::tracking::click))
        .route("/track/view", web::get().to(handlers::tracking::view))
        .route(
            "/postback/appsflyer",
            web::get().to(handlers::postback::appsflyer),
        )
        .route("/postback/adjust", web::get().to(handlers::postback::adjust))
        .route(
            "/postback/singular",
            web::get().to(handlers::postback::singular),
        )
        .route("/postback", web::get().to(handlers::postback::generic))
        .route("/s2s/{slug}/ad", web::get().to(handlers::s2s::ad))
        .route("/healthz", web::get().to(|| async { "ok" }));
}

/// Binds and runs the HTTP front. Blocks until the server stops.
pub async fn run(ctx: Arc<AppContext>) -> Result<()> {
    let bind = ctx.config.server.bind.clone();
    let data = web::Data::from(ctx);

    info!(%bind, "starting http server");
    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind(&bind)?
        .run()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::{CatalogConfig, KiteConfig};
    use crate::app::startup;
    use crate::core::models::campaign::{
        AuditStatus, BidStrategy, Campaign, CampaignStatus, Creative, CreativeFormat, LineItem,
        MmpConfig, PayoutConfig,
    };
    use crate::core::models::source::{CampaignSource, S2sSource, SourceType};
    use crate::core::openrtb::BidResponse;
    use crate::core::providers::SourcesConfig;
    use actix_web::body::MessageBody;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;

    fn fixed_cpm_campaign() -> Campaign {
        Campaign {
            id: "c1".into(),
            name: "Summer Install Push".into(),
            status: CampaignStatus::Active,
            app_bundle: "com.example.game".into(),
            app_store_url: "https://play.google.com/store/apps/details?id=com.example.game".into(),
            mmp: Some(MmpConfig {
                mmp_type: "appsflyer".into(),
                click_url: "https://app.appsflyer.com/com.example.game?clickid={click_id}&advertising_id={gaid}"
                    .into(),
                ..Default::default()
            }),
            payout: PayoutConfig {
                amount: 2.5,
                event: "purchase".into(),
                ..Default::default()
            },
            line_items: vec![LineItem {
                id: "li1".into(),
                campaign_id: "c1".into(),
                priority: 1,
                strategy: BidStrategy::FixedCpm { cpm: 1500.0 },
                creatives: vec![Creative {
                    id: "cr1".into(),
                    format: CreativeFormat::Banner,
                    w: 320,
                    h: 50,
                    adomain: vec!["example.com".into()],
                    adm_template: "<div>ad</div>".into(),
                    audit_status: AuditStatus::Approved,
                    ..Default::default()
                }],
                is_active: true,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn test_config() -> KiteConfig {
        KiteConfig {
            catalog: CatalogConfig {
                campaigns: vec![fixed_cpm_campaign()],
                sources: SourcesConfig {
                    s2s: vec![S2sSource {
                        id: "s1".into(),
                        name: "Acme".into(),
                        slug: "acme".into(),
                        postback_url: "https://partner.acme.example/pb?c={click_id}&p={payout}"
                            .into(),
                        default_payout: 1.0,
                        ..Default::default()
                    }],
                    rtb: vec![],
                },
                links: vec![CampaignSource {
                    campaign_id: "c1".into(),
                    source_type: SourceType::S2s,
                    source_id: "s1".into(),
                    ..Default::default()
                }],
            },
            ..Default::default()
        }
    }

    async fn app_ctx() -> Arc<AppContext> {
        Arc::new(startup::build(test_config()).await.unwrap())
    }

    fn bid_body(floor: f64) -> serde_json::Value {
        serde_json::json!({
            "id": "r1",
            "imp": [{"id": "1", "banner": {"w": 320, "h": 50}, "bidfloor": floor}],
            "device": {"os": "android", "ifa": "abc"}
        })
    }

    #[actix_web::test]
    async fn rtb_happy_path_returns_bid() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::from(app_ctx().await))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/openrtb2/bid")
            .set_json(bid_body(0.5))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: BidResponse = actix_test::read_body_json(res).await;
        assert_eq!(body.id, "r1");
        assert_eq!(body.cur, "USD");
        let bid = &body.seatbid[0].bid[0];
        assert_eq!(bid.impid, "1");
        assert_eq!(bid.price, 1.5);
        assert_eq!(bid.crid.as_deref(), Some("cr1"));
        assert_eq!(bid.cid.as_deref(), Some("c1"));
        assert_eq!(bid.w, Some(320));
        assert_eq!(bid.h, Some(50));
        assert_eq!(bid.adomain, vec!["example.com"]);
    }

    #[actix_web::test]
    async fn below_floor_is_204() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::from(app_ctx().await))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/openrtb2/bid")
            .set_json(bid_body(2.0))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn malformed_bid_is_400() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::from(app_ctx().await))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/openrtb2/bid")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn click_then_postback_chain() {
        let ctx = app_ctx().await;
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::from(ctx.clone()))
                .configure(configure),
        )
        .await;

        // 1. user clicks: 302 to the substituted MMP URL
        let req = actix_test::TestRequest::get()
            .uri("/track/click?cid=c1&cr=cr1&li=li1&src=s1&st=s2s&gaid=G-77")
            .insert_header(("user-agent", "Mozilla/5.0 (Linux; Android 13) Mobile"))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FOUND);

        let location = res
            .headers()
            .get("location")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(location.starts_with("https://app.appsflyer.com/com.example.game?clickid="));
        assert!(location.ends_with("&advertising_id=G-77"));

        let click_id = location
            .split("clickid=")
            .nth(1)
            .unwrap()
            .split('&')
            .next()
            .unwrap()
            .to_string();
        let click = ctx.events.click(&click_id).await.unwrap().expect("stored");
        assert_eq!(click.device_ifa, "G-77");

        // 2. MMP reports the purchase
        let uri = format!(
            "/postback/appsflyer?clickid={click_id}&event_name=af_purchase&event_revenue=9.99&event_revenue_currency=USD"
        );
        let req = actix_test::TestRequest::get().uri(&uri).to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = actix_test::read_body_json(res).await;
        assert_eq!(body["status"], "ok");

        let conversion_id = body["conversion_id"].as_str().unwrap();
        let conv = ctx
            .events
            .conversion(conversion_id)
            .await
            .unwrap()
            .expect("stored");
        assert_eq!(conv.event, "purchase");
        assert_eq!(conv.revenue, 9.99);
        assert_eq!(conv.payout, 2.5);
        assert_eq!(conv.click_id, click_id);
    }

    #[actix_web::test]
    async fn postback_without_click_id_is_200_error() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::from(app_ctx().await))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/postback?event=install")
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = actix_test::read_body_json(res).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "click_id required");
    }

    #[actix_web::test]
    async fn view_serves_the_pixel() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::from(app_ctx().await))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/track/view?cid=c1&cr=cr1&li=li1&src=s1&st=s2s")
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get("content-type").unwrap().to_str().unwrap(),
            "image/gif"
        );
        let body = res.into_body().try_into_bytes().unwrap();
        assert_eq!(body.len(), 43);
        assert_eq!(&body[..6], b"GIF89a");
    }

    #[actix_web::test]
    async fn s2s_ad_lookup_round_trip() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::from(app_ctx().await))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/s2s/acme/ad?country=US&os=android&gaid=G-1")
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = actix_test::read_body_json(res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["campaign_id"], "c1");
        assert_eq!(body["app_bundle"], "com.example.game");
        assert!(body["click_url"].as_str().unwrap().contains("st=s2s"));

        // unknown slug answers 200 with an error body
        let req = actix_test::TestRequest::get()
            .uri("/s2s/ghost/ad?country=US")
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = actix_test::read_body_json(res).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn win_and_loss_sinks_answer_200() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::from(app_ctx().await))
                .configure(configure),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/openrtb2/win?campaign_id=c1&line_item_id=li1&creative_id=cr1&imp_id=1&price=1.42")
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::OK
        );

        let req = actix_test::TestRequest::get()
            .uri("/openrtb2/loss?campaign_id=c1&reason=102")
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::OK
        );
    }
}
