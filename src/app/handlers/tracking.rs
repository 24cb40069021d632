use crate::app::context::AppContext;
use crate::app::handlers::client_ip;
use crate::core::errors::CoreError;
use crate::core::models::source::SourceType;
use crate::core::tracking::ClickParams;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

/// The 43-byte transparent 1×1 pixel served for view beacons.
const PIXEL_GIF: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, // GIF89a
    0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, // 1x1, palette of 2
    0x00, 0x00, 0x00, 0xff, 0xff, 0xff, // black, white
    0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, // GCE, transparent
    0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, // image desc
    0x02, 0x02, 0x44, 0x01, 0x00, // 1 clear pixel
    0x3b, // trailer
];

#[derive(Debug, Deserialize, Default)]
pub struct TrackQuery {
    #[serde(default)]
    pub cid: String,
    #[serde(default)]
    pub cr: String,
    #[serde(default)]
    pub li: String,
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub st: String,
    #[serde(default)]
    pub imp: String,
    #[serde(default)]
    pub gaid: String,
    #[serde(default)]
    pub idfa: String,
    #[serde(default)]
    pub sub1: String,
    #[serde(default)]
    pub sub2: String,
    #[serde(default)]
    pub sub3: String,
    #[serde(default)]
    pub sub4: String,
    #[serde(default)]
    pub sub5: String,
}

fn click_params(q: TrackQuery, http: &HttpRequest) -> ClickParams {
    ClickParams {
        campaign_id: q.cid,
        creative_id: q.cr,
        line_item_id: q.li,
        source_type: q.st.parse().unwrap_or(SourceType::Rtb),
        source_id: q.src,
        impression_id: q.imp,
        gaid: q.gaid,
        idfa: q.idfa,
        ip: client_ip(http),
        user_agent: http
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        sub1: q.sub1,
        sub2: q.sub2,
        sub3: q.sub3,
        sub4: q.sub4,
        sub5: q.sub5,
    }
}

/// `GET /track/click` — registers the click and 302s to the MMP. A
/// campaign with no destination answers 200. A click that cannot be
/// durably written answers 500: an untracked redirect would be a
/// conversion we can never attribute.
pub async fn click(
    ctx: web::Data<AppContext>,
    query: web::Query<TrackQuery>,
    http: HttpRequest,
) -> HttpResponse {
    let params = click_params(query.into_inner(), &http);

    match ctx.tracking.register_click(params).await {
        Ok(reg) if !reg.redirect_url.is_empty() => HttpResponse::Found()
            .insert_header((header::LOCATION, reg.redirect_url))
            .finish(),
        Ok(_) => HttpResponse::Ok().finish(),
        Err(CoreError::NotFound { .. }) => {
            HttpResponse::Ok().json(json!({"error": "campaign not found"}))
        }
        Err(e) => {
            error!(error = %e, "click registration failed");
            HttpResponse::InternalServerError().json(json!({"error": "tracking unavailable"}))
        }
    }
}

/// `GET /track/view` — registers the impression and serves the pixel.
/// The pixel always renders; a broken view must never break the page.
pub async fn view(
    ctx: web::Data<AppContext>,
    query: web::Query<TrackQuery>,
    http: HttpRequest,
) -> HttpResponse {
    let params = click_params(query.into_inner(), &http);

    if let Err(e) = ctx.tracking.register_view(params).await {
        warn!(error = %e, "view registration failed");
    }

    HttpResponse::Ok()
        .content_type("image/gif")
        .insert_header((header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"))
        .body(PIXEL_GIF.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_is_the_canonical_43_bytes() {
        assert_eq!(PIXEL_GIF.len(), 43);
        assert_eq!(&PIXEL_GIF[..6], b"GIF89a");
        assert_eq!(PIXEL_GIF[42], 0x3b);
    }
}
