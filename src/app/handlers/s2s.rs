use crate::app::context::AppContext;
use crate::app::handlers::client_ip;
use crate::core::errors::CoreError;
use crate::core::s2s::S2sAdRequest;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::error;

#[derive(Debug, Deserialize, Default)]
pub struct S2sQuery {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub device_type: String,
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

/// `GET /s2s/{slug}/ad` — partner ad lookup. Auth and no-fill outcomes
/// are HTTP 200 with `success: false`; partners key off the body, and a
/// 4xx would page their side for what is routine no-fill.
pub async fn ad(
    ctx: web::Data<AppContext>,
    slug: web::Path<String>,
    query: web::Query<S2sQuery>,
    http: HttpRequest,
) -> HttpResponse {
    let q = query.into_inner();
    let request = S2sAdRequest {
        slug: slug.into_inner(),
        token: q.token,
        client_ip: client_ip(&http),
        country: q.country,
        os: q.os,
        device_type: q.device_type,
        gaid: q.gaid,
        idfa: q.idfa,
        sub1: q.sub1,
        sub2: q.sub2,
        sub3: q.sub3,
        sub4: q.sub4,
        sub5: q.sub5,
    };

    let deadline = Duration::from_millis(ctx.config.server.s2s_deadline_ms);
    match tokio::time::timeout(deadline, ctx.s2s.serve(&request)).await {
        Ok(Ok(response)) => HttpResponse::Ok().json(response),
        Ok(Err(CoreError::Unauthorized(msg))) => {
            HttpResponse::Ok().json(json!({"success": false, "error": msg}))
        }
        Ok(Err(CoreError::NotFound { kind, id })) => {
            HttpResponse::Ok().json(json!({"success": false, "error": format!("{kind} {id}")}))
        }
        Ok(Err(e)) => {
            error!(error = %e, "s2s ad lookup failed");
            HttpResponse::InternalServerError()
                .json(json!({"success": false, "error": "internal"}))
        }
        Err(_) => HttpResponse::Ok().json(json!({"success": false, "error": "deadline exceeded"})),
    }
}
