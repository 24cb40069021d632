use crate::app::context::AppContext;
use crate::core::postback::Mmp;
use actix_web::{web, HttpResponse};
use std::collections::HashMap;

async fn handle(ctx: &AppContext, vendor: Mmp, query: HashMap<String, String>) -> HttpResponse {
    // always 200: MMPs retry on non-200 and a logic rejection must not
    // turn into a retry storm
    let result = ctx.postbacks.handle(vendor, &query).await;
    HttpResponse::Ok().json(result)
}

pub async fn appsflyer(
    ctx: web::Data<AppContext>,
    query: web::Query<HashMap<String, String>>,
) -> HttpResponse {
    handle(&ctx, Mmp::AppsFlyer, query.into_inner()).await
}

pub async fn adjust(
    ctx: web::Data<AppContext>,
    query: web::Query<HashMap<String, String>>,
) -> HttpResponse {
    handle(&ctx, Mmp::Adjust, query.into_inner()).await
}

pub async fn singular(
    ctx: web::Data<AppContext>,
    query: web::Query<HashMap<String, String>>,
) -> HttpResponse {
    handle(&ctx, Mmp::Singular, query.into_inner()).await
}

pub async fn generic(
    ctx: web::Data<AppContext>,
    query: web::Query<HashMap<String, String>>,
) -> HttpResponse {
    handle(&ctx, Mmp::Generic, query.into_inner()).await
}
