pub mod bid;
pub mod postback;
pub mod s2s;
pub mod tracking;

use actix_web::HttpRequest;

/// Client IP as the S2S auth and click records see it: first hop of
/// X-Forwarded-For, else X-Real-IP, else the peer address sans port.
pub fn client_ip(req: &HttpRequest) -> String {
    if let Some(xff) = req.headers().get("x-forwarded-for")
        && let Ok(value) = xff.to_str()
        && let Some(first) = value.split(',').next()
    {
        let first = first.trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }

    if let Some(real) = req.headers().get("x-real-ip")
        && let Ok(value) = real.to_str()
        && !value.is_empty()
    {
        return value.to_string();
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default()
}
