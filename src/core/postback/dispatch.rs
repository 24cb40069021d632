use crate::core::managers::SourceManager;
use crate::core::models::events::{Click, Conversion};
use crate::core::outbound::OutboundClient;
use crate::core::tracking::MacroContext;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Fans a stored conversion out to the S2S partner that drove the
/// click. Best-effort by contract: no retries, a non-2xx partner
/// answer is metered and forgotten.
pub struct PostbackDispatcher {
    sources: Arc<SourceManager>,
    outbound: Arc<OutboundClient>,
    timeout: Duration,
}

impl PostbackDispatcher {
    pub fn new(sources: Arc<SourceManager>, outbound: Arc<OutboundClient>, timeout: Duration) -> Self {
        Self {
            sources,
            outbound,
            timeout,
        }
    }

    /// Renders the partner URL for one conversion, or `None` when the
    /// partner is unknown, unsubscribed from the event, or has no URL.
    /// Split from the send so tests can assert the exact URL.
    pub fn render(&self, click: &Click, conversion: &Conversion) -> Option<String> {
        let source = self.sources.s2s(&click.source_id)?;

        if !source.postback_events.is_empty() {
            let subscribed = source.postback_events.iter().any(|e| {
                e == "*" || e.eq_ignore_ascii_case(&conversion.event)
            });
            if !subscribed {
                debug!(
                    source = %source.id,
                    event = %conversion.event,
                    "partner not subscribed, skipping postback"
                );
                counter!("postback.s2s_skipped", "reason" => "unsubscribed").increment(1);
                return None;
            }
        }

        if source.postback_url.is_empty() {
            counter!("postback.s2s_skipped", "reason" => "no_url").increment(1);
            return None;
        }

        let ctx = MacroContext {
            conversion_id: conversion.conversion_id.clone(),
            source_name: source.name.clone(),
            event: conversion.event.clone(),
            revenue: conversion.revenue,
            currency: conversion.currency.clone(),
            payout: conversion.payout,
            // S2S partner money macros carry four decimals
            revenue_decimals: 4,
            ..MacroContext::for_click(click)
        };

        Some(ctx.substitute_with_renames(&source.postback_url, &source.macro_renames))
    }

    /// Fire-and-forget send, strictly after the conversion was written
    /// (the handler awaits the store before calling this). Returns
    /// whether a dispatch was attempted.
    pub fn dispatch(&self, click: &Click, conversion: &Conversion) -> bool {
        let Some(url) = self.render(click, conversion) else {
            return false;
        };
        let method = self
            .sources
            .s2s(&click.source_id)
            .map(|s| s.postback_method)
            .unwrap_or_default();

        self.outbound
            .fire_and_forget("s2s_postback", method, url, self.timeout);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::source::{S2sSource, SourceType};
    use crate::core::providers::{ConfigLinkProvider, ConfigSourceProvider, SourcesConfig};
    use std::collections::HashMap;

    async fn dispatcher(source: S2sSource) -> PostbackDispatcher {
        let sources = SourceManager::start(
            Arc::new(ConfigSourceProvider::new(SourcesConfig {
                s2s: vec![source],
                rtb: vec![],
            })),
            Arc::new(ConfigLinkProvider::new(vec![])),
        )
        .await
        .unwrap();
        PostbackDispatcher::new(
            sources,
            Arc::new(OutboundClient::new(4).unwrap()),
            Duration::from_secs(10),
        )
    }

    fn click() -> Click {
        Click {
            click_id: "ck-1".into(),
            source_type: SourceType::S2s,
            source_id: "s1".into(),
            gaid: "G-1".into(),
            ..Default::default()
        }
    }

    fn conversion(event: &str) -> Conversion {
        Conversion {
            conversion_id: "v1".into(),
            click_id: "ck-1".into(),
            event: event.into(),
            revenue: 9.99,
            payout: 1.25,
            currency: "USD".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn renders_macros_with_four_decimal_payout() {
        let d = dispatcher(S2sSource {
            id: "s1".into(),
            postback_url: "https://partner.example.com/pb?c={click_id}&e={event}&p={payout}&r={revenue}"
                .into(),
            ..Default::default()
        })
        .await;

        let url = d.render(&click(), &conversion("purchase")).unwrap();
        assert_eq!(
            url,
            "https://partner.example.com/pb?c=ck-1&e=purchase&p=1.2500&r=9.9900"
        );
    }

    #[tokio::test]
    async fn partner_renames_apply() {
        let mut renames = HashMap::new();
        renames.insert("click_id".to_string(), "tid".to_string());
        let d = dispatcher(S2sSource {
            id: "s1".into(),
            postback_url: "https://partner.example.com/pb?t={tid}".into(),
            macro_renames: renames,
            ..Default::default()
        })
        .await;

        let url = d.render(&click(), &conversion("install")).unwrap();
        assert_eq!(url, "https://partner.example.com/pb?t=ck-1");
    }

    #[tokio::test]
    async fn unsubscribed_event_skips() {
        let d = dispatcher(S2sSource {
            id: "s1".into(),
            postback_url: "https://partner.example.com/pb".into(),
            postback_events: vec!["install".into()],
            ..Default::default()
        })
        .await;

        assert!(d.render(&click(), &conversion("purchase")).is_none());
        assert!(d.render(&click(), &conversion("install")).is_some());
    }

    #[tokio::test]
    async fn wildcard_subscription_sends_all() {
        let d = dispatcher(S2sSource {
            id: "s1".into(),
            postback_url: "https://partner.example.com/pb".into(),
            postback_events: vec!["*".into()],
            ..Default::default()
        })
        .await;
        assert!(d.render(&click(), &conversion("whatever")).is_some());
    }

    #[tokio::test]
    async fn empty_url_skips() {
        let d = dispatcher(S2sSource {
            id: "s1".into(),
            ..Default::default()
        })
        .await;
        assert!(!d.dispatch(&click(), &conversion("install")));
    }
}
