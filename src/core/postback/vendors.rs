use std::collections::HashMap;
use strum::{Display, EnumString};

/// Mobile measurement partners whose postbacks we accept. Dispatch is
/// by URL path; the vendor decides both the query-parameter dialect and
/// the event-name vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Mmp {
    AppsFlyer,
    Adjust,
    Singular,
    Generic,
}

/// Vendor-agnostic shape every postback parses into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostbackRequest {
    pub click_id: String,
    pub event: String,
    pub revenue: f64,
    pub currency: String,
    pub idfa: String,
    pub gaid: String,
    pub external_id: String,
    pub transaction_id: String,
    pub sub_params: HashMap<String, String>,
}

fn first<'a>(query: &'a HashMap<String, String>, names: &[&str]) -> &'a str {
    names
        .iter()
        .find_map(|n| query.get(*n).map(String::as_str).filter(|v| !v.is_empty()))
        .unwrap_or("")
}

impl Mmp {
    /// Maps a vendor event name into the internal vocabulary. Pure in
    /// the vendor identity and the external string; unknown names map
    /// to themselves.
    pub fn map_event(&self, external: &str) -> String {
        let mapped = match self {
            Mmp::AppsFlyer => match external {
                "install" | "af_app_install" => "install",
                "af_complete_registration" => "registration",
                "af_purchase" => "purchase",
                "af_first_purchase" => "first_purchase",
                "af_subscribe" => "subscribe",
                "af_add_to_cart" => "add_to_cart",
                "af_level_achieved" => "level_achieved",
                "af_tutorial_completion" => "tutorial_completion",
                other => other,
            },
            Mmp::Adjust => match external {
                "install" => "install",
                "registration" => "registration",
                "purchase" => "purchase",
                other => other,
            },
            Mmp::Singular => match external {
                "__INSTALL__" => "install",
                "registration" => "registration",
                "purchase" => "purchase",
                other => other,
            },
            Mmp::Generic => external,
        };
        mapped.to_string()
    }

    /// Extracts the common shape from this vendor's query dialect.
    pub fn parse(&self, query: &HashMap<String, String>) -> PostbackRequest {
        let (click_id, event, revenue, currency, gaid, idfa, external_id, transaction_id) =
            match self {
                Mmp::AppsFlyer => (
                    first(query, &["clickid", "click_id"]),
                    first(query, &["event_name", "event"]),
                    first(query, &["event_revenue", "revenue"]),
                    first(query, &["event_revenue_currency", "currency"]),
                    first(query, &["advertising_id", "gaid"]),
                    first(query, &["idfa"]),
                    first(query, &["appsflyer_id"]),
                    first(query, &["transaction_id", "af_transaction_id"]),
                ),
                Mmp::Adjust => (
                    first(query, &["click_id", "clickid"]),
                    first(query, &["event", "event_name"]),
                    first(query, &["revenue"]),
                    first(query, &["currency"]),
                    first(query, &["gps_adid", "gaid"]),
                    first(query, &["idfa"]),
                    first(query, &["adid"]),
                    first(query, &["transaction_id"]),
                ),
                Mmp::Singular => (
                    first(query, &["cl", "click_id"]),
                    first(query, &["evtname", "event"]),
                    first(query, &["amt", "revenue"]),
                    first(query, &["cur", "currency"]),
                    first(query, &["aifa", "gaid"]),
                    first(query, &["idfa"]),
                    first(query, &["sid"]),
                    first(query, &["txn_id", "transaction_id"]),
                ),
                Mmp::Generic => (
                    first(query, &["click_id", "clickid"]),
                    first(query, &["event"]),
                    first(query, &["revenue"]),
                    first(query, &["currency"]),
                    first(query, &["gaid"]),
                    first(query, &["idfa"]),
                    first(query, &["external_id"]),
                    first(query, &["transaction_id"]),
                ),
            };

        let sub_params = query
            .iter()
            .filter(|(k, _)| k.starts_with("sub"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        PostbackRequest {
            click_id: click_id.to_string(),
            event: event.to_string(),
            revenue: revenue.parse().unwrap_or(0.0),
            currency: currency.to_string(),
            idfa: idfa.to_string(),
            gaid: gaid.to_string(),
            external_id: external_id.to_string(),
            transaction_id: transaction_id.to_string(),
            sub_params,
        }
    }
}
