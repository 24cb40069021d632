use crate::core::models::source::SourceType;
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Append-only record of a user click. Written synchronously before the
/// tracking redirect is sent, never mutated afterwards; postbacks hours
/// or days later reconcile against it by `click_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Click {
    pub click_id: String,
    pub ts: DateTime<Utc>,
    pub campaign_id: String,
    pub line_item_id: String,
    pub creative_id: String,
    pub source_type: SourceType,
    pub source_id: String,
    /// gaid or idfa, whichever the caller supplied.
    pub device_ifa: String,
    pub gaid: String,
    pub idfa: String,
    pub ip: String,
    pub user_agent: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub device_os: String,
    pub device_type: String,
    pub device_make: String,
    pub device_model: String,
    pub sub1: String,
    pub sub2: String,
    pub sub3: String,
    pub sub4: String,
    pub sub5: String,
    /// MMP redirect URL after macro substitution.
    pub target_url: String,
}

/// Append-only record of a rendered view.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Impression {
    pub impression_id: String,
    pub ts: DateTime<Utc>,
    pub campaign_id: String,
    pub line_item_id: String,
    pub creative_id: String,
    pub source_type: SourceType,
    pub source_id: String,
    pub device_ifa: String,
    pub ip: String,
    /// Clearing price from the auction win notice, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_price: Option<f64>,
}

/// Conversion reported by an MMP, reconciled to a click. Campaign and
/// source fields are denormalized from the click at write time so the
/// record stands alone after catalog edits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Conversion {
    pub conversion_id: String,
    pub ts: DateTime<Utc>,
    pub click_id: String,
    pub campaign_id: String,
    pub line_item_id: String,
    pub creative_id: String,
    pub source_type: SourceType,
    pub source_id: String,
    /// Internal vocabulary, e.g. "install", "purchase".
    pub event: String,
    /// Vendor event name as received, before mapping.
    pub event_original: String,
    pub revenue: f64,
    pub currency: String,
    pub revenue_usd: f64,
    pub payout: f64,
    pub payout_usd: f64,
    pub device_ifa: String,
    /// Vendor-side id for click-less attributions.
    pub external_id: String,
    /// Vendor transaction id, part of the dedup key.
    pub transaction_id: String,
    /// Seconds from click to conversion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_install: Option<i64>,
}

/// Win notice from an exchange after a first-price auction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Win {
    pub ts: DateTime<Utc>,
    pub campaign_id: String,
    pub line_item_id: String,
    pub creative_id: String,
    pub imp_id: String,
    pub price: f64,
}
