use crate::core::models::campaign::{CreativeFormat, PayoutType};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

/// Which class of supply a record refers to. The string forms appear in
/// tracking query params and click records, so they stay short.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceType {
    #[default]
    Rtb,
    S2s,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceStatus {
    #[default]
    Active,
    Paused,
    Archived,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum PostbackMethod {
    #[default]
    Get,
    Post,
}

/// Direct server-to-server traffic partner.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct S2sSource {
    pub id: String,
    pub name: String,
    /// URL path component: `/s2s/{slug}/ad`.
    pub slug: String,
    /// When set, requests must carry `token=` equal to this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Client IPs allowed to call the ad endpoint; "*" admits any.
    pub allowed_ips: Vec<String>,
    /// Conversion notification template, standard macros plus renames.
    pub postback_url: String,
    pub postback_method: PostbackMethod,
    /// Internal event names the partner subscribes to; empty or "*" = all.
    pub postback_events: Vec<String>,
    /// our macro name -> partner macro name.
    pub macro_renames: HashMap<String, String>,
    /// Dollars paid per conversion unless the campaign link overrides.
    pub default_payout: f64,
    pub status: SourceStatus,
}

/// An OpenRTB exchange we answer bids for.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct RtbSource {
    pub id: String,
    pub name: String,
    /// Path component on the bid endpoint when multiplexed; also the
    /// metrics label.
    pub slug: String,
    pub openrtb_version: String,
    pub formats: Vec<CreativeFormat>,
    /// Scales every computed price before the floor gate.
    #[serde(default = "default_bid_multiplier")]
    #[builder(default = "1.0")]
    pub bid_multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qps_limit: Option<u32>,
    /// Response deadline when the request carries no tmax.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmax_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub status: SourceStatus,
}

fn default_bid_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    #[default]
    Active,
    Paused,
}

/// Per-link payout override on a campaign↔source binding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutOverride {
    pub payout_type: PayoutType,
    pub amount: f64,
}

/// Many-to-many binding of a campaign to a supply source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct CampaignSource {
    pub campaign_id: String,
    pub source_type: SourceType,
    pub source_id: String,
    pub status: LinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_override: Option<PayoutOverride>,
    /// Optional conversion cap for this link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap: Option<u64>,
}
