use crate::core::models::pacing::PacingConfig;
use crate::core::models::targeting::Targeting;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Ended,
    Archived,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CreativeFormat {
    #[default]
    Banner,
    Video,
    Native,
    Audio,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// How a line item prices each impression. CPM values are in dollars
/// per thousand; the bid service divides down to per-impression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BidStrategy {
    FixedCpm {
        cpm: f64,
    },
    DynamicCpm {
        min_cpm: f64,
        max_cpm: f64,
        /// Fraction shaved off max_cpm, applied when in (0, 1).
        #[serde(default)]
        bid_shading: f64,
    },
    TargetCpa {
        target_cpa: f64,
        #[serde(default)]
        max_cpm: Option<f64>,
    },
}

impl Default for BidStrategy {
    fn default() -> Self {
        BidStrategy::FixedCpm { cpm: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayoutType {
    #[default]
    Fixed,
    /// Fraction of the campaign bid amount.
    Percent,
}

/// What we pay a traffic source when the trigger event converts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct PayoutConfig {
    pub payout_type: PayoutType,
    pub amount: f64,
    /// Internal event name that triggers the payout; empty pays on any.
    pub event: String,
}

/// Mobile measurement partner wiring for a campaign: where clicks
/// redirect, where views ping, and how our macro names map to theirs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct MmpConfig {
    /// Vendor label, e.g. "appsflyer". Informational only; the postback
    /// intake dispatches on URL path, not on this.
    pub mmp_type: String,
    pub click_url: String,
    pub view_url: String,
    /// our macro name -> partner macro name, applied after the standard pass.
    pub macro_renames: HashMap<String, String>,
    /// Events the advertiser wants forwarded; empty means all.
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Creative {
    pub id: String,
    pub format: CreativeFormat,
    pub w: u32,
    pub h: u32,
    pub adomain: Vec<String>,
    /// Markup served verbatim for banner/native.
    pub adm_template: String,
    /// Inline VAST document, preferred over wrapping video_url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vast_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub audit_status: AuditStatus,
}

/// Atomic bidding unit: one strategy, one pacing config, one targeting
/// set, one creative pool. Priority breaks ties between line items that
/// both pass every gate (higher wins).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct LineItem {
    pub id: String,
    pub campaign_id: String,
    pub name: String,
    pub priority: i32,
    pub strategy: BidStrategy,
    pub pacing: PacingConfig,
    pub targeting: Targeting,
    pub creatives: Vec<Creative>,
    #[builder(default = "true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Campaign {
    pub id: String,
    pub advertiser_id: String,
    pub name: String,
    pub status: CampaignStatus,
    /// Store bundle for mobile install campaigns.
    pub app_bundle: String,
    /// Fallback redirect when the MMP click template is empty.
    pub app_store_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mmp: Option<MmpConfig>,
    pub payout: PayoutConfig,
    pub line_items: Vec<LineItem>,
}

impl Campaign {
    pub fn is_biddable(&self) -> bool {
        self.status == CampaignStatus::Active
    }
}

/// Logical owner of campaigns. The core never mutates these; they exist
/// so event records can snapshot an owner id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Advertiser {
    pub id: String,
    pub name: String,
    pub contact_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
}
