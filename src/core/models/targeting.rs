use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Day-parting schedule in UTC. Empty lists mean no restriction,
/// matching the wildcard convention of every other criterion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dayparting {
    /// Allowed hours of day, 0-23.
    pub hours: Vec<u8>,
    /// Allowed days of week, 0 = Monday through 6 = Sunday.
    pub days: Vec<u8>,
}

/// Declarative targeting filter for a line item. Every collection is a
/// whitelist (or deny list where named) and an empty collection matches
/// everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Targeting {
    /// ISO-3166-1 alpha-2, matched case-insensitively.
    pub countries: Vec<String>,
    pub regions: Vec<String>,
    pub cities: Vec<String>,
    /// Site domains; suffix match so "example.com" covers "m.example.com".
    pub domain_allow: Vec<String>,
    pub domain_deny: Vec<String>,
    pub bundle_allow: Vec<String>,
    pub bundle_deny: Vec<String>,
    /// OpenRTB device type codes.
    pub device_types: Vec<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osv_min: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osv_max: Option<String>,
    /// IAB content category codes, e.g. "IAB9".
    pub categories_allow: Vec<String>,
    pub categories_deny: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_banner_w: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_banner_h: Option<u32>,
    /// OpenRTB connection type codes.
    pub connection_types: Vec<i32>,
    pub carriers: Vec<String>,
    pub makes: Vec<String>,
    pub models: Vec<String>,
    pub languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dayparting: Option<Dayparting>,
}

impl Targeting {
    /// True when nothing is constrained, i.e. the filter is a wildcard.
    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
            && self.regions.is_empty()
            && self.cities.is_empty()
            && self.domain_allow.is_empty()
            && self.domain_deny.is_empty()
            && self.bundle_allow.is_empty()
            && self.bundle_deny.is_empty()
            && self.device_types.is_empty()
            && self.os.is_none()
            && self.osv_min.is_none()
            && self.osv_max.is_none()
            && self.categories_allow.is_empty()
            && self.categories_deny.is_empty()
            && self.min_banner_w.is_none()
            && self.min_banner_h.is_none()
            && self.connection_types.is_empty()
            && self.carriers.is_empty()
            && self.makes.is_empty()
            && self.models.is_empty()
            && self.languages.is_empty()
            && self.dayparting.is_none()
    }
}
