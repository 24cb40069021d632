use derive_builder::Builder;
use serde::{Deserialize, Serialize};

fn default_bidfloorcur() -> String {
    "USD".to_string()
}

/// Top-level bid request (OpenRTB 2.5 §3.2.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct BidRequest {
    /// Unique request id, echoed back on the response.
    pub id: String,
    pub imp: Vec<Imp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Max milliseconds the exchange allows for a response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmax: Option<u64>,
    /// Allowed currencies; we only ever answer in USD.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cur: Vec<String>,
    /// Blocked advertiser categories.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcat: Vec<String>,
    /// Blocked advertiser domains.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub badv: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<i32>,
}

/// One ad placement being auctioned (§3.2.4). Exactly one of
/// banner/video/native/audio describes the shape on offer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Imp {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagid: Option<String>,
    /// Minimum bid in CPM-equivalent dollars per impression.
    pub bidfloor: f64,
    #[serde(default = "default_bidfloorcur")]
    pub bidfloorcur: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Banner {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    /// Alternate permitted sizes, preferred order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Video {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minduration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Native {
    /// Opaque native request payload, passed through untouched.
    pub request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Audio {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minduration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<u32>,
}

/// Device object (§3.2.18). `ifa` carries the resettable advertising id
/// (GAID/IDFA) which doubles as our pacing user id of last resort.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Device {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
    /// OpenRTB device type code (1=mobile/tablet, 2=pc, 4=phone, 5=tablet, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devicetype: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    /// OpenRTB connection type code (2=wifi, 4..7=cellular).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectiontype: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifa: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Geo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    /// ISO-3166-1 alpha-2 (the 2.5 spec says alpha-3; major exchanges send
    /// alpha-2 and so does every partner we integrate).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Buyer-side user id set via cookie sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyeruid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct App {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Platform-specific application id, e.g. `com.example.game`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Site {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct Publisher {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl BidRequest {
    /// Domain of the inventory, app bundle preferred over site domain.
    pub fn media_domain(&self) -> Option<&str> {
        self.app
            .as_ref()
            .and_then(|a| a.domain.as_deref())
            .or_else(|| self.site.as_ref().and_then(|s| s.domain.as_deref()))
    }

    pub fn bundle(&self) -> Option<&str> {
        self.app.as_ref().and_then(|a| a.bundle.as_deref())
    }

    /// IAB content categories of the requesting app/site.
    pub fn categories(&self) -> &[String] {
        self.app
            .as_ref()
            .map(|a| a.cat.as_slice())
            .or_else(|| self.site.as_ref().map(|s| s.cat.as_slice()))
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_exchange_request() {
        let raw = r#"{
            "id": "80ce30c53c16e6ede735f123ef6e32361bfc7b22",
            "imp": [{
                "id": "1",
                "banner": {"w": 320, "h": 50, "format": [{"w": 300, "h": 50}]},
                "bidfloor": 0.03
            }],
            "app": {"bundle": "com.example.game", "cat": ["IAB9-30"]},
            "device": {
                "ua": "Mozilla/5.0 (Linux; Android 13; Pixel 7)",
                "ip": "123.145.167.10",
                "os": "Android",
                "osv": "13",
                "ifa": "236a5b32-7a2f-4d2c-90ce-5b42ff43ed39",
                "devicetype": 4
            },
            "user": {"buyeruid": "u-992"},
            "tmax": 120
        }"#;

        let req: BidRequest = serde_json::from_str(raw).expect("request should parse");
        assert_eq!(req.id, "80ce30c53c16e6ede735f123ef6e32361bfc7b22");
        assert_eq!(req.imp.len(), 1);
        assert_eq!(req.imp[0].banner.as_ref().unwrap().w, Some(320));
        assert_eq!(req.imp[0].bidfloor, 0.03);
        assert_eq!(req.bundle(), Some("com.example.game"));
        assert_eq!(req.categories().to_vec(), vec!["IAB9-30".to_string()]);
        assert_eq!(req.tmax, Some(120));
    }

    #[test]
    fn unknown_fields_ignored() {
        let raw = r#"{"id":"r","imp":[],"regs":{"coppa":0},"ext":{"x":1}}"#;
        let req: BidRequest = serde_json::from_str(raw).expect("extensions should not break parse");
        assert!(req.imp.is_empty());
    }
}
