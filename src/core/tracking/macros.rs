use crate::core::models::events::Click;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::HashMap;

/// Characters escaped in substituted free-text values. Braces are in
/// the set so a substituted value can never spell a new `{macro}`,
/// which is what makes a second substitution pass a no-op.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'{')
    .add(b'}');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// Values available to `{macro}` substitution in partner URL templates.
///
/// The substitution contract is bit-exact against partner expectations:
/// one literal pass, unknown names left verbatim, ids and numerics
/// emitted as-is, free-text percent-encoded. `revenue_decimals` is 2
/// for MMP-facing templates and 4 for S2S partner postbacks.
#[derive(Debug, Clone)]
pub struct MacroContext {
    pub click_id: String,
    pub impression_id: String,
    pub conversion_id: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub creative_id: String,
    pub line_item_id: String,
    pub source_id: String,
    pub source_name: String,
    pub publisher_id: String,
    pub gaid: String,
    pub idfa: String,
    pub device_ifa: String,
    pub ip: String,
    pub user_agent: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub device_os: String,
    pub device_osv: String,
    pub device_type: String,
    pub device_make: String,
    pub device_model: String,
    pub sub1: String,
    pub sub2: String,
    pub sub3: String,
    pub sub4: String,
    pub sub5: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub event: String,
    pub revenue: f64,
    pub currency: String,
    pub payout: f64,
    pub revenue_decimals: usize,
}

impl Default for MacroContext {
    fn default() -> Self {
        Self {
            click_id: String::new(),
            impression_id: String::new(),
            conversion_id: String::new(),
            campaign_id: String::new(),
            campaign_name: String::new(),
            creative_id: String::new(),
            line_item_id: String::new(),
            source_id: String::new(),
            source_name: String::new(),
            publisher_id: String::new(),
            gaid: String::new(),
            idfa: String::new(),
            device_ifa: String::new(),
            ip: String::new(),
            user_agent: String::new(),
            country: String::new(),
            region: String::new(),
            city: String::new(),
            device_os: String::new(),
            device_osv: String::new(),
            device_type: String::new(),
            device_make: String::new(),
            device_model: String::new(),
            sub1: String::new(),
            sub2: String::new(),
            sub3: String::new(),
            sub4: String::new(),
            sub5: String::new(),
            timestamp: 0,
            event: String::new(),
            revenue: 0.0,
            currency: String::new(),
            payout: 0.0,
            revenue_decimals: 2,
        }
    }
}

impl MacroContext {
    /// Context seeded from a stored click; postback handling fills in
    /// event/revenue/payout afterwards.
    pub fn for_click(click: &Click) -> Self {
        Self {
            click_id: click.click_id.clone(),
            campaign_id: click.campaign_id.clone(),
            creative_id: click.creative_id.clone(),
            line_item_id: click.line_item_id.clone(),
            source_id: click.source_id.clone(),
            gaid: click.gaid.clone(),
            idfa: click.idfa.clone(),
            device_ifa: click.device_ifa.clone(),
            ip: click.ip.clone(),
            user_agent: click.user_agent.clone(),
            country: click.country.clone(),
            region: click.region.clone(),
            city: click.city.clone(),
            device_os: click.device_os.clone(),
            device_type: click.device_type.clone(),
            device_make: click.device_make.clone(),
            device_model: click.device_model.clone(),
            sub1: click.sub1.clone(),
            sub2: click.sub2.clone(),
            sub3: click.sub3.clone(),
            sub4: click.sub4.clone(),
            sub5: click.sub5.clone(),
            timestamp: chrono::Utc::now().timestamp(),
            ..Default::default()
        }
    }

    fn value_for(&self, name: &str) -> Option<String> {
        let value = match name {
            "click_id" | "clickid" => self.click_id.clone(),
            "impression_id" => self.impression_id.clone(),
            "conversion_id" => self.conversion_id.clone(),
            "campaign_id" => self.campaign_id.clone(),
            "campaign_name" | "campaign" => encode(&self.campaign_name),
            "creative_id" => self.creative_id.clone(),
            "line_item_id" => self.line_item_id.clone(),
            "source_id" => self.source_id.clone(),
            "source_name" => encode(&self.source_name),
            "publisher_id" => self.publisher_id.clone(),
            "gaid" | "advertising_id" => self.gaid.clone(),
            "idfa" => self.idfa.clone(),
            "device_ifa" => self.device_ifa.clone(),
            "ip" => encode(&self.ip),
            "user_agent" | "ua" => encode(&self.user_agent),
            "country" | "geo_country" => encode(&self.country),
            "city" | "geo_city" => encode(&self.city),
            "region" | "geo_region" => encode(&self.region),
            "device_os" | "os" => encode(&self.device_os),
            "device_osv" | "osv" => encode(&self.device_osv),
            "device_type" => encode(&self.device_type),
            "device_make" => encode(&self.device_make),
            "device_model" => encode(&self.device_model),
            "sub1" => encode(&self.sub1),
            "sub2" => encode(&self.sub2),
            "sub3" => encode(&self.sub3),
            "sub4" => encode(&self.sub4),
            "sub5" => encode(&self.sub5),
            "timestamp" | "ts" => self.timestamp.to_string(),
            "event" => encode(&self.event),
            "revenue" => format!("{:.prec$}", self.revenue, prec = self.revenue_decimals),
            "currency" => self.currency.clone(),
            "payout" => format!("{:.prec$}", self.payout, prec = self.revenue_decimals),
            _ => return None,
        };
        Some(value)
    }

    /// One literal pass over the template. Unknown `{name}` stays
    /// verbatim; an unterminated brace passes through untouched.
    pub fn substitute(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len() + 32);
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            match tail.find('}') {
                Some(end) => {
                    match self.value_for(&tail[1..end]) {
                        Some(value) => out.push_str(&value),
                        None => out.push_str(&tail[..=end]),
                    }
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push_str(tail);
                    return out;
                }
            }
        }

        out.push_str(rest);
        out
    }

    /// Standard pass, then the partner's renames: each `{their}` takes
    /// the value that `{our}` would have substituted.
    pub fn substitute_with_renames(
        &self,
        template: &str,
        renames: &HashMap<String, String>,
    ) -> String {
        let mut out = self.substitute(template);
        for (our, their) in renames {
            if let Some(value) = self.value_for(our) {
                out = out.replace(&format!("{{{their}}}"), &value);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MacroContext {
        MacroContext {
            click_id: "ck-123".into(),
            campaign_id: "c1".into(),
            gaid: "G-1".into(),
            user_agent: "Mozilla/5.0 (Linux; Android 13)".into(),
            country: "US".into(),
            event: "purchase".into(),
            revenue: 9.99,
            currency: "USD".into(),
            payout: 1.5,
            timestamp: 1_754_000_000,
            ..Default::default()
        }
    }

    #[test]
    fn ids_and_aliases_substitute_as_is() {
        let out = ctx().substitute("https://t.mmp.com/c?c={click_id}&c2={clickid}&g={advertising_id}");
        assert_eq!(out, "https://t.mmp.com/c?c=ck-123&c2=ck-123&g=G-1");
    }

    #[test]
    fn free_text_is_percent_encoded() {
        let out = ctx().substitute("u={ua}");
        assert_eq!(out, "u=Mozilla/5.0%20(Linux;%20Android%2013)");
    }

    #[test]
    fn unknown_macros_left_verbatim() {
        let out = ctx().substitute("x={mystery}&y={click_id}");
        assert_eq!(out, "x={mystery}&y=ck-123");
    }

    #[test]
    fn revenue_two_and_four_decimals() {
        let mut c = ctx();
        assert_eq!(c.substitute("r={revenue}"), "r=9.99");
        c.revenue_decimals = 4;
        assert_eq!(c.substitute("r={revenue}&p={payout}"), "r=9.9900&p=1.5000");
    }

    #[test]
    fn timestamp_unix_seconds() {
        assert_eq!(ctx().substitute("{ts}-{timestamp}"), "1754000000-1754000000");
    }

    #[test]
    fn second_pass_is_noop() {
        let once = ctx().substitute("https://x/?ua={ua}&c={click_id}&r={revenue}");
        let twice = ctx().substitute(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn unterminated_brace_passes_through() {
        assert_eq!(ctx().substitute("a={click_id"), "a={click_id");
    }

    #[test]
    fn renames_take_our_values() {
        let mut renames = HashMap::new();
        renames.insert("click_id".to_string(), "af_sub_id".to_string());
        let out = ctx().substitute_with_renames("c={af_sub_id}&e={event}", &renames);
        assert_eq!(out, "c=ck-123&e=purchase");
    }

    #[test]
    fn empty_template_stays_empty() {
        assert_eq!(ctx().substitute(""), "");
    }
}
