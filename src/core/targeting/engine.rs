use crate::core::geo::{GeoInfo, GeoResolver};
use crate::core::models::targeting::Targeting;
use crate::core::openrtb::{BidRequest, Imp};
use crate::core::targeting::version::cmp_versions;
use chrono::{DateTime, Datelike, Timelike, Utc};
use metrics::counter;
use std::cmp::Ordering;
use std::sync::Arc;

/// Everything a targeting evaluation looks at, already flattened out of
/// the bid request (or synthesized by the S2S handler). CPU-only from
/// here on; the geo round trip happened while building this.
#[derive(Debug, Clone, Default)]
pub struct TargetingContext {
    pub geo: GeoInfo,
    pub domain: String,
    pub bundle: String,
    pub device_type: Option<i32>,
    pub os: String,
    pub osv: String,
    pub categories: Vec<String>,
    pub banner_w: Option<u32>,
    pub banner_h: Option<u32>,
    pub connection_type: Option<i32>,
    pub carrier: String,
    pub make: String,
    pub model: String,
    pub language: String,
    pub now: DateTime<Utc>,
}

/// Outcome of one evaluation. `failed_criterion` names the first gate
/// that rejected; the fixed evaluation order makes it deterministic.
#[derive(Debug, Clone)]
pub struct TargetingResult {
    pub matched: bool,
    pub failed_criterion: Option<&'static str>,
    pub geo: GeoInfo,
}

impl TargetingResult {
    fn hit(geo: GeoInfo) -> Self {
        Self {
            matched: true,
            failed_criterion: None,
            geo,
        }
    }

    fn miss(criterion: &'static str, geo: GeoInfo) -> Self {
        Self {
            matched: false,
            failed_criterion: Some(criterion),
            geo,
        }
    }
}

/// Declarative-filter evaluator. Short-circuits on the first failing
/// criterion; the order is fixed and contractual (tested below) so
/// miss metrics stay comparable across deployments. The engine emits
/// metrics only — it never logs.
pub struct TargetingEngine {
    geo: Arc<GeoResolver>,
}

fn case_insensitive_contains(list: &[String], value: &str) -> bool {
    list.iter().any(|x| x.eq_ignore_ascii_case(value))
}

/// `domain == d` or `domain` ends with `".d"`, both case-folded.
fn domain_matches(domain: &str, entry: &str) -> bool {
    let domain = domain.to_lowercase();
    let entry = entry.to_lowercase();
    domain == entry || domain.ends_with(&format!(".{entry}"))
}

fn any_domain_matches(list: &[String], domain: &str) -> bool {
    list.iter().any(|entry| domain_matches(domain, entry))
}

fn categories_intersect(list: &[String], cats: &[String]) -> bool {
    cats.iter()
        .any(|c| list.iter().any(|l| l.eq_ignore_ascii_case(c)))
}

impl TargetingEngine {
    pub fn new(geo: Arc<GeoResolver>) -> Self {
        Self { geo }
    }

    /// RTB entry point: flattens request+impression into a context,
    /// resolving geo from the device IP when the request carries none.
    pub async fn evaluate(
        &self,
        targeting: &Targeting,
        req: &BidRequest,
        imp: &Imp,
    ) -> TargetingResult {
        let device = req.device.as_ref();

        let geo = match device.and_then(|d| d.geo.as_ref()) {
            Some(g) if g.country.as_deref().is_some_and(|c| !c.is_empty()) => GeoInfo {
                country: g.country.clone().unwrap_or_default(),
                region: g.region.clone().unwrap_or_default(),
                city: g.city.clone().unwrap_or_default(),
            },
            _ => {
                let ip = device
                    .and_then(|d| d.ip.as_deref().or(d.ipv6.as_deref()))
                    .unwrap_or_default();
                self.geo.resolve(ip).await
            }
        };

        let ctx = TargetingContext {
            geo,
            domain: req.media_domain().unwrap_or_default().to_string(),
            bundle: req.bundle().unwrap_or_default().to_string(),
            device_type: device.and_then(|d| d.devicetype),
            os: device.and_then(|d| d.os.clone()).unwrap_or_default(),
            osv: device.and_then(|d| d.osv.clone()).unwrap_or_default(),
            categories: req.categories().to_vec(),
            banner_w: imp.banner.as_ref().and_then(|b| b.w),
            banner_h: imp.banner.as_ref().and_then(|b| b.h),
            connection_type: device.and_then(|d| d.connectiontype),
            carrier: device.and_then(|d| d.carrier.clone()).unwrap_or_default(),
            make: device.and_then(|d| d.make.clone()).unwrap_or_default(),
            model: device.and_then(|d| d.model.clone()).unwrap_or_default(),
            language: device.and_then(|d| d.language.clone()).unwrap_or_default(),
            now: Utc::now(),
        };

        self.evaluate_ctx(targeting, &ctx)
    }

    /// Evaluates a pre-built context. Order is fixed: country, region,
    /// city, domain allow, domain deny, bundle allow, bundle deny,
    /// device type, os, os version, category allow, category deny,
    /// banner size, connection type, carrier, device make, language,
    /// then day-parting.
    pub fn evaluate_ctx(&self, t: &Targeting, ctx: &TargetingContext) -> TargetingResult {
        macro_rules! gate {
            ($criterion:literal, $pass:expr) => {
                let passed: bool = $pass;
                counter!(
                    concat!("targeting.", $criterion),
                    "result" => if passed { "hit" } else { "miss" }
                )
                .increment(1);
                if !passed {
                    return TargetingResult::miss($criterion, ctx.geo.clone());
                }
            };
        }

        if !t.countries.is_empty() {
            gate!("geo_country", case_insensitive_contains(&t.countries, &ctx.geo.country));
        }
        if !t.regions.is_empty() {
            gate!("geo_region", case_insensitive_contains(&t.regions, &ctx.geo.region));
        }
        if !t.cities.is_empty() {
            gate!("geo_city", case_insensitive_contains(&t.cities, &ctx.geo.city));
        }
        if !t.domain_allow.is_empty() {
            gate!("domain_allow", any_domain_matches(&t.domain_allow, &ctx.domain));
        }
        if !t.domain_deny.is_empty() {
            gate!("domain_deny", !any_domain_matches(&t.domain_deny, &ctx.domain));
        }
        if !t.bundle_allow.is_empty() {
            gate!("bundle_allow", case_insensitive_contains(&t.bundle_allow, &ctx.bundle));
        }
        if !t.bundle_deny.is_empty() {
            gate!("bundle_deny", !case_insensitive_contains(&t.bundle_deny, &ctx.bundle));
        }
        if !t.device_types.is_empty() {
            gate!(
                "device_type",
                ctx.device_type.is_some_and(|dt| t.device_types.contains(&dt))
            );
        }
        if let Some(os) = &t.os {
            gate!("os", os.eq_ignore_ascii_case(&ctx.os));
        }
        if t.osv_min.is_some() || t.osv_max.is_some() {
            // a requester that does not report a version is accepted
            gate!("os_version", ctx.osv.is_empty() || {
                let above_min = t
                    .osv_min
                    .as_deref()
                    .is_none_or(|min| cmp_versions(&ctx.osv, min) != Ordering::Less);
                let below_max = t
                    .osv_max
                    .as_deref()
                    .is_none_or(|max| cmp_versions(&ctx.osv, max) != Ordering::Greater);
                above_min && below_max
            });
        }
        if !t.categories_allow.is_empty() {
            gate!(
                "category_allow",
                categories_intersect(&t.categories_allow, &ctx.categories)
            );
        }
        if !t.categories_deny.is_empty() {
            gate!(
                "category_deny",
                !categories_intersect(&t.categories_deny, &ctx.categories)
            );
        }
        if t.min_banner_w.is_some() || t.min_banner_h.is_some() {
            gate!("banner_size", {
                let wide_enough = match (t.min_banner_w, ctx.banner_w) {
                    (Some(min), Some(w)) => w >= min,
                    _ => true,
                };
                let tall_enough = match (t.min_banner_h, ctx.banner_h) {
                    (Some(min), Some(h)) => h >= min,
                    _ => true,
                };
                wide_enough && tall_enough
            });
        }
        if !t.connection_types.is_empty() {
            gate!(
                "connection_type",
                ctx.connection_type
                    .is_some_and(|ct| t.connection_types.contains(&ct))
            );
        }
        if !t.carriers.is_empty() {
            gate!("carrier", case_insensitive_contains(&t.carriers, &ctx.carrier));
        }
        if !t.makes.is_empty() || !t.models.is_empty() {
            gate!("device_make", {
                let make_ok =
                    t.makes.is_empty() || case_insensitive_contains(&t.makes, &ctx.make);
                let model_ok =
                    t.models.is_empty() || case_insensitive_contains(&t.models, &ctx.model);
                make_ok && model_ok
            });
        }
        if !t.languages.is_empty() {
            gate!("language", case_insensitive_contains(&t.languages, &ctx.language));
        }
        if let Some(dp) = &t.dayparting {
            gate!("dayparting", {
                let hour_ok = dp.hours.is_empty() || dp.hours.contains(&(ctx.now.hour() as u8));
                let day_ok = dp.days.is_empty()
                    || dp
                        .days
                        .contains(&(ctx.now.weekday().num_days_from_monday() as u8));
                hour_ok && day_ok
            });
        }

        TargetingResult::hit(ctx.geo.clone())
    }
}
