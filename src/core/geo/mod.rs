use async_trait::async_trait;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resolved location for a client IP. Empty fields mean unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoInfo {
    pub country: String,
    pub region: String,
    pub city: String,
}

impl GeoInfo {
    pub fn is_empty(&self) -> bool {
        self.country.is_empty() && self.region.is_empty() && self.city.is_empty()
    }
}

/// IP-geolocation backend. Implementations wrap a MaxMind-style local
/// database or a sidecar service; the resolver below owns the caching.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<GeoInfo, anyhow::Error>;
}

/// Caching front for the geo provider. The cache is approximate LRU
/// keyed by IP (moka's TinyLFU — on full, some entry is evicted before
/// insert; strict recency is not required). A resolver built with no
/// provider returns empty geo for everything, which makes any nonempty
/// country/region/city targeting list fail the request.
pub struct GeoResolver {
    provider: Option<Arc<dyn GeoProvider>>,
    cache: Cache<String, GeoInfo>,
}

impl GeoResolver {
    pub fn new(provider: Option<Arc<dyn GeoProvider>>, max_entries: u64, ttl: Duration) -> Self {
        Self {
            provider,
            cache: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn resolve(&self, ip: &str) -> GeoInfo {
        let Some(provider) = &self.provider else {
            return GeoInfo::default();
        };

        if ip.is_empty() {
            return GeoInfo::default();
        }

        if let Some(hit) = self.cache.get(ip) {
            return hit;
        }

        match provider.lookup(ip).await {
            Ok(geo) => {
                self.cache.insert(ip.to_string(), geo.clone());
                geo
            }
            Err(e) => {
                debug!(ip, error = %e, "geo lookup failed");
                GeoInfo::default()
            }
        }
    }
}

/// Fixed-table provider for tests and single-market deployments.
#[derive(Default)]
pub struct StaticGeoProvider {
    entries: std::collections::HashMap<String, GeoInfo>,
}

impl StaticGeoProvider {
    pub fn new(entries: impl IntoIterator<Item = (String, GeoInfo)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

#[async_trait]
impl GeoProvider for StaticGeoProvider {
    async fn lookup(&self, ip: &str) -> Result<GeoInfo, anyhow::Error> {
        Ok(self.entries.get(ip).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn us_geo() -> GeoInfo {
        GeoInfo {
            country: "US".into(),
            region: "CA".into(),
            city: "San Francisco".into(),
        }
    }

    #[tokio::test]
    async fn nil_provider_returns_empty() {
        let resolver = GeoResolver::new(None, 100, Duration::from_secs(60));
        assert!(resolver.resolve("1.2.3.4").await.is_empty());
    }

    #[tokio::test]
    async fn lookups_are_cached() {
        let provider = Arc::new(StaticGeoProvider::new([("1.2.3.4".to_string(), us_geo())]));
        let resolver = GeoResolver::new(Some(provider), 100, Duration::from_secs(60));

        assert_eq!(resolver.resolve("1.2.3.4").await, us_geo());
        // second hit comes from cache; same result either way
        assert_eq!(resolver.resolve("1.2.3.4").await, us_geo());
        assert!(resolver.resolve("9.9.9.9").await.is_empty());
    }
}
