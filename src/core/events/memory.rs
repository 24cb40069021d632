use crate::core::errors::CoreResult;
use crate::core::events::store::EventStore;
use crate::core::models::events::{Click, Conversion, Impression, Win};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// In-memory event store with the same index shape a persistent
/// backend would expose: point access by id plus `device_ifa ->
/// [click_id]` and `click_id -> [conversion_id]` secondary indexes.
pub struct MemoryEventStore {
    clicks: DashMap<String, Arc<Click>>,
    impressions: DashMap<String, Arc<Impression>>,
    conversions: DashMap<String, Arc<Conversion>>,
    wins: Mutex<Vec<Win>>,
    clicks_by_ifa: DashMap<String, Vec<String>>,
    conversions_by_click: DashMap<String, Vec<String>>,
    /// `(click_id, event, transaction_id)` -> conversion_id.
    conversion_dedup: DashMap<String, String>,
    click_retention: Duration,
    conversion_retention: Duration,
}

fn dedup_key(conversion: &Conversion) -> String {
    format!(
        "{}\u{1f}{}\u{1f}{}",
        conversion.click_id, conversion.event, conversion.transaction_id
    )
}

impl MemoryEventStore {
    pub fn new(click_retention: Duration, conversion_retention: Duration) -> Self {
        Self {
            clicks: DashMap::new(),
            impressions: DashMap::new(),
            conversions: DashMap::new(),
            wins: Mutex::new(Vec::new()),
            clicks_by_ifa: DashMap::new(),
            conversions_by_click: DashMap::new(),
            conversion_dedup: DashMap::new(),
            click_retention,
            conversion_retention,
        }
    }

    /// Drops records older than their retention window and prunes the
    /// affected indexes. Callers schedule this; the store never spawns.
    pub fn sweep(&self, now: DateTime<Utc>) {
        let click_cutoff = now
            - chrono::Duration::from_std(self.click_retention).unwrap_or(chrono::Duration::days(30));
        let conv_cutoff = now
            - chrono::Duration::from_std(self.conversion_retention)
                .unwrap_or(chrono::Duration::days(365));

        self.clicks.retain(|_, c| c.ts >= click_cutoff);
        self.impressions.retain(|_, i| i.ts >= click_cutoff);
        self.conversions.retain(|_, c| c.ts >= conv_cutoff);

        self.clicks_by_ifa.retain(|_, ids| {
            ids.retain(|id| self.clicks.contains_key(id));
            !ids.is_empty()
        });
        self.conversions_by_click.retain(|_, ids| {
            ids.retain(|id| self.conversions.contains_key(id));
            !ids.is_empty()
        });
        self.conversion_dedup
            .retain(|_, id| self.conversions.contains_key(id));
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn put_click(&self, click: Click) -> CoreResult<()> {
        let click = Arc::new(click);
        if !click.device_ifa.is_empty() {
            self.clicks_by_ifa
                .entry(click.device_ifa.clone())
                .or_default()
                .push(click.click_id.clone());
        }
        self.clicks.insert(click.click_id.clone(), click);
        Ok(())
    }

    async fn put_impression(&self, impression: Impression) -> CoreResult<()> {
        self.impressions
            .insert(impression.impression_id.clone(), Arc::new(impression));
        Ok(())
    }

    async fn put_conversion(&self, conversion: Conversion) -> CoreResult<Arc<Conversion>> {
        // a conversion with neither anchor could never be attributed or
        // audited; refuse it loudly instead of storing an orphan
        if conversion.click_id.is_empty() && conversion.external_id.is_empty() {
            return Err(crate::core::errors::CoreError::BadRequest(
                "conversion requires a click_id or an external_id".into(),
            ));
        }

        let key = dedup_key(&conversion);
        if let Some(existing_id) = self.conversion_dedup.get(&key)
            && let Some(existing) = self.conversions.get(existing_id.value())
        {
            return Ok(existing.clone());
        }

        let conversion = Arc::new(conversion);
        self.conversion_dedup
            .insert(key, conversion.conversion_id.clone());
        if !conversion.click_id.is_empty() {
            self.conversions_by_click
                .entry(conversion.click_id.clone())
                .or_default()
                .push(conversion.conversion_id.clone());
        }
        self.conversions
            .insert(conversion.conversion_id.clone(), conversion.clone());
        Ok(conversion)
    }

    async fn put_win(&self, win: Win) -> CoreResult<()> {
        self.wins.lock().push(win);
        Ok(())
    }

    async fn click(&self, click_id: &str) -> CoreResult<Option<Arc<Click>>> {
        Ok(self.clicks.get(click_id).map(|e| e.clone()))
    }

    async fn impression(&self, impression_id: &str) -> CoreResult<Option<Arc<Impression>>> {
        Ok(self.impressions.get(impression_id).map(|e| e.clone()))
    }

    async fn conversion(&self, conversion_id: &str) -> CoreResult<Option<Arc<Conversion>>> {
        Ok(self.conversions.get(conversion_id).map(|e| e.clone()))
    }

    async fn conversions_for_click(&self, click_id: &str) -> CoreResult<Vec<Arc<Conversion>>> {
        Ok(self
            .conversions_by_click
            .get(click_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.conversions.get(id).map(|e| e.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn clicks_for_device(
        &self,
        device_ifa: &str,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<Arc<Click>>> {
        let mut clicks: Vec<Arc<Click>> = self
            .clicks_by_ifa
            .get(device_ifa)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.clicks.get(id).map(|e| e.clone()))
                    .filter(|c| c.ts >= since)
                    .collect()
            })
            .unwrap_or_default();
        clicks.sort_by_key(|c| c.ts);
        Ok(clicks)
    }

    async fn count_clicks(&self, campaign_id: &str, since: DateTime<Utc>) -> CoreResult<u64> {
        Ok(self
            .clicks
            .iter()
            .filter(|e| e.campaign_id == campaign_id && e.ts >= since)
            .count() as u64)
    }

    async fn count_impressions(&self, campaign_id: &str, since: DateTime<Utc>) -> CoreResult<u64> {
        Ok(self
            .impressions
            .iter()
            .filter(|e| e.campaign_id == campaign_id && e.ts >= since)
            .count() as u64)
    }

    async fn count_conversions(&self, campaign_id: &str, since: DateTime<Utc>) -> CoreResult<u64> {
        Ok(self
            .conversions
            .iter()
            .filter(|e| e.campaign_id == campaign_id && e.ts >= since)
            .count() as u64)
    }
}
