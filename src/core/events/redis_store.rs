use crate::core::errors::{CoreError, CoreResult};
use crate::core::events::store::EventStore;
use crate::core::models::events::{Click, Conversion, Impression, Win};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn day_stamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

fn click_key(id: &str) -> String {
    format!("ev:click:{id}")
}

fn impression_key(id: &str) -> String {
    format!("ev:imp:{id}")
}

fn conversion_key(id: &str) -> String {
    format!("ev:conv:{id}")
}

fn ifa_index_key(ifa: &str) -> String {
    format!("ev:ifa:{ifa}")
}

fn click_conversions_key(click_id: &str) -> String {
    format!("ev:clickconv:{click_id}")
}

fn dedup_key(conversion: &Conversion) -> String {
    format!(
        "ev:convdedup:{}:{}:{}",
        conversion.click_id, conversion.event, conversion.transaction_id
    )
}

fn count_key(record: &str, campaign_id: &str, day: &str) -> String {
    format!("ev:count:{record}:{campaign_id}:{day}")
}

/// Redis-backed event store. Records are JSON values under TTL'd keys;
/// retention is enforced by expiry instead of a sweep. Secondary
/// indexes are plain lists, and the campaign counters are day-bucketed
/// INCRs summed at read time — the aggregation interface carries no
/// latency promise.
pub struct RedisEventStore {
    conn: ConnectionManager,
    click_retention: Duration,
    conversion_retention: Duration,
}

impl RedisEventStore {
    pub async fn connect(
        url: &str,
        click_retention: Duration,
        conversion_retention: Duration,
    ) -> Result<Self, anyhow::Error> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(url, "event store connected");
        Ok(Self {
            conn,
            click_retention,
            conversion_retention,
        })
    }

    fn storage_err(e: impl Into<anyhow::Error>) -> CoreError {
        CoreError::downstream("event_store", e)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await.map_err(Self::storage_err)?;
        match raw {
            Some(raw) => Ok(Some(
                serde_json::from_str(&raw).map_err(Self::storage_err)?,
            )),
            None => Ok(None),
        }
    }

    async fn put_json<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CoreResult<()> {
        let raw = serde_json::to_string(value).map_err(Self::storage_err)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, raw, ttl.as_secs())
            .await
            .map_err(Self::storage_err)
    }

    async fn bump_count(
        &self,
        record: &str,
        campaign_id: &str,
        ts: DateTime<Utc>,
        ttl: Duration,
    ) -> CoreResult<()> {
        if campaign_id.is_empty() {
            return Ok(());
        }
        let key = count_key(record, campaign_id, &day_stamp(ts));
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(&key, 1).await.map_err(Self::storage_err)?;
        if value == 1 {
            conn.expire::<_, ()>(&key, ttl.as_secs() as i64)
                .await
                .map_err(Self::storage_err)?;
        }
        Ok(())
    }

    /// Sums day buckets from `since` to now. Bounded by the retention
    /// window, so the walk never exceeds ~a year of keys.
    async fn sum_counts(
        &self,
        record: &str,
        campaign_id: &str,
        since: DateTime<Utc>,
        retention: Duration,
    ) -> CoreResult<u64> {
        let now = Utc::now();
        let floor = now - ChronoDuration::from_std(retention).unwrap_or(ChronoDuration::days(366));
        let mut day = since.max(floor).date_naive();
        let last = now.date_naive();

        let mut total: u64 = 0;
        let mut conn = self.conn.clone();
        while day <= last {
            let key = count_key(record, campaign_id, &day.format("%Y-%m-%d").to_string());
            let bucket: Option<u64> = conn.get(&key).await.map_err(Self::storage_err)?;
            total += bucket.unwrap_or(0);
            let Some(next) = day.succ_opt() else {
                break;
            };
            day = next;
        }
        Ok(total)
    }
}

#[async_trait]
impl EventStore for RedisEventStore {
    async fn put_click(&self, click: Click) -> CoreResult<()> {
        self.put_json(&click_key(&click.click_id), &click, self.click_retention)
            .await?;

        if !click.device_ifa.is_empty() {
            let mut conn = self.conn.clone();
            conn.rpush::<_, _, ()>(ifa_index_key(&click.device_ifa), &click.click_id)
                .await
                .map_err(Self::storage_err)?;
            conn.expire::<_, ()>(
                ifa_index_key(&click.device_ifa),
                self.click_retention.as_secs() as i64,
            )
            .await
            .map_err(Self::storage_err)?;
        }

        self.bump_count("click", &click.campaign_id, click.ts, self.click_retention)
            .await
    }

    async fn put_impression(&self, impression: Impression) -> CoreResult<()> {
        self.put_json(
            &impression_key(&impression.impression_id),
            &impression,
            self.click_retention,
        )
        .await?;
        self.bump_count(
            "imp",
            &impression.campaign_id,
            impression.ts,
            self.click_retention,
        )
        .await
    }

    async fn put_conversion(&self, conversion: Conversion) -> CoreResult<Arc<Conversion>> {
        if conversion.click_id.is_empty() && conversion.external_id.is_empty() {
            return Err(CoreError::BadRequest(
                "conversion requires a click_id or an external_id".into(),
            ));
        }

        // SET NX decides which writer owns this (click, event, txn)
        let dedup = dedup_key(&conversion);
        let mut conn = self.conn.clone();
        let fresh: bool = conn
            .set_nx(&dedup, &conversion.conversion_id)
            .await
            .map_err(Self::storage_err)?;

        if !fresh {
            let existing_id: Option<String> = conn.get(&dedup).await.map_err(Self::storage_err)?;
            if let Some(id) = existing_id
                && let Some(existing) = self.get_json::<Conversion>(&conversion_key(&id)).await?
            {
                return Ok(Arc::new(existing));
            }
            // the winner's record is gone (expired mid-race); fall
            // through and write ours
        }

        conn.expire::<_, ()>(&dedup, self.conversion_retention.as_secs() as i64)
            .await
            .map_err(Self::storage_err)?;

        self.put_json(
            &conversion_key(&conversion.conversion_id),
            &conversion,
            self.conversion_retention,
        )
        .await?;

        if !conversion.click_id.is_empty() {
            conn.rpush::<_, _, ()>(
                click_conversions_key(&conversion.click_id),
                &conversion.conversion_id,
            )
            .await
            .map_err(Self::storage_err)?;
            conn.expire::<_, ()>(
                click_conversions_key(&conversion.click_id),
                self.conversion_retention.as_secs() as i64,
            )
            .await
            .map_err(Self::storage_err)?;
        }

        self.bump_count(
            "conv",
            &conversion.campaign_id,
            conversion.ts,
            self.conversion_retention,
        )
        .await?;

        Ok(Arc::new(conversion))
    }

    async fn put_win(&self, win: Win) -> CoreResult<()> {
        self.bump_count("win", &win.campaign_id, win.ts, self.click_retention)
            .await
    }

    async fn click(&self, click_id: &str) -> CoreResult<Option<Arc<Click>>> {
        Ok(self.get_json(&click_key(click_id)).await?.map(Arc::new))
    }

    async fn impression(&self, impression_id: &str) -> CoreResult<Option<Arc<Impression>>> {
        Ok(self
            .get_json(&impression_key(impression_id))
            .await?
            .map(Arc::new))
    }

    async fn conversion(&self, conversion_id: &str) -> CoreResult<Option<Arc<Conversion>>> {
        Ok(self
            .get_json(&conversion_key(conversion_id))
            .await?
            .map(Arc::new))
    }

    async fn conversions_for_click(&self, click_id: &str) -> CoreResult<Vec<Arc<Conversion>>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .lrange(click_conversions_key(click_id), 0, -1)
            .await
            .map_err(Self::storage_err)?;

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(conversion) = self.get_json::<Conversion>(&conversion_key(&id)).await? {
                out.push(Arc::new(conversion));
            }
        }
        Ok(out)
    }

    async fn clicks_for_device(
        &self,
        device_ifa: &str,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<Arc<Click>>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .lrange(ifa_index_key(device_ifa), 0, -1)
            .await
            .map_err(Self::storage_err)?;

        let mut out = Vec::new();
        for id in ids {
            if let Some(click) = self.get_json::<Click>(&click_key(&id)).await?
                && click.ts >= since
            {
                out.push(Arc::new(click));
            }
        }
        out.sort_by_key(|c| c.ts);
        Ok(out)
    }

    async fn count_clicks(&self, campaign_id: &str, since: DateTime<Utc>) -> CoreResult<u64> {
        self.sum_counts("click", campaign_id, since, self.click_retention)
            .await
    }

    async fn count_impressions(&self, campaign_id: &str, since: DateTime<Utc>) -> CoreResult<u64> {
        self.sum_counts("imp", campaign_id, since, self.click_retention)
            .await
    }

    async fn count_conversions(&self, campaign_id: &str, since: DateTime<Utc>) -> CoreResult<u64> {
        self.sum_counts("conv", campaign_id, since, self.conversion_retention)
            .await
    }
}
