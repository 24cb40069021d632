use crate::core::errors::CoreResult;
use crate::core::models::events::{Click, Conversion, Impression, Win};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Append-only event persistence. Records are never mutated once
/// written; readers get shared references, never exclusive ones.
///
/// The aggregation methods are a mandatory interface with no
/// performance contract — reporting runs elsewhere; they exist so
/// link caps and spot checks have something to ask.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn put_click(&self, click: Click) -> CoreResult<()>;

    async fn put_impression(&self, impression: Impression) -> CoreResult<()>;

    /// Writes a conversion, deduplicating on
    /// `(click_id, event, transaction_id)`: a duplicate write returns
    /// the previously stored record instead of appending a second one.
    async fn put_conversion(&self, conversion: Conversion) -> CoreResult<Arc<Conversion>>;

    async fn put_win(&self, win: Win) -> CoreResult<()>;

    async fn click(&self, click_id: &str) -> CoreResult<Option<Arc<Click>>>;

    async fn impression(&self, impression_id: &str) -> CoreResult<Option<Arc<Impression>>>;

    async fn conversion(&self, conversion_id: &str) -> CoreResult<Option<Arc<Conversion>>>;

    async fn conversions_for_click(&self, click_id: &str) -> CoreResult<Vec<Arc<Conversion>>>;

    /// Clicks for one advertising id at or after `since`, oldest first.
    async fn clicks_for_device(
        &self,
        device_ifa: &str,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<Arc<Click>>>;

    async fn count_clicks(&self, campaign_id: &str, since: DateTime<Utc>) -> CoreResult<u64>;

    async fn count_impressions(&self, campaign_id: &str, since: DateTime<Utc>) -> CoreResult<u64>;

    async fn count_conversions(&self, campaign_id: &str, since: DateTime<Utc>) -> CoreResult<u64>;
}
