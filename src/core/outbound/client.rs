use crate::core::models::source::PostbackMethod;
use anyhow::anyhow;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Shared HTTP client for partner side effects: MMP view pings and S2S
/// conversion postbacks. One pooled client for the process; redirects
/// are never followed and response bodies are discarded unread.
///
/// Fire-and-forget sends run on the runtime behind a semaphore so a
/// slow partner cannot pile up unbounded tasks; when the pool is
/// saturated the ping is dropped and counted, never queued.
pub struct OutboundClient {
    client: reqwest::Client,
    inflight: Arc<Semaphore>,
}

impl OutboundClient {
    pub fn new(max_inflight: usize) -> Result<Self, anyhow::Error> {
        let client = reqwest::ClientBuilder::new()
            .user_agent("kite-dsp")
            .connect_timeout(Duration::from_secs(2))
            .pool_max_idle_per_host(64)
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .tcp_keepalive(Some(Duration::from_secs(20)))
            .redirect(reqwest::redirect::Policy::none())
            .tcp_nodelay(true)
            .gzip(true)
            .deflate(true)
            .build()?;

        Ok(Self {
            client,
            inflight: Arc::new(Semaphore::new(max_inflight)),
        })
    }

    /// Sends one request and reports only success/failure. Non-2xx is an
    /// error to the caller's metrics, not a retry trigger — partners
    /// re-send on their side if they care.
    pub async fn send(
        &self,
        method: PostbackMethod,
        url: &str,
        timeout: Duration,
    ) -> Result<(), anyhow::Error> {
        let req = match method {
            PostbackMethod::Get => self.client.get(url),
            PostbackMethod::Post => self.client.post(url),
        };

        let res = req.timeout(timeout).send().await?;
        let status = res.status();
        // drain so the connection returns to the pool
        let _ = res.bytes().await;

        if !status.is_success() {
            return Err(anyhow!("partner answered {status}"));
        }
        Ok(())
    }

    /// Detached best-effort GET/POST. Never blocks the caller and never
    /// feeds back into a response.
    pub fn fire_and_forget(
        self: &Arc<Self>,
        kind: &'static str,
        method: PostbackMethod,
        url: String,
        timeout: Duration,
    ) {
        let Ok(permit) = self.inflight.clone().try_acquire_owned() else {
            warn!(kind, "outbound pool saturated, dropping call");
            counter!("outbound.dropped", "kind" => kind).increment(1);
            return;
        };

        let client = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match client.send(method, &url, timeout).await {
                Ok(()) => {
                    debug!(kind, %url, "outbound call delivered");
                    counter!("outbound.sent", "kind" => kind).increment(1);
                }
                Err(e) => {
                    warn!(kind, %url, error = %e, "outbound call failed");
                    counter!("outbound.failed", "kind" => kind).increment(1);
                }
            }
        });
    }
}
