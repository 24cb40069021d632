use crate::core::models::campaign::Campaign;
use crate::core::models::source::{CampaignSource, RtbSource, S2sSource};
use crate::core::providers::{Provider, ProviderEvent};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Source descriptors as they appear under `sources:` in the config file.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub s2s: Vec<S2sSource>,
    pub rtb: Vec<RtbSource>,
}

/// Campaign catalog provider backed by the loaded config file. Static
/// after the initial hand-off; the event callback is kept so a file
/// watcher can be added without touching the managers.
pub struct ConfigCampaignProvider {
    campaigns: Mutex<Vec<Campaign>>,
}

impl ConfigCampaignProvider {
    pub fn new(campaigns: Vec<Campaign>) -> Self {
        Self {
            campaigns: Mutex::new(campaigns),
        }
    }
}

#[async_trait]
impl Provider<Campaign> for ConfigCampaignProvider {
    async fn start(
        &self,
        _on_event: Box<dyn Fn(ProviderEvent<Campaign>) + Send + Sync>,
    ) -> Result<Vec<Campaign>, anyhow::Error> {
        Ok(std::mem::take(&mut *self.campaigns.lock()))
    }
}

pub struct ConfigSourceProvider {
    sources: Mutex<SourcesConfig>,
}

impl ConfigSourceProvider {
    pub fn new(sources: SourcesConfig) -> Self {
        Self {
            sources: Mutex::new(sources),
        }
    }
}

#[async_trait]
impl Provider<SourcesConfig> for ConfigSourceProvider {
    async fn start(
        &self,
        _on_event: Box<dyn Fn(ProviderEvent<SourcesConfig>) + Send + Sync>,
    ) -> Result<Vec<SourcesConfig>, anyhow::Error> {
        Ok(vec![std::mem::take(&mut *self.sources.lock())])
    }
}

pub struct ConfigLinkProvider {
    links: Mutex<Vec<CampaignSource>>,
}

impl ConfigLinkProvider {
    pub fn new(links: Vec<CampaignSource>) -> Self {
        Self {
            links: Mutex::new(links),
        }
    }
}

#[async_trait]
impl Provider<CampaignSource> for ConfigLinkProvider {
    async fn start(
        &self,
        _on_event: Box<dyn Fn(ProviderEvent<CampaignSource>) + Send + Sync>,
    ) -> Result<Vec<CampaignSource>, anyhow::Error> {
        Ok(std::mem::take(&mut *self.links.lock()))
    }
}
