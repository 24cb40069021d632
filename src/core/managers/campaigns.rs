use crate::core::models::campaign::Campaign;
use crate::core::providers::{Provider, ProviderEvent};
use anyhow::Error;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct CampaignData {
    /// Catalog order preserved; selection determinism depends on it.
    list: Vec<Arc<Campaign>>,
    index: HashMap<String, Arc<Campaign>>,
}

/// Read-mostly campaign repository. Auction threads take cheap Arc
/// snapshots; provider events swap entries under a short write lock.
pub struct CampaignManager {
    data: RwLock<CampaignData>,
}

impl CampaignManager {
    pub async fn start(provider: Arc<dyn Provider<Campaign>>) -> Result<Arc<Self>, Error> {
        let manager = Arc::new(Self {
            data: RwLock::new(CampaignData {
                list: Vec::new(),
                index: HashMap::new(),
            }),
        });

        let mgr = manager.clone();
        let initial = provider
            .start(Box::new(move |event| mgr.handle_event(event)))
            .await?;

        manager.load(initial);
        Ok(manager)
    }

    fn load(&self, campaigns: Vec<Campaign>) {
        let list: Vec<Arc<Campaign>> = campaigns.into_iter().map(Arc::new).collect();
        let index = list
            .iter()
            .map(|c| (c.id.clone(), Arc::clone(c)))
            .collect();

        *self.data.write() = CampaignData { list, index };
    }

    fn handle_event(&self, event: ProviderEvent<Campaign>) {
        let mut data = self.data.write();

        match event {
            ProviderEvent::Added(c) | ProviderEvent::Modified(c) => {
                let campaign = Arc::new(c);
                data.index.insert(campaign.id.clone(), campaign.clone());

                if let Some(pos) = data.list.iter().position(|x| x.id == campaign.id) {
                    data.list[pos] = campaign;
                } else {
                    data.list.push(campaign);
                }
            }
            ProviderEvent::Removed(id) => {
                data.index.remove(&id);
                data.list.retain(|c| c.id != id);
            }
        }
    }

    /// All campaigns in catalog order.
    pub fn campaigns(&self) -> Vec<Arc<Campaign>> {
        self.data.read().list.clone()
    }

    /// Campaigns eligible for auctions, catalog order.
    pub fn active(&self) -> Vec<Arc<Campaign>> {
        self.data
            .read()
            .list
            .iter()
            .filter(|c| c.is_biddable())
            .cloned()
            .collect()
    }

    pub fn get(&self, campaign_id: &str) -> Option<Arc<Campaign>> {
        self.data.read().index.get(campaign_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::campaign::CampaignStatus;
    use crate::core::providers::ConfigCampaignProvider;

    fn campaign(id: &str, status: CampaignStatus) -> Campaign {
        Campaign {
            id: id.into(),
            status,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn active_filters_by_status() {
        let provider = Arc::new(ConfigCampaignProvider::new(vec![
            campaign("c1", CampaignStatus::Active),
            campaign("c2", CampaignStatus::Paused),
            campaign("c3", CampaignStatus::Active),
        ]));

        let mgr = CampaignManager::start(provider).await.unwrap();
        let active: Vec<String> = mgr.active().iter().map(|c| c.id.clone()).collect();
        assert_eq!(active, vec!["c1", "c3"]);
        assert!(mgr.get("c2").is_some());
        assert!(mgr.get("nope").is_none());
    }
}
