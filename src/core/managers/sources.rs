use crate::core::models::source::{CampaignSource, RtbSource, S2sSource, SourceType};
use crate::core::providers::{Provider, SourcesConfig};
use anyhow::Error;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct SourceData {
    s2s_by_id: HashMap<String, Arc<S2sSource>>,
    s2s_by_slug: HashMap<String, Arc<S2sSource>>,
    rtb_by_id: HashMap<String, Arc<RtbSource>>,
    rtb_by_slug: HashMap<String, Arc<RtbSource>>,
    /// source id -> links, insertion order kept for deterministic walks.
    links_by_source: HashMap<String, Vec<Arc<CampaignSource>>>,
}

/// Supply-side repository: S2S partners, RTB exchanges and the
/// campaign↔source links. Lookups run on lock-free snapshots.
pub struct SourceManager {
    data: ArcSwap<SourceData>,
}

impl SourceManager {
    pub async fn start(
        source_provider: Arc<dyn Provider<SourcesConfig>>,
        link_provider: Arc<dyn Provider<CampaignSource>>,
    ) -> Result<Arc<Self>, Error> {
        let sources = source_provider
            .start(Box::new(|_| {}))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();
        let links = link_provider.start(Box::new(|_| {})).await?;

        let mut data = SourceData::default();

        for s in sources.s2s {
            let s = Arc::new(s);
            data.s2s_by_slug.insert(s.slug.clone(), s.clone());
            data.s2s_by_id.insert(s.id.clone(), s);
        }
        for r in sources.rtb {
            let r = Arc::new(r);
            data.rtb_by_slug.insert(r.slug.clone(), r.clone());
            data.rtb_by_id.insert(r.id.clone(), r);
        }
        for link in links {
            let link = Arc::new(link);
            data.links_by_source
                .entry(link.source_id.clone())
                .or_default()
                .push(link);
        }

        Ok(Arc::new(Self {
            data: ArcSwap::from_pointee(data),
        }))
    }

    pub fn s2s(&self, id: &str) -> Option<Arc<S2sSource>> {
        self.data.load().s2s_by_id.get(id).cloned()
    }

    pub fn s2s_by_slug(&self, slug: &str) -> Option<Arc<S2sSource>> {
        self.data.load().s2s_by_slug.get(slug).cloned()
    }

    pub fn rtb(&self, id: &str) -> Option<Arc<RtbSource>> {
        self.data.load().rtb_by_id.get(id).cloned()
    }

    pub fn rtb_by_slug(&self, slug: &str) -> Option<Arc<RtbSource>> {
        self.data.load().rtb_by_slug.get(slug).cloned()
    }

    pub fn rtb_all(&self) -> Vec<Arc<RtbSource>> {
        self.data.load().rtb_by_id.values().cloned().collect()
    }

    /// Links for one source, filtered to the given type.
    pub fn links_for(&self, source_type: SourceType, source_id: &str) -> Vec<Arc<CampaignSource>> {
        self.data
            .load()
            .links_by_source
            .get(source_id)
            .map(|links| {
                links
                    .iter()
                    .filter(|l| l.source_type == source_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::providers::{ConfigLinkProvider, ConfigSourceProvider};

    #[tokio::test]
    async fn slug_and_link_lookups() {
        let sources = SourcesConfig {
            s2s: vec![S2sSource {
                id: "s1".into(),
                slug: "acme".into(),
                ..Default::default()
            }],
            rtb: vec![RtbSource {
                id: "x1".into(),
                slug: "exchange-a".into(),
                ..Default::default()
            }],
        };
        let links = vec![
            CampaignSource {
                campaign_id: "c1".into(),
                source_type: SourceType::S2s,
                source_id: "s1".into(),
                ..Default::default()
            },
            CampaignSource {
                campaign_id: "c2".into(),
                source_type: SourceType::S2s,
                source_id: "s1".into(),
                ..Default::default()
            },
        ];

        let mgr = SourceManager::start(
            Arc::new(ConfigSourceProvider::new(sources)),
            Arc::new(ConfigLinkProvider::new(links)),
        )
        .await
        .unwrap();

        assert!(mgr.s2s_by_slug("acme").is_some());
        assert!(mgr.rtb_by_slug("exchange-a").is_some());
        assert!(mgr.s2s_by_slug("nope").is_none());

        let links = mgr.links_for(SourceType::S2s, "s1");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].campaign_id, "c1");
    }
}
