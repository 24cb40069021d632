mod config_catalog;
mod provider;

pub use config_catalog::{
    ConfigCampaignProvider, ConfigLinkProvider, ConfigSourceProvider, SourcesConfig,
};
pub use provider::*;
