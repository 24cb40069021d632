pub mod campaign;
pub mod events;
pub mod pacing;
pub mod source;
pub mod targeting;

pub use campaign::{
    AuditStatus, BidStrategy, Campaign, CampaignStatus, Creative, CreativeFormat, LineItem,
    MmpConfig, PayoutConfig, PayoutType,
};
pub use events::{Click, Conversion, Impression, Win};
pub use pacing::{PacingConfig, PacingShape};
pub use source::{CampaignSource, LinkStatus, PostbackMethod, RtbSource, S2sSource, SourceType};
pub use targeting::{Dayparting, Targeting};
