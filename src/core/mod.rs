pub mod bidding;
pub mod currency;
pub mod enrichment;
pub mod errors;
pub mod events;
pub mod geo;
pub mod managers;
pub mod models;
pub mod openrtb;
pub mod outbound;
pub mod pacing;
pub mod postback;
pub mod providers;
pub mod s2s;
pub mod targeting;
pub mod tracking;
