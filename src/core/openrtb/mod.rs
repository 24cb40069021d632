//! OpenRTB 2.5 wire model, reduced to the subset this DSP consumes
//! and produces. Field names follow the spec exactly so serde maps
//! 1:1 onto exchange payloads.

pub mod request;
pub mod response;

pub use request::{App, Banner, BidRequest, Device, Format, Geo, Imp, Site, User};
pub use response::{Bid, BidResponse, SeatBid};
