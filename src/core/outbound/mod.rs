mod client;

pub use client::OutboundClient;
