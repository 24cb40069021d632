mod fit;
mod markup;
mod price;
mod service;

pub use fit::select_creative;
pub use markup::build_adm;
pub use price::bid_price;
pub use service::BidService;
