pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod optimizer;
pub mod realized;

pub use data::{log_returns, PriceBar, PriceSeries, ReturnBar};
pub use error::{GarchError, Result};
pub use models::*;
pub use realized::RealizedEstimator;
