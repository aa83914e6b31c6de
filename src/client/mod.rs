pub mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod rest;
pub mod retry;
pub mod traits;

pub use error::FetchError;
pub use rest::RestMarketApi;
pub use retry::RetryPolicy;
pub use traits::MarketApi;
