pub mod request;
pub mod state;

pub use request::{SearchRequest, DEFAULT_PAGE_SIZE};
pub use state::{parse_area_bucket, parse_price_bucket, FilterGroup, FilterState, PriceFilter};
