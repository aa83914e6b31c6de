pub mod cache;
pub mod cascade;
pub mod client;
pub mod config;
pub mod engine;
pub mod filters;
pub mod geo;
pub mod models;
pub mod store;

pub use cache::{listing_freshness, Cached, ResultCache};
pub use cascade::{LocationCascade, LocationSelection};
pub use client::{FetchError, MarketApi, RestMarketApi, RetryPolicy};
pub use config::Config;
pub use engine::{PreparedSearch, SearchEngine};
pub use filters::{
    parse_area_bucket, parse_price_bucket, FilterGroup, FilterState, PriceFilter, SearchRequest,
    DEFAULT_PAGE_SIZE,
};
pub use geo::{city_default, BackendGeocoder, GeocodeSource, Geocoder, OsmGeocoder};
pub use models::{
    GeoFix, GeoPoint, GeoTier, Listing, LocationNode, LocationTier, OptionCatalog, OptionItem,
    OptionKind, ResolvedLocation, RoomType, SearchPage, SortKey,
};
pub use store::{get_json, set_json, JsonFileStore, KeyValueStore, MemoryStore};
