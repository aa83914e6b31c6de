use async_trait::async_trait;

use crate::client::error::FetchError;
use crate::filters::request::SearchRequest;
use crate::models::{LocationNode, OptionItem, OptionKind, SearchPage};

/// Common trait for marketplace backends
/// This keeps the cascade and the engine testable against scripted data and
/// allows swapping the REST implementation out in integrations
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// Top-level region list
    async fn fetch_regions(&self) -> Result<Vec<LocationNode>, FetchError>;

    /// Subregions belonging to one region
    async fn fetch_subregions(&self, region_code: &str) -> Result<Vec<LocationNode>, FetchError>;

    /// Localities belonging to one subregion
    async fn fetch_localities(
        &self,
        subregion_code: &str,
    ) -> Result<Vec<LocationNode>, FetchError>;

    /// One reference-data list (amenities, audiences, environments)
    async fn fetch_options(&self, kind: OptionKind) -> Result<Vec<OptionItem>, FetchError>;

    /// Paginated listing search
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, FetchError>;

    /// Get the name of the backend source
    fn source_name(&self) -> &'static str;
}
