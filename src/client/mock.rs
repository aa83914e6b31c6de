use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::error::FetchError;
use crate::client::traits::MarketApi;
use crate::filters::request::SearchRequest;
use crate::models::{LocationNode, OptionItem, OptionKind, SearchPage};

/// Scripted in-memory backend for tests.
///
/// Every call is recorded under a key ("regions", "subregions:R1",
/// "options:amenities", "search", ...) so tests can assert how often the
/// network was hit. Failures queued via [`ScriptedApi::fail_next`] are
/// consumed one per call, which lets a test script "fail twice, then serve".
#[derive(Default)]
pub(crate) struct ScriptedApi {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    regions: Vec<LocationNode>,
    subregions: HashMap<String, Vec<LocationNode>>,
    localities: HashMap<String, Vec<LocationNode>>,
    options: HashMap<String, Vec<OptionItem>>,
    search_results: VecDeque<Result<SearchPage, FetchError>>,
    failures: HashMap<String, VecDeque<FetchError>>,
    calls: Vec<String>,
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_regions(self, regions: Vec<LocationNode>) -> Self {
        self.inner.lock().unwrap().regions = regions;
        self
    }

    pub(crate) fn with_subregions(self, region_code: &str, nodes: Vec<LocationNode>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .subregions
            .insert(region_code.to_string(), nodes);
        self
    }

    pub(crate) fn with_localities(self, subregion_code: &str, nodes: Vec<LocationNode>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .localities
            .insert(subregion_code.to_string(), nodes);
        self
    }

    pub(crate) fn with_options(self, kind: OptionKind, items: Vec<OptionItem>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .options
            .insert(kind.as_str().to_string(), items);
        self
    }

    /// Queues an error for the next call matching `key`
    pub(crate) fn fail_next(&self, key: &str, error: FetchError) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .entry(key.to_string())
            .or_default()
            .push_back(error);
    }

    /// Queues the outcome of the next search call
    pub(crate) fn push_search_result(&self, result: Result<SearchPage, FetchError>) {
        self.inner.lock().unwrap().search_results.push_back(result);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub(crate) fn call_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.as_str() == key)
            .count()
    }

    /// Records the call and pops a queued failure for it, if any
    fn record(&self, key: &str) -> Option<FetchError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(key.to_string());
        inner.failures.get_mut(key).and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl MarketApi for ScriptedApi {
    async fn fetch_regions(&self) -> Result<Vec<LocationNode>, FetchError> {
        if let Some(error) = self.record("regions") {
            return Err(error);
        }
        Ok(self.inner.lock().unwrap().regions.clone())
    }

    async fn fetch_subregions(&self, region_code: &str) -> Result<Vec<LocationNode>, FetchError> {
        if let Some(error) = self.record(&format!("subregions:{region_code}")) {
            return Err(error);
        }
        let inner = self.inner.lock().unwrap();
        Ok(inner.subregions.get(region_code).cloned().unwrap_or_default())
    }

    async fn fetch_localities(
        &self,
        subregion_code: &str,
    ) -> Result<Vec<LocationNode>, FetchError> {
        if let Some(error) = self.record(&format!("localities:{subregion_code}")) {
            return Err(error);
        }
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .localities
            .get(subregion_code)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_options(&self, kind: OptionKind) -> Result<Vec<OptionItem>, FetchError> {
        if let Some(error) = self.record(&format!("options:{}", kind.as_str())) {
            return Err(error);
        }
        let inner = self.inner.lock().unwrap();
        Ok(inner.options.get(kind.as_str()).cloned().unwrap_or_default())
    }

    async fn search(&self, _request: &SearchRequest) -> Result<SearchPage, FetchError> {
        if let Some(error) = self.record("search") {
            return Err(error);
        }
        let mut inner = self.inner.lock().unwrap();
        inner
            .search_results
            .pop_front()
            .unwrap_or_else(|| Ok(SearchPage::empty()))
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}
