use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{listing_freshness, ResultCache};
use crate::cascade::{LocationCascade, LocationSelection};
use crate::client::error::FetchError;
use crate::client::retry::RetryPolicy;
use crate::client::traits::MarketApi;
use crate::filters::request::{SearchRequest, DEFAULT_PAGE_SIZE};
use crate::filters::state::{FilterGroup, FilterState};
use crate::models::{Listing, OptionCatalog, OptionItem, OptionKind, RoomType, SearchPage, SortKey};
use crate::store::{get_json, set_json, KeyValueStore};

const PENDING_SEARCH_KEY: &str = "pending-search";

fn scope_name(room_type: Option<RoomType>) -> &'static str {
    room_type.map(|t| t.as_str()).unwrap_or("all")
}

fn snapshot_key(room_type: Option<RoomType>) -> String {
    format!("filters:{}", scope_name(room_type))
}

fn results_key(room_type: Option<RoomType>) -> String {
    format!("results:{}", scope_name(room_type))
}

fn options_key(kind: OptionKind) -> String {
    format!("options:{}", kind.as_str())
}

/// Everything worth restoring in a later session: filter fields, location
/// codes and the sort order
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterSnapshot {
    filters: FilterState,
    location: LocationSelection,
    sort: SortKey,
}

/// Last served page together with the request signature it answers and the
/// time it was fetched, so a restore can re-prime the cache under the right
/// key at its real age
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPage {
    signature: String,
    page: SearchPage,
    stored_at: DateTime<Utc>,
}

/// A built request tagged with its issue order. Applying a result for a
/// sequence that is no longer the latest is rejected, so a slow early search
/// can never overwrite a fast later one.
#[derive(Debug, Clone)]
pub struct PreparedSearch {
    pub request: SearchRequest,
    pub sequence: u64,
}

/// Orchestrates filters, location cascade, reference data, caching and
/// persistence behind one mutable facade.
///
/// Single-consumer by construction: methods take `&mut self` and suspend only
/// at network awaits, so state transitions never interleave. One engine serves
/// one room-type scope (or the type-agnostic "all" scope); snapshots and
/// stored pages are keyed per scope.
pub struct SearchEngine {
    api: Arc<dyn MarketApi>,
    cache: Arc<ResultCache>,
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
    cascade: LocationCascade,
    filters: FilterState,
    catalog: OptionCatalog,
    room_type: Option<RoomType>,
    page: u32,
    page_size: u32,
    sort: SortKey,
    latest_issued: u64,
    current: Option<SearchPage>,
    last_error: Option<FetchError>,
}

impl SearchEngine {
    pub fn new(api: Arc<dyn MarketApi>, store: Arc<dyn KeyValueStore>) -> Self {
        let cache = Arc::new(ResultCache::new());
        let cascade = LocationCascade::new(api.clone(), cache.clone());
        Self {
            api,
            cache,
            store,
            retry: RetryPolicy::default(),
            cascade,
            filters: FilterState::new(),
            catalog: OptionCatalog::default(),
            room_type: None,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortKey::default(),
            latest_issued: 0,
            current: None,
            last_error: None,
        }
    }

    /// Narrows the engine to one listing category; persistence keys and every
    /// outgoing request carry the scope
    pub fn with_scope(mut self, room_type: RoomType) -> Self {
        self.room_type = Some(room_type);
        self
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn catalog(&self) -> &OptionCatalog {
        &self.catalog
    }

    pub fn cascade(&self) -> &LocationCascade {
        &self.cascade
    }

    pub fn current(&self) -> Option<&SearchPage> {
        self.current.as_ref()
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn room_type(&self) -> Option<RoomType> {
        self.room_type
    }

    #[cfg(test)]
    pub(crate) fn result_cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn set_free_text(&mut self, query: &str) {
        self.filters.set_free_text(query);
        self.persist_snapshot();
    }

    /// Flips one id in a set-valued group; returns whether it is now selected
    pub fn toggle(&mut self, group: FilterGroup, id: &str) -> bool {
        let selected = self.filters.toggle(group, id);
        self.persist_snapshot();
        selected
    }

    pub fn set_price_bucket(&mut self, key: &str) {
        self.filters.set_price_bucket(key);
        self.persist_snapshot();
    }

    pub fn set_price_range(&mut self, min: Option<u64>, max: Option<u64>) {
        self.filters.set_price_range(min, max);
        self.persist_snapshot();
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
        self.persist_snapshot();
    }

    /// Pagination is navigation, not filter state, so it is not persisted
    pub fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    pub async fn load_regions(&mut self) {
        self.cascade.load_regions().await;
    }

    pub async fn select_region(&mut self, code: Option<&str>) {
        self.cascade.select_region(code).await;
        self.persist_snapshot();
    }

    pub async fn select_subregion(&mut self, code: Option<&str>) {
        self.cascade.select_subregion(code).await;
        self.persist_snapshot();
    }

    pub fn select_locality(&mut self, code: Option<&str>) {
        self.cascade.select_locality(code);
        self.persist_snapshot();
    }

    /// Loads the three reference-data lists, each preferring memory cache,
    /// then the store snapshot, then the network (with write-back to both)
    pub async fn load_reference_data(&mut self) {
        for kind in OptionKind::ALL {
            self.load_options(kind).await;
        }
    }

    async fn load_options(&mut self, kind: OptionKind) {
        let key = options_key(kind);
        if let Some(cached) = self.cache.get::<Vec<OptionItem>>(&key) {
            self.catalog.set_list(kind, cached.value);
            return;
        }
        if let Some(stored) = get_json::<Vec<OptionItem>>(self.store.as_ref(), &key) {
            debug!("loaded {} from the store", kind.as_str());
            self.cache.set(&key, &stored);
            self.catalog.set_list(kind, stored);
            return;
        }

        info!("loading {} from {}", kind.as_str(), self.api.source_name());
        let fetched = {
            let api = &self.api;
            self.retry.run(|| api.fetch_options(kind)).await
        };
        match fetched {
            Ok(items) => {
                self.cache.set(&key, &items);
                set_json(self.store.as_ref(), &key, &items);
                self.catalog.set_list(kind, items);
            }
            Err(e) => {
                warn!("failed to load {}: {e}", kind.as_str());
                self.last_error = Some(e);
            }
        }
    }

    /// Server-ready request for the current state. Pure: calling it never
    /// mutates the engine.
    pub fn build_request(&self, room_type_override: Option<RoomType>) -> SearchRequest {
        SearchRequest::from_state(
            &self.filters,
            &self.cascade.resolved_names(),
            &self.catalog,
            self.page,
            self.page_size,
            self.sort,
            room_type_override.or(self.room_type),
        )
    }

    /// Builds a request and stamps it with the next sequence number
    pub fn prepare_search(&mut self, room_type_override: Option<RoomType>) -> PreparedSearch {
        self.latest_issued += 1;
        PreparedSearch {
            request: self.build_request(room_type_override),
            sequence: self.latest_issued,
        }
    }

    /// Applies a completed search. Returns false when the result belonged to a
    /// superseded sequence and was discarded.
    pub fn apply_result(
        &mut self,
        prepared: &PreparedSearch,
        outcome: Result<SearchPage, FetchError>,
    ) -> bool {
        if prepared.sequence != self.latest_issued {
            debug!(
                "discarding result of superseded search #{} (latest is #{})",
                prepared.sequence, self.latest_issued
            );
            return false;
        }

        match outcome {
            Ok(page) => {
                set_json(
                    self.store.as_ref(),
                    &results_key(self.room_type),
                    &StoredPage {
                        signature: prepared.request.signature(),
                        page: page.clone(),
                        stored_at: Utc::now(),
                    },
                );
                self.current = Some(page);
                self.last_error = None;
            }
            Err(e) => {
                warn!("search failed: {e}");
                self.last_error = Some(e);
            }
        }
        true
    }

    /// Runs a search for the current state: cache within the listing freshness
    /// window first, otherwise the network through the retry wrapper
    pub async fn search(&mut self) -> Result<SearchPage, FetchError> {
        let prepared = self.prepare_search(None);
        let signature = prepared.request.signature();

        if let Some(page) = self.cache.fresh::<SearchPage>(&signature, listing_freshness()) {
            debug!("serving search #{} from cache", prepared.sequence);
            let outcome = Ok(page);
            self.apply_result(&prepared, outcome.clone());
            return outcome;
        }

        info!("searching {} (#{})", self.api.source_name(), prepared.sequence);
        let outcome = {
            let api = &self.api;
            let request = &prepared.request;
            self.retry.run(|| api.search(request)).await
        };
        if let Ok(page) = &outcome {
            self.cache.set(&signature, page);
        }
        self.apply_result(&prepared, outcome.clone());
        outcome
    }

    /// Instant client-side narrowing of the loaded page while the server
    /// search is pending
    pub fn quick_filter(&self) -> Vec<Listing> {
        self.current
            .as_ref()
            .map(|page| {
                page.items
                    .iter()
                    .filter(|listing| self.filters.quick_matches(listing))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Back to a blank slate: defaults everywhere, persisted snapshot and
    /// stored page removed, result cache emptied
    pub fn reset_all(&mut self) {
        self.filters.clear();
        self.cascade.reset();
        self.page = 0;
        self.sort = SortKey::default();
        self.current = None;
        self.last_error = None;
        self.store.remove(&snapshot_key(self.room_type));
        self.store.remove(&results_key(self.room_type));
        self.cache.invalidate_all();
    }

    /// Reapplies the persisted snapshot and stored page for this scope.
    /// Location codes come back without their option lists; names resolve
    /// again once the lists load.
    pub fn restore(&mut self) {
        if let Some(snapshot) =
            get_json::<FilterSnapshot>(self.store.as_ref(), &snapshot_key(self.room_type))
        {
            info!("restored filter snapshot for scope {}", scope_name(self.room_type));
            self.filters = snapshot.filters;
            self.sort = snapshot.sort;
            self.cascade.restore_selection(snapshot.location);
        }
        if let Some(stored) =
            get_json::<StoredPage>(self.store.as_ref(), &results_key(self.room_type))
        {
            self.cache
                .set_stamped(&stored.signature, &stored.page, stored.stored_at);
            self.current = Some(stored.page);
        }
    }

    /// Saves a request for another surface to run after navigation
    pub fn stash_pending(&self, request: &SearchRequest) {
        set_json(self.store.as_ref(), PENDING_SEARCH_KEY, request);
    }

    /// Takes the stashed request; consumed on read
    pub fn take_pending(&self) -> Option<SearchRequest> {
        let pending = get_json::<SearchRequest>(self.store.as_ref(), PENDING_SEARCH_KEY);
        if pending.is_some() {
            self.store.remove(PENDING_SEARCH_KEY);
        }
        pending
    }

    fn persist_snapshot(&self) {
        let snapshot = FilterSnapshot {
            filters: self.filters.clone(),
            location: self.cascade.selection().clone(),
            sort: self.sort,
        };
        set_json(self.store.as_ref(), &snapshot_key(self.room_type), &snapshot);
    }
}
