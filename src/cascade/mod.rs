use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::client::error::FetchError;
use crate::client::retry::RetryPolicy;
use crate::client::traits::MarketApi;
use crate::models::{LocationNode, LocationTier, ResolvedLocation};

const REGIONS_KEY: &str = "cascade:regions";

fn subregions_key(region_code: &str) -> String {
    format!("cascade:subregions:{region_code}")
}

fn localities_key(subregion_code: &str) -> String {
    format!("cascade:localities:{subregion_code}")
}

/// Selected codes for the three address tiers, persisted as part of the
/// filter snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationSelection {
    pub region_code: Option<String>,
    pub subregion_code: Option<String>,
    pub locality_code: Option<String>,
}

/// Three-level dependent location selection.
///
/// Selecting a parent tier clears every descendant selection and option list
/// before the new child list is fetched, so no stale locality can leak into a
/// request built mid-load. Fetches are cache-first (keyed by geographic code,
/// no TTL) and go through the retry wrapper; a terminal failure parks an error
/// on the affected tier and leaves whatever list was already visible alone.
pub struct LocationCascade {
    api: Arc<dyn MarketApi>,
    cache: Arc<ResultCache>,
    retry: RetryPolicy,
    regions: Vec<LocationNode>,
    subregions: Vec<LocationNode>,
    localities: Vec<LocationNode>,
    selection: LocationSelection,
    region_error: Option<FetchError>,
    subregion_error: Option<FetchError>,
    locality_error: Option<FetchError>,
}

impl LocationCascade {
    pub fn new(api: Arc<dyn MarketApi>, cache: Arc<ResultCache>) -> Self {
        Self {
            api,
            cache,
            retry: RetryPolicy::default(),
            regions: Vec::new(),
            subregions: Vec::new(),
            localities: Vec::new(),
            selection: LocationSelection::default(),
            region_error: None,
            subregion_error: None,
            locality_error: None,
        }
    }

    pub fn regions(&self) -> &[LocationNode] {
        &self.regions
    }

    pub fn subregions(&self) -> &[LocationNode] {
        &self.subregions
    }

    pub fn localities(&self) -> &[LocationNode] {
        &self.localities
    }

    pub fn selection(&self) -> &LocationSelection {
        &self.selection
    }

    /// Terminal fetch failure for one tier, if any. Cleared by the next
    /// selection change or successful load on that tier.
    pub fn tier_error(&self, tier: LocationTier) -> Option<&FetchError> {
        match tier {
            LocationTier::Region => self.region_error.as_ref(),
            LocationTier::Subregion => self.subregion_error.as_ref(),
            LocationTier::Locality => self.locality_error.as_ref(),
        }
    }

    /// Loads the top-level region list, serving a cached copy when present
    pub async fn load_regions(&mut self) {
        if let Some(cached) = self.cache.get::<Vec<LocationNode>>(REGIONS_KEY) {
            debug!("using cached region list");
            self.regions = cached.value;
            self.region_error = None;
            return;
        }

        info!("loading regions from {}", self.api.source_name());
        let fetched = {
            let api = &self.api;
            self.retry.run(|| api.fetch_regions()).await
        };
        match fetched {
            Ok(nodes) => {
                self.cache.set(REGIONS_KEY, &nodes);
                self.regions = nodes;
                self.region_error = None;
            }
            Err(e) => {
                warn!("failed to load regions: {e}");
                self.region_error = Some(e);
            }
        }
    }

    /// Selects a region and loads its subregions.
    ///
    /// `None` (or a blank code) clears the whole selection without fetching.
    /// Reselecting the current code is a no-op while its child list is cached;
    /// if the earlier fetch failed there is nothing cached, so it runs again.
    pub async fn select_region(&mut self, code: Option<&str>) {
        let code = normalize(code);
        let Some(code) = code else {
            self.selection = LocationSelection::default();
            self.clear_subregions();
            self.clear_localities();
            return;
        };

        if self.selection.region_code.as_deref() == Some(code)
            && self.cache.contains(&subregions_key(code))
        {
            debug!("region {code} already selected");
            return;
        }

        self.selection.region_code = Some(code.to_string());
        self.selection.subregion_code = None;
        self.selection.locality_code = None;
        self.clear_subregions();
        self.clear_localities();
        self.load_subregions(code).await;
    }

    /// Selects a subregion and loads its localities; `None` clears the
    /// subregion and locality tiers
    pub async fn select_subregion(&mut self, code: Option<&str>) {
        let code = normalize(code);
        let Some(code) = code else {
            self.selection.subregion_code = None;
            self.selection.locality_code = None;
            self.clear_localities();
            return;
        };

        if self.selection.subregion_code.as_deref() == Some(code)
            && self.cache.contains(&localities_key(code))
        {
            debug!("subregion {code} already selected");
            return;
        }

        self.selection.subregion_code = Some(code.to_string());
        self.selection.locality_code = None;
        self.clear_localities();
        self.load_localities(code).await;
    }

    /// Leaf selection; nothing depends on it, so there is nothing to fetch
    pub fn select_locality(&mut self, code: Option<&str>) {
        self.selection.locality_code = normalize(code).map(str::to_string);
    }

    /// Clears all selections, lists and tier errors
    pub fn reset(&mut self) {
        self.selection = LocationSelection::default();
        self.regions.clear();
        self.region_error = None;
        self.clear_subregions();
        self.clear_localities();
    }

    /// Reapplies persisted codes without fetching. Names resolve once the
    /// option lists are loaded again.
    pub fn restore_selection(&mut self, selection: LocationSelection) {
        self.selection = selection;
    }

    /// Human-readable names for the current selection, looked up in the loaded
    /// lists; a tier whose name cannot be resolved yields `None`
    pub fn resolved_names(&self) -> ResolvedLocation {
        ResolvedLocation {
            region: name_of(&self.regions, self.selection.region_code.as_deref()),
            subregion: name_of(&self.subregions, self.selection.subregion_code.as_deref()),
            locality: name_of(&self.localities, self.selection.locality_code.as_deref()),
        }
    }

    async fn load_subregions(&mut self, region_code: &str) {
        let key = subregions_key(region_code);
        if let Some(cached) = self.cache.get::<Vec<LocationNode>>(&key) {
            debug!("using cached subregions for {region_code}");
            self.subregions = cached.value;
            return;
        }

        info!("loading subregions of {region_code}");
        let fetched = {
            let api = &self.api;
            self.retry.run(|| api.fetch_subregions(region_code)).await
        };
        match fetched {
            Ok(nodes) => {
                self.cache.set(&key, &nodes);
                self.subregions = nodes;
                self.subregion_error = None;
            }
            Err(e) => {
                warn!("failed to load subregions of {region_code}: {e}");
                self.subregion_error = Some(e);
            }
        }
    }

    async fn load_localities(&mut self, subregion_code: &str) {
        let key = localities_key(subregion_code);
        if let Some(cached) = self.cache.get::<Vec<LocationNode>>(&key) {
            debug!("using cached localities for {subregion_code}");
            self.localities = cached.value;
            return;
        }

        info!("loading localities of {subregion_code}");
        let fetched = {
            let api = &self.api;
            self.retry.run(|| api.fetch_localities(subregion_code)).await
        };
        match fetched {
            Ok(nodes) => {
                self.cache.set(&key, &nodes);
                self.localities = nodes;
                self.locality_error = None;
            }
            Err(e) => {
                warn!("failed to load localities of {subregion_code}: {e}");
                self.locality_error = Some(e);
            }
        }
    }

    fn clear_subregions(&mut self) {
        self.subregions.clear();
        self.subregion_error = None;
    }

    fn clear_localities(&mut self) {
        self.localities.clear();
        self.locality_error = None;
    }
}

fn normalize(code: Option<&str>) -> Option<&str> {
    code.map(str::trim).filter(|code| !code.is_empty())
}

fn name_of(nodes: &[LocationNode], code: Option<&str>) -> Option<String> {
    let code = code?;
    nodes
        .iter()
        .find(|node| node.code == code)
        .map(|node| node.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::ScriptedApi;

    fn node(code: &str, name: &str, parent: Option<&str>) -> LocationNode {
        LocationNode::new(code, name, parent)
    }

    fn scripted() -> ScriptedApi {
        ScriptedApi::new()
            .with_regions(vec![node("R1", "Hà Nội", None), node("R2", "Đà Nẵng", None)])
            .with_subregions(
                "R1",
                vec![
                    node("S1", "Ba Đình", Some("R1")),
                    node("S2", "Hoàn Kiếm", Some("R1")),
                ],
            )
            .with_subregions("R2", vec![node("S9", "Hải Châu", Some("R2"))])
            .with_localities("S1", vec![node("L1", "Phúc Xá", Some("S1"))])
    }

    fn fixture() -> (Arc<ScriptedApi>, Arc<ResultCache>, LocationCascade) {
        let api = Arc::new(scripted());
        let cache = Arc::new(ResultCache::new());
        let cascade = LocationCascade::new(api.clone(), cache.clone());
        (api, cache, cascade)
    }

    #[tokio::test]
    async fn test_region_change_clears_descendants_before_fetch() {
        let (_, _, mut cascade) = fixture();
        cascade.load_regions().await;
        cascade.select_region(Some("R1")).await;
        cascade.select_subregion(Some("S1")).await;
        cascade.select_locality(Some("L1"));
        assert_eq!(cascade.localities().len(), 1);

        cascade.select_region(Some("R2")).await;

        assert_eq!(cascade.selection().region_code.as_deref(), Some("R2"));
        assert_eq!(cascade.selection().subregion_code, None);
        assert_eq!(cascade.selection().locality_code, None);
        assert!(cascade.localities().is_empty());
        let names: Vec<&str> = cascade.subregions().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Hải Châu"]);
        assert_eq!(cascade.resolved_names().region.as_deref(), Some("Đà Nẵng"));
        assert_eq!(cascade.resolved_names().subregion, None);
    }

    #[tokio::test]
    async fn test_subregion_change_clears_locality() {
        let (_, _, mut cascade) = fixture();
        cascade.select_region(Some("R1")).await;
        cascade.select_subregion(Some("S1")).await;
        cascade.select_locality(Some("L1"));

        cascade.select_subregion(Some("S2")).await;

        assert_eq!(cascade.selection().subregion_code.as_deref(), Some("S2"));
        assert_eq!(cascade.selection().locality_code, None);
        assert!(cascade.localities().is_empty());
    }

    #[tokio::test]
    async fn test_reselecting_cached_region_is_a_no_op() {
        let (api, _, mut cascade) = fixture();
        cascade.select_region(Some("R1")).await;
        cascade.select_subregion(Some("S1")).await;

        cascade.select_region(Some("R1")).await;

        assert_eq!(api.call_count("subregions:R1"), 1);
        // the no-op path keeps the child selection alive
        assert_eq!(cascade.selection().subregion_code.as_deref(), Some("S1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_is_rerun_on_reselect() {
        let (api, _, mut cascade) = fixture();
        for _ in 0..3 {
            api.fail_next("subregions:R1", FetchError::transient("connection reset"));
        }

        cascade.select_region(Some("R1")).await;
        assert_eq!(api.call_count("subregions:R1"), 3);
        assert!(matches!(
            cascade.tier_error(LocationTier::Subregion),
            Some(FetchError::Unreachable { attempts: 3, .. })
        ));
        assert!(cascade.subregions().is_empty());

        // nothing was cached, so the same code goes back to the network
        cascade.select_region(Some("R1")).await;
        assert_eq!(api.call_count("subregions:R1"), 4);
        assert_eq!(cascade.subregions().len(), 2);
        assert!(cascade.tier_error(LocationTier::Subregion).is_none());
    }

    #[tokio::test]
    async fn test_blank_code_clears_without_fetching() {
        let (api, _, mut cascade) = fixture();
        cascade.select_region(Some("R1")).await;
        let calls_before = api.calls().len();

        cascade.select_region(Some("   ")).await;

        assert_eq!(api.calls().len(), calls_before);
        assert_eq!(cascade.selection(), &LocationSelection::default());
        assert!(cascade.subregions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reload_keeps_visible_regions() {
        let (api, cache, mut cascade) = fixture();
        cascade.load_regions().await;
        assert_eq!(cascade.regions().len(), 2);

        cache.invalidate_all();
        for _ in 0..3 {
            api.fail_next("regions", FetchError::transient("connection reset"));
        }
        cascade.load_regions().await;

        assert_eq!(cascade.regions().len(), 2);
        assert!(matches!(
            cascade.tier_error(LocationTier::Region),
            Some(FetchError::Unreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_selections_lists_and_errors() {
        let (api, _, mut cascade) = fixture();
        cascade.load_regions().await;
        cascade.select_region(Some("R1")).await;
        api.fail_next("localities:S1", FetchError::client(404, "not found"));
        cascade.select_subregion(Some("S1")).await;
        assert!(cascade.tier_error(LocationTier::Locality).is_some());

        cascade.reset();

        assert_eq!(cascade.selection(), &LocationSelection::default());
        assert!(cascade.regions().is_empty());
        assert!(cascade.subregions().is_empty());
        assert!(cascade.localities().is_empty());
        assert!(cascade.tier_error(LocationTier::Region).is_none());
        assert!(cascade.tier_error(LocationTier::Subregion).is_none());
        assert!(cascade.tier_error(LocationTier::Locality).is_none());
    }

    #[tokio::test]
    async fn test_restored_codes_resolve_once_lists_load() {
        let (_, _, mut cascade) = fixture();
        cascade.restore_selection(LocationSelection {
            region_code: Some("R1".into()),
            subregion_code: Some("S1".into()),
            locality_code: None,
        });
        assert_eq!(cascade.resolved_names(), ResolvedLocation::default());

        cascade.load_regions().await;

        let resolved = cascade.resolved_names();
        assert_eq!(resolved.region.as_deref(), Some("Hà Nội"));
        // the subregion list has not been loaded, so its name stays unresolved
        assert_eq!(resolved.subregion, None);
    }

    #[tokio::test]
    async fn test_lists_keep_upstream_order() {
        // neither codes nor names arrive sorted; the served lists must not be
        let api = Arc::new(
            ScriptedApi::new()
                .with_regions(vec![
                    node("R9", "Vũng Tàu", None),
                    node("R1", "An Giang", None),
                ])
                .with_subregions(
                    "R9",
                    vec![
                        node("S7", "Thắng Nhất", Some("R9")),
                        node("S2", "Bến Đình", Some("R9")),
                        node("S5", "Rạch Dừa", Some("R9")),
                    ],
                ),
        );
        let mut cascade = LocationCascade::new(api, Arc::new(ResultCache::new()));

        cascade.load_regions().await;
        cascade.select_region(Some("R9")).await;

        let region_codes: Vec<&str> = cascade.regions().iter().map(|n| n.code.as_str()).collect();
        assert_eq!(region_codes, vec!["R9", "R1"]);
        let subregion_names: Vec<&str> =
            cascade.subregions().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(subregion_names, vec!["Thắng Nhất", "Bến Đình", "Rạch Dừa"]);

        // the cache-served copy keeps the order too
        cascade.select_region(None).await;
        cascade.select_region(Some("R9")).await;
        let subregion_codes: Vec<&str> =
            cascade.subregions().iter().map(|n| n.code.as_str()).collect();
        assert_eq!(subregion_codes, vec!["S7", "S2", "S5"]);
    }
}
