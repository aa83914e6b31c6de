use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::filters::state::FilterState;
use crate::models::{OptionCatalog, OptionKind, ResolvedLocation, RoomType, SortKey};

/// Page size sent when the caller has not asked for anything else
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Flattened, server-ready projection of the filter state.
///
/// Built fresh on every search submission and never mutated in place. The
/// backend expects human-readable names where the UI tracks codes/ids, so the
/// location fields carry resolved names and the set-valued groups arrive as
/// comma-joined name lists. Absent criteria are omitted from the query string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub page: u32,
    pub size: u32,
    pub sort: SortKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subregion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amenities: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audiences: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_type: Option<RoomType>,
}

impl SearchRequest {
    /// First-load request: no filter criteria at all
    pub fn new(page: u32, size: u32, sort: SortKey) -> Self {
        Self {
            page,
            size,
            sort,
            street: None,
            region: None,
            subregion: None,
            locality: None,
            min_price: None,
            max_price: None,
            area_range: None,
            amenities: None,
            audiences: None,
            environments: None,
            room_type: None,
        }
    }

    /// Projects the current filter state into a request.
    ///
    /// Location codes resolve to names through the cascade's loaded lists and
    /// group ids through the reference catalog; any value whose lookup fails
    /// is left out rather than erroring.
    pub fn from_state(
        filters: &FilterState,
        location: &ResolvedLocation,
        catalog: &OptionCatalog,
        page: u32,
        size: u32,
        sort: SortKey,
        room_type: Option<RoomType>,
    ) -> Self {
        let (min_price, max_price) = filters.price.bounds();
        Self {
            page,
            size,
            sort,
            street: non_empty(&filters.free_text_query),
            region: location.region.clone(),
            subregion: location.subregion.clone(),
            locality: location.locality.clone(),
            min_price,
            max_price,
            area_range: join_raw(&filters.area_buckets),
            amenities: join_names(catalog, OptionKind::Amenities, &filters.amenity_ids),
            audiences: join_names(catalog, OptionKind::Audiences, &filters.audience_ids),
            environments: join_names(catalog, OptionKind::Environments, &filters.environment_ids),
            room_type,
        }
    }

    /// Stable serialized form, used as the result-cache key
    pub fn signature(&self) -> String {
        serde_json::to_string(self).expect("request serializes to JSON")
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn join_raw(values: &BTreeSet<String>) -> Option<String> {
    (!values.is_empty()).then(|| values.iter().cloned().collect::<Vec<_>>().join(","))
}

fn join_names(catalog: &OptionCatalog, kind: OptionKind, ids: &BTreeSet<String>) -> Option<String> {
    let names: Vec<&str> = ids
        .iter()
        .filter_map(|id| catalog.name_of(kind, id))
        .collect();
    (!names.is_empty()).then(|| names.join(","))
}
