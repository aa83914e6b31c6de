use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::Listing;

/// The four set-valued filter groups, toggled through one code path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterGroup {
    Area,
    Amenities,
    Audiences,
    Environments,
}

/// Price criterion. Encoding preset and custom range as variants of one enum
/// makes them mutually exclusive by construction: selecting either replaces
/// whatever was there.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PriceFilter {
    #[default]
    Any,
    /// Preset bucket key, e.g. "1-10m" (millions of VND)
    Bucket(String),
    Range {
        min: Option<u64>,
        max: Option<u64>,
    },
}

impl PriceFilter {
    /// Min/max bounds in VND; unknown bucket keys resolve to no bounds
    pub fn bounds(&self) -> (Option<u64>, Option<u64>) {
        match self {
            PriceFilter::Any => (None, None),
            PriceFilter::Bucket(key) => parse_price_bucket(key).unwrap_or((None, None)),
            PriceFilter::Range { min, max } => (*min, *max),
        }
    }
}

/// Parses `under-<n>m`, `<a>-<b>m` and `over-<n>m` keys into VND bounds
pub fn parse_price_bucket(key: &str) -> Option<(Option<u64>, Option<u64>)> {
    let key = key.trim().strip_suffix('m')?;
    let (min, max) = parse_span(key)?;
    let to_vnd = |millions: f64| (millions * 1_000_000.0).round() as u64;
    Some((min.map(to_vnd), max.map(to_vnd)))
}

/// Parses `under-<n>`, `<a>-<b>` and `over-<n>` area keys into m² bounds
pub fn parse_area_bucket(key: &str) -> Option<(Option<f64>, Option<f64>)> {
    parse_span(key.trim())
}

fn parse_span(key: &str) -> Option<(Option<f64>, Option<f64>)> {
    if let Some(rest) = key.strip_prefix("under-") {
        return Some((None, Some(rest.parse().ok()?)));
    }
    if let Some(rest) = key.strip_prefix("over-") {
        return Some((Some(rest.parse().ok()?), None));
    }
    let (low, high) = key.split_once('-')?;
    Some((Some(low.parse().ok()?), Some(high.parse().ok()?)))
}

/// Aggregated filter selections for one search surface.
///
/// Location codes live on the cascade resolver; everything else is here.
/// Defaults mean "no criterion".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterState {
    pub free_text_query: String,
    pub price: PriceFilter,
    pub area_buckets: BTreeSet<String>,
    pub amenity_ids: BTreeSet<String>,
    pub audience_ids: BTreeSet<String>,
    pub environment_ids: BTreeSet<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, group: FilterGroup) -> &BTreeSet<String> {
        match group {
            FilterGroup::Area => &self.area_buckets,
            FilterGroup::Amenities => &self.amenity_ids,
            FilterGroup::Audiences => &self.audience_ids,
            FilterGroup::Environments => &self.environment_ids,
        }
    }

    fn group_mut(&mut self, group: FilterGroup) -> &mut BTreeSet<String> {
        match group {
            FilterGroup::Area => &mut self.area_buckets,
            FilterGroup::Amenities => &mut self.amenity_ids,
            FilterGroup::Audiences => &mut self.audience_ids,
            FilterGroup::Environments => &mut self.environment_ids,
        }
    }

    /// Flips membership of `id` in one group; returns whether it is now selected
    pub fn toggle(&mut self, group: FilterGroup, id: &str) -> bool {
        let set = self.group_mut(group);
        if set.remove(id) {
            false
        } else {
            set.insert(id.to_string());
            true
        }
    }

    pub fn set_free_text(&mut self, query: &str) {
        self.free_text_query = query.trim().to_string();
    }

    /// Selects a preset price bucket, clearing any custom range.
    /// An empty key clears the price criterion entirely.
    pub fn set_price_bucket(&mut self, key: &str) {
        let key = key.trim();
        self.price = if key.is_empty() {
            PriceFilter::Any
        } else {
            PriceFilter::Bucket(key.to_string())
        };
    }

    /// Selects a custom price range, clearing any preset bucket.
    /// Two empty bounds clear the price criterion entirely.
    pub fn set_price_range(&mut self, min: Option<u64>, max: Option<u64>) {
        self.price = if min.is_none() && max.is_none() {
            PriceFilter::Any
        } else {
            PriceFilter::Range { min, max }
        };
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Instant client-side match on already-loaded listings: case-insensitive
    /// substring on title/address plus area-bucket containment. Cheap feedback
    /// only; the server search stays authoritative.
    pub fn quick_matches(&self, listing: &Listing) -> bool {
        let query = self.free_text_query.trim().to_lowercase();
        if !query.is_empty() {
            let title = listing.title.to_lowercase();
            let address = listing.address.to_lowercase();
            if !title.contains(&query) && !address.contains(&query) {
                return false;
            }
        }

        if !self.area_buckets.is_empty() {
            let area = f64::from(listing.area_sqm);
            let in_any = self.area_buckets.iter().any(|key| {
                match parse_area_bucket(key) {
                    Some((min, max)) => {
                        min.map_or(true, |m| area >= m) && max.map_or(true, |m| area <= m)
                    }
                    None => false,
                }
            });
            if !in_any {
                return false;
            }
        }

        true
    }
}
