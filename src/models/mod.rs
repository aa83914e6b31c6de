use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing category, also used as the persistence scope for filters and results
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Room,
    House,
    Apartment,
    Shared,
    Office,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Room => "room",
            RoomType::House => "house",
            RoomType::Apartment => "apartment",
            RoomType::Shared => "shared",
            RoomType::Office => "office",
        }
    }
}

/// Sort order accepted by the search endpoint
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    AreaAsc,
    AreaDesc,
}

/// One node of the region → subregion → locality address tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationNode {
    pub code: String,
    pub name: String,
    /// Region nodes have no parent; a subregion's parent is a region,
    /// a locality's parent is a subregion.
    #[serde(default)]
    pub parent_code: Option<String>,
}

impl LocationNode {
    pub fn new(code: &str, name: &str, parent_code: Option<&str>) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            parent_code: parent_code.map(str::to_string),
        }
    }
}

/// Address tier of a [`LocationNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationTier {
    Region,
    Subregion,
    Locality,
}

/// Human-readable names for the current location selection, looked up in the
/// loaded option lists. A `None` means the name could not be resolved and the
/// field is omitted from outgoing requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedLocation {
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub locality: Option<String>,
}

/// Reference-data record (amenity, target audience, surrounding environment)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionItem {
    pub id: String,
    pub name: String,
}

impl OptionItem {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// Kind of reference-data list served by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Amenities,
    Audiences,
    Environments,
}

impl OptionKind {
    pub const ALL: [OptionKind; 3] = [
        OptionKind::Amenities,
        OptionKind::Audiences,
        OptionKind::Environments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKind::Amenities => "amenities",
            OptionKind::Audiences => "audiences",
            OptionKind::Environments => "environments",
        }
    }
}

/// All loaded reference-data lists, used to translate selected ids into the
/// names the search endpoint expects
#[derive(Debug, Clone, Default)]
pub struct OptionCatalog {
    pub amenities: Vec<OptionItem>,
    pub audiences: Vec<OptionItem>,
    pub environments: Vec<OptionItem>,
}

impl OptionCatalog {
    pub fn list(&self, kind: OptionKind) -> &[OptionItem] {
        match kind {
            OptionKind::Amenities => &self.amenities,
            OptionKind::Audiences => &self.audiences,
            OptionKind::Environments => &self.environments,
        }
    }

    pub fn set_list(&mut self, kind: OptionKind, items: Vec<OptionItem>) {
        match kind {
            OptionKind::Amenities => self.amenities = items,
            OptionKind::Audiences => self.audiences = items,
            OptionKind::Environments => self.environments = items,
        }
    }

    /// Name for an id within one kind, `None` when the id is unknown
    pub fn name_of(&self, kind: OptionKind, id: &str) -> Option<&str> {
        self.list(kind)
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.name.as_str())
    }
}

/// Core room-rental listing as returned by the search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub room_type: RoomType,
    /// Monthly price in VND
    pub price: u64,
    /// Usable area in square meters
    pub area_sqm: f32,
    pub address: String,
    pub region: String,
    #[serde(default)]
    pub subregion: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub posted_at: DateTime<Utc>,
}

/// One page of search results plus the backend's total count
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub items: Vec<Listing>,
    pub total_count: u64,
}

impl SearchPage {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
        }
    }
}

/// Geographic coordinate pair
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Which tier of the geocoding chain produced a fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoTier {
    /// Backend forward-geocode endpoint
    Primary,
    /// Public OpenStreetMap-compatible geocoder
    Fallback,
    /// Static per-city default coordinate table
    CityDefault,
}

impl GeoTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoTier::Primary => "primary",
            GeoTier::Fallback => "fallback",
            GeoTier::CityDefault => "city-default",
        }
    }
}

/// Geocoding outcome: the coordinates and the tier that produced them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFix {
    pub point: GeoPoint,
    pub tier: GeoTier,
}
