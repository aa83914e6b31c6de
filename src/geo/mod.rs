use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::error::FetchError;
use crate::client::rest::{error_for_status, transport_error, USER_AGENT};
use crate::models::{GeoFix, GeoPoint, GeoTier};

/// One tier of the forward-geocoding chain
#[async_trait]
pub trait GeocodeSource: Send + Sync {
    async fn forward(&self, address: &str) -> Result<GeoPoint, FetchError>;

    /// Get the name of the geocoding source
    fn source_name(&self) -> &'static str;
}

/// Forward geocoding against our own backend
pub struct BackendGeocoder {
    client: Client,
    base_url: String,
}

impl BackendGeocoder {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GeocodeSource for BackendGeocoder {
    async fn forward(&self, address: &str) -> Result<GeoPoint, FetchError> {
        let url = format!("{}/api/geocode", self.base_url);
        debug!("GET {url}?address={address}");
        let response = self
            .client
            .get(&url)
            .query(&[("address", address)])
            .send()
            .await
            .map_err(transport_error)?;
        error_for_status(&response)?;
        response.json().await.map_err(transport_error)
    }

    fn source_name(&self) -> &'static str {
        "backend"
    }
}

/// Nominatim-style response row; coordinates arrive as strings
#[derive(Debug, Deserialize)]
struct OsmPlace {
    lat: String,
    lon: String,
}

/// Forward geocoding against a public OpenStreetMap-compatible endpoint
pub struct OsmGeocoder {
    client: Client,
    base_url: String,
}

impl OsmGeocoder {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GeocodeSource for OsmGeocoder {
    async fn forward(&self, address: &str) -> Result<GeoPoint, FetchError> {
        let url = format!("{}/search", self.base_url);
        debug!("GET {url}?q={address}");
        let response = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(transport_error)?;
        error_for_status(&response)?;

        let places: Vec<OsmPlace> = response.json().await.map_err(transport_error)?;
        let place = places.into_iter().next().ok_or_else(|| {
            FetchError::client(404, format!("no geocoding match for {address}"))
        })?;
        parse_place(place)
    }

    fn source_name(&self) -> &'static str {
        "osm"
    }
}

fn parse_place(place: OsmPlace) -> Result<GeoPoint, FetchError> {
    let latitude = place.lat.parse().map_err(|_| bad_coord(&place.lat))?;
    let longitude = place.lon.parse().map_err(|_| bad_coord(&place.lon))?;
    Ok(GeoPoint {
        latitude,
        longitude,
    })
}

fn bad_coord(raw: &str) -> FetchError {
    FetchError::Decode {
        message: format!("geocoder returned a non-numeric coordinate: {raw}"),
    }
}

/// Fallback chain over two geocoding sources plus a static city table.
///
/// Each tier gets a single attempt; moving down the chain is the retry
/// strategy here. `locate` always produces a usable point, tagged with the
/// tier that supplied it.
pub struct Geocoder {
    primary: Box<dyn GeocodeSource>,
    fallback: Box<dyn GeocodeSource>,
}

impl Geocoder {
    pub fn new(primary: Box<dyn GeocodeSource>, fallback: Box<dyn GeocodeSource>) -> Self {
        Self { primary, fallback }
    }

    pub async fn locate(&self, address: &str, city: &str) -> GeoFix {
        let tiers = [
            (&self.primary, GeoTier::Primary),
            (&self.fallback, GeoTier::Fallback),
        ];
        for (source, tier) in tiers {
            match source.forward(address).await {
                Ok(point) => return GeoFix { point, tier },
                Err(e) => warn!("{} geocoder failed for {address}: {e}", source.source_name()),
            }
        }

        debug!("falling back to the city default for {city}");
        GeoFix {
            point: city_default(city),
            tier: GeoTier::CityDefault,
        }
    }
}

/// Map centers for the cities the marketplace operates in
const CITY_DEFAULTS: &[(&str, f64, f64)] = &[
    ("hà nội", 21.0285, 105.8542),
    ("hồ chí minh", 10.7769, 106.7009),
    ("đà nẵng", 16.0544, 108.2022),
    ("hải phòng", 20.8449, 106.6881),
    ("cần thơ", 10.0452, 105.7469),
];

/// Nationwide default when the city is unknown (Hà Nội)
pub const DEFAULT_CENTER: GeoPoint = GeoPoint {
    latitude: 21.0285,
    longitude: 105.8542,
};

/// Static default coordinate for a city name; substring match so
/// "Quận 1, Hồ Chí Minh" still resolves
pub fn city_default(city: &str) -> GeoPoint {
    let needle = city.trim().to_lowercase();
    if needle.is_empty() {
        return DEFAULT_CENTER;
    }
    CITY_DEFAULTS
        .iter()
        .find(|(name, _, _)| needle.contains(name))
        .map(|&(_, latitude, longitude)| GeoPoint {
            latitude,
            longitude,
        })
        .unwrap_or(DEFAULT_CENTER)
}
