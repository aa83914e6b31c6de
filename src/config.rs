use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub api_base_url: String,
    pub geocoder_url: String,
    pub http_timeout_secs: u64,
    /// The public geocoder is slower than our own backend
    pub geocode_timeout_secs: u64,
    pub store_path: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            api_base_url: try_load("ROOM_SCOUT_API_URL", "http://localhost:8080"),
            geocoder_url: try_load(
                "ROOM_SCOUT_GEOCODER_URL",
                "https://nominatim.openstreetmap.org",
            ),
            http_timeout_secs: try_load("ROOM_SCOUT_HTTP_TIMEOUT_SECS", "30"),
            geocode_timeout_secs: try_load("ROOM_SCOUT_GEOCODE_TIMEOUT_SECS", "45"),
            store_path: try_load("ROOM_SCOUT_STORE_PATH", "room_scout_store.json"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
