use std::sync::Arc;
use std::time::Duration;

use room_scout::{
    BackendGeocoder, Config, Geocoder, JsonFileStore, OsmGeocoder, RestMarketApi, SearchEngine,
};
use tracing::{info, Level};
use tracing_subscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("🏠 Room Scout - rental room search");
    info!("==================================");
    info!("");

    let config = Config::load();
    let store = Arc::new(JsonFileStore::open(&config.store_path));
    let api = Arc::new(RestMarketApi::new(
        &config.api_base_url,
        Duration::from_secs(config.http_timeout_secs),
    )?);

    let mut engine = SearchEngine::new(api, store);
    engine.restore();
    engine.load_reference_data().await;
    engine.load_regions().await;

    // An optional free-text query from the command line
    if let Some(query) = std::env::args().nth(1) {
        info!("Searching for \"{query}\"...");
        engine.set_free_text(&query);
    } else {
        info!("Searching with the last saved filters...");
    }
    info!("");

    let page = engine.search().await?;

    info!("\n✅ Found {} rooms ({} total)\n", page.items.len(), page.total_count);

    for (i, room) in page.items.iter().enumerate() {
        println!("{}. {} ({} ₫/month)", i + 1, room.title, room.price);
        println!("   {} m² · {}", room.area_sqm, room.address);
        println!("   Region: {}", room.region);
        if !room.amenities.is_empty() {
            println!("   Amenities: {}", room.amenities.join(", "));
        }
        println!("   ID: {}", room.id);
        println!();
    }

    // Save to JSON file
    let json = serde_json::to_string_pretty(&page)?;
    tokio::fs::write("search_results.json", json).await?;
    info!("💾 Saved the result page to search_results.json");

    // Geocode a map center for the result set
    let geocoder = Geocoder::new(
        Box::new(BackendGeocoder::new(
            &config.api_base_url,
            Duration::from_secs(config.http_timeout_secs),
        )?),
        Box::new(OsmGeocoder::new(
            &config.geocoder_url,
            Duration::from_secs(config.geocode_timeout_secs),
        )?),
    );
    let city = page
        .items
        .first()
        .map(|room| room.region.clone())
        .unwrap_or_else(|| "Hà Nội".to_string());
    let fix = geocoder.locate(&city, &city).await;
    info!(
        "🗺️  Map center: {:.4}, {:.4} (via {})",
        fix.point.latitude,
        fix.point.longitude,
        fix.tier.as_str()
    );

    Ok(())
}
