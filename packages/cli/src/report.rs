//! Terminal output.

use std::path::Path;

use flood_map_api_models::{ModelInfo, WeatherReading};
use flood_map_controller::{NotificationCenter, SelectionController};
use flood_map_map::MapView;
use flood_map_region::RegionStore;
use flood_map_risk_models::{NormalizedPrediction, RawPrediction, RiskCategory, RiskSummary};

pub fn print_regions(store: &RegionStore) {
    if store.is_empty() {
        println!("No ward boundaries loaded.");
        return;
    }

    println!("{:<8} {:<28} CENTROID", "CODE", "NAME");
    println!("{}", "-".repeat(60));
    for region in store.list_regions() {
        println!("{:<8} {:<28} {}", region.code(), region.name(), region.centroid());
    }
}

pub fn print_prediction(code: &str, name: &str, prediction: &NormalizedPrediction) {
    let breakdown = &prediction.model_breakdown;

    println!();
    println!("{name} ({code})");
    println!("  Risk category:     {}", prediction.risk_category);
    println!(
        "  Flood probability: {:.1}%",
        prediction.flood_probability * 100.0
    );
    println!(
        "  Will flood:        {}",
        if prediction.will_flood { "yes" } else { "no" }
    );
    println!("  Confidence:        {}", prediction.combined_confidence);
    println!("  Risk zone:         {}", prediction.risk_zone);
    println!(
        "  Tree ensemble:     {} ({:.0}%)",
        breakdown.tree_ensemble.risk_category,
        breakdown.tree_ensemble.probability * 100.0
    );
    println!(
        "  Probabilistic:     {} ({:.0}%, interval {:.0}-{:.0}%)",
        breakdown.probabilistic.risk_category,
        breakdown.probabilistic.probability * 100.0,
        breakdown.probabilistic_interval.lower * 100.0,
        breakdown.probabilistic_interval.upper * 100.0
    );
    println!("  Clustering:        {}", breakdown.clustering.risk_category);
    println!(
        "  Retrieved:         {}",
        prediction.retrieved_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

/// Normalizes and prints a one-off prediction, with the weather inputs the
/// backend used when it reports them.
pub fn print_raw_prediction(code: &str, raw: &RawPrediction) {
    let prediction = flood_map_risk::normalize(raw);
    let name = raw.ward_name().unwrap_or(code);
    print_prediction(code, name, &prediction);

    if let Some(inputs) = raw.weather_data().and_then(serde_json::Value::as_object) {
        println!("  Model inputs:");
        for (key, value) in inputs {
            println!("    {key:<16} {value}");
        }
    }
}

pub fn print_model_info(info: &ModelInfo) {
    let ensemble = &info.tree_ensemble;
    println!(
        "Tree ensemble:  {} trees, max depth {}, {} features",
        ensemble.n_estimators,
        ensemble.max_depth,
        ensemble.features.len()
    );
    println!(
        "Clustering:     {} clusters ({})",
        info.clustering.n_clusters, info.clustering.algorithm
    );
    println!(
        "Probabilistic:  {} ({})",
        if info.probabilistic.available {
            "available"
        } else {
            "unavailable"
        },
        info.probabilistic.nodes.join(", ")
    );
    println!(
        "Training data:  {} records, {} columns",
        info.dataset.total_records,
        info.dataset.features.len()
    );
}

pub fn print_weather(weather: &WeatherReading) {
    println!("  Weather:");
    println!(
        "    Rainfall {:.1} mm (24h {:.1} mm), tide {:.2} m",
        weather.rainfall_mm, weather.rainfall_24hr_mm, weather.tide_level_m
    );
    println!(
        "    {:.1} °C, humidity {:.0}%, wind {:.1} km/h",
        weather.temperature_c, weather.humidity_percent, weather.wind_speed_kmh
    );
    if !weather.weather_description.is_empty() {
        println!("    {}", weather.weather_description);
    }
}

pub fn print_summary(summary: &RiskSummary) {
    println!();
    println!("Analyzed wards: {}", summary.analyzed);
    for &category in RiskCategory::all() {
        println!("  {:<9} {}", category.to_string(), summary.count(category));
    }
    println!("  Will flood: {}", summary.will_flood);
    println!(
        "  Mean flood probability: {:.1}%",
        summary.mean_flood_probability * 100.0
    );
}

pub fn print_notifications(notifications: &NotificationCenter) {
    for notification in notifications.active() {
        println!("[{}] {}", notification.level, notification.message);
    }
}

/// Prints the committed record for `code`, if any.
pub fn print_region_state(store: &RegionStore, controller: &SelectionController, code: &str) {
    let Some(prediction) = controller.risk().get(code) else {
        println!("{code}: not analyzed");
        return;
    };

    let name = store
        .get(code)
        .map_or_else(|| code.to_string(), |r| r.name().to_string());
    print_prediction(code, &name, prediction);

    if let Some(weather) = controller.risk().weather(code) {
        print_weather(weather);
    }
}

/// Writes the styled map as GeoJSON.
pub fn write_map(
    path: &Path,
    view: &MapView<'_>,
    controller: &SelectionController,
) -> Result<(), Box<dyn std::error::Error>> {
    let collection = view.render(controller.risk(), controller.selection());
    let json = serde_json::to_string_pretty(&collection)?;
    std::fs::write(path, json)?;

    log::info!(
        "Wrote {} styled wards to {}",
        collection.features.len(),
        path.display()
    );
    Ok(())
}
