#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flood risk map for Mumbai wards.
//!
//! Loads ward boundaries, talks to the flood prediction backend, and keeps
//! per-ward risk state consistent while wards are selected. With no
//! subcommand it starts an interactive ward picker.
//!
//! Uses `indicatif-log-bridge` (via [`flood_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and spinners never fight for the terminal.

mod config;
mod interactive;
mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use flood_map_api::{ApiClient, PredictionBackend};
use flood_map_api_models::{BayesianRequest, ComprehensiveRequest, WeatherInput};
use flood_map_cli_utils::{MultiProgress, Spinner};
use flood_map_controller::{SelectionController, Session, SessionEvent, SessionUpdate};
use flood_map_map::MapView;
use flood_map_region::{BoundaryProperties, RegionStore};
use flood_map_region_models::LatLon;
use tokio::sync::mpsc;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "flood_map", about = "Flood risk map for Mumbai wards")]
struct Cli {
    /// Prediction backend URL (overrides `FLOOD_API_URL`)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Ward boundary `GeoJSON` document (overrides `FLOOD_BOUNDARY_PATH`)
    #[arg(long, global = true)]
    boundaries: Option<PathBuf>,
    /// Weather refresh interval in seconds, 0 to disable
    /// (overrides `FLOOD_WEATHER_REFRESH_SECS`)
    #[arg(long, global = true)]
    refresh_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List ward codes, names, and centroids
    Regions,
    /// Analyze wards one after another and print their risk
    Select {
        /// Ward codes (e.g., "H/E")
        #[arg(required = true)]
        codes: Vec<String>,
        /// Write the styled map to this `GeoJSON` file
        #[arg(long)]
        out: Option<PathBuf>,
        /// Skip loading predictions for every ward first
        #[arg(long)]
        no_bulk: bool,
    },
    /// Select one ward and keep refreshing it until interrupted
    Watch {
        /// Ward code
        code: String,
    },
    /// Show backend health
    Health,
    /// Show current weather for a ward
    Weather {
        /// Ward code
        code: String,
    },
    /// Predict a ward's risk under custom weather conditions
    Custom {
        /// Ward code
        code: String,
        #[command(flatten)]
        weather: WeatherArgs,
    },
    /// Run every model on a ward and show the combined assessment
    Comprehensive {
        /// Ward code
        code: String,
        /// Use live weather instead of the weather flags
        #[arg(long)]
        live: bool,
        #[command(flatten)]
        weather: WeatherArgs,
    },
    /// Query the probabilistic network with a raw feature series
    Bayesian {
        /// Ward code
        code: String,
        /// Comma-separated feature values
        #[arg(value_delimiter = ',', required = true)]
        features: Vec<f64>,
    },
    /// Start model training on the backend
    Retrain {
        /// Wait until the backend reports the models as loaded
        #[arg(long)]
        wait: bool,
        /// Give up waiting after this many seconds
        #[arg(long, default_value = "900")]
        timeout_secs: u64,
    },
    /// Show what the backend's models were trained with
    Models,
    /// Show the ward clustering
    Clusters,
    /// Plan a route that avoids high-risk wards
    Route {
        /// Origin as "lat,lon"
        #[arg(long, value_parser = parse_lat_lon)]
        from: LatLon,
        /// Destination as "lat,lon"
        #[arg(long, value_parser = parse_lat_lon)]
        to: LatLon,
    },
    /// Find the nearest low-risk location
    SafeZone {
        /// Location as "lat,lon"
        #[arg(value_parser = parse_lat_lon)]
        location: LatLon,
    },
}

#[derive(Args)]
struct WeatherArgs {
    /// Current rainfall in mm
    #[arg(long, default_value = "0")]
    rainfall: f64,
    /// Rainfall over the last 24 hours in mm
    #[arg(long, default_value = "0")]
    rainfall_24h: f64,
    /// Tide level in metres
    #[arg(long, default_value = "0")]
    tide: f64,
    /// Temperature in °C
    #[arg(long, default_value = "28")]
    temperature: f64,
    /// Relative humidity in percent
    #[arg(long, default_value = "80")]
    humidity: f64,
    /// Wind speed in km/h
    #[arg(long, default_value = "0")]
    wind: f64,
    /// Season label
    #[arg(long, default_value = "Monsoon")]
    season: String,
}

impl From<WeatherArgs> for WeatherInput {
    fn from(args: WeatherArgs) -> Self {
        Self {
            rainfall_mm: args.rainfall,
            rainfall_24hr: args.rainfall_24h,
            tide_level_m: args.tide,
            temperature_c: args.temperature,
            humidity_percent: args.humidity,
            wind_speed_kmh: args.wind,
            season: args.season,
        }
    }
}

fn parse_lat_lon(s: &str) -> Result<LatLon, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lon\", got \"{s}\""))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
    Ok(LatLon::new(lat, lon))
}

fn load_regions(config: &Config, session: &mut Session) -> RegionStore {
    match RegionStore::load(&config.boundary_path, &BoundaryProperties::default()) {
        Ok(store) => store,
        Err(e) => {
            session.on_boundary_failure(&e);
            RegionStore::empty()
        }
    }
}

const RETRAIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polls health until the models are loaded or `timeout` passes.
async fn wait_for_models(
    multi: &MultiProgress,
    backend: &dyn PredictionBackend,
    timeout: Duration,
) {
    let spinner = Spinner::start(multi, "Training models...");
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        tokio::time::sleep(RETRAIN_POLL_INTERVAL).await;

        match backend.health().await {
            Ok(health) if health.models_loaded => {
                spinner.finish("Models loaded");
                return;
            }
            Ok(health) => {
                spinner.set_message(format!("Training models... ({})", health.api_status));
            }
            Err(e) => {
                log::debug!("health check while training failed: {e}");
                spinner.set_message("Training models... (backend not responding)");
            }
        }

        if tokio::time::Instant::now() >= deadline {
            spinner.finish("Still training; check `flood_map health` later");
            return;
        }
    }
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = flood_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = Config::from_env().with_overrides(cli.api_url, cli.boundaries, cli.refresh_secs);
    log::debug!("{config:?}");

    let client = ApiClient::new(&config.api_url)?;
    let backend: Arc<dyn PredictionBackend> = Arc::new(client.clone());
    let mut session = Session::new(
        Arc::clone(&backend),
        SelectionController::new(config.notification_ttl),
    );

    let Some(command) = cli.command else {
        let store = load_regions(&config, &mut session);
        return interactive::run(&multi, &store, &mut session).await;
    };

    match command {
        Commands::Regions => {
            report::print_regions(&load_regions(&config, &mut session));
            report::print_notifications(session.controller().notifications());
        }
        Commands::Select {
            codes,
            out,
            no_bulk,
        } => {
            let store = load_regions(&config, &mut session);

            if !no_bulk && session.start().await {
                let spinner = Spinner::start(&multi, "Loading predictions for all wards...");
                session.settle().await?;
                spinner.finish_and_clear();
            }

            for code in &codes {
                if !store.is_empty() && store.get(code).is_none() {
                    log::warn!("Ward {code} is not in the boundary document");
                }

                let spinner = Spinner::start(&multi, &format!("Fetching {code}..."));
                session.select(code);
                session.settle().await?;
                spinner.finish_and_clear();

                report::print_region_state(&store, session.controller(), code);
            }

            report::print_summary(&session.controller().summary());
            report::print_notifications(session.controller().notifications());

            if let Some(out) = out {
                report::write_map(&out, &MapView::new(&store), session.controller())?;
            }
        }
        Commands::Watch { code } => {
            let store = load_regions(&config, &mut session);
            let (tx, rx) = mpsc::channel(8);
            tx.send(SessionEvent::Select(code)).await?;

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tx.send(SessionEvent::Shutdown).await.ok();
                }
            });

            log::info!(
                "Watching; refresh every {}",
                config
                    .refresh
                    .map_or_else(|| "never".to_string(), |d| format!("{}s", d.as_secs()))
            );

            session
                .run(rx, config.refresh, |controller, update| {
                    if let SessionUpdate::Region { region, .. } = update {
                        report::print_region_state(&store, controller, region);
                    }
                    report::print_notifications(controller.notifications());
                })
                .await?;
        }
        Commands::Health => {
            let health = backend.health().await?;
            println!("Backend:         {}", client.base_url());
            println!("API status:      {}", health.api_status);
            println!("Models loaded:   {}", health.models_loaded);
            println!("Weather service: {}", health.weather_service);
        }
        Commands::Weather { code } => {
            let weather = backend.current_weather(&code).await?;
            println!("{} ({})", weather.ward_name, weather.ward_code);
            report::print_weather(&weather);
        }
        Commands::Custom { code, weather } => {
            let raw = client.predict_custom(&code, &weather.into()).await?;
            report::print_raw_prediction(&code, &raw);
        }
        Commands::Comprehensive {
            code,
            live,
            weather,
        } => {
            let request = ComprehensiveRequest {
                ward_code: code.clone(),
                weather: (!live).then(|| weather.into()),
            };
            let raw = client.predict_comprehensive(&request).await?;
            report::print_raw_prediction(&code, &raw);
        }
        Commands::Bayesian { code, features } => {
            let request = BayesianRequest {
                ward_code: code.clone(),
                features,
            };
            let raw = client.bayesian_predict(&request).await?;
            report::print_raw_prediction(&code, &raw);
        }
        Commands::Retrain { wait, timeout_secs } => {
            let status = client.retrain_models().await?;
            println!("{}", status.message);
            if wait {
                wait_for_models(&multi, backend.as_ref(), Duration::from_secs(timeout_secs))
                    .await;
            }
        }
        Commands::Models => report::print_model_info(&client.model_info().await?),
        Commands::Clusters => {
            let clusters = client.ward_clusters().await?;
            println!("{:<8} {:<28} {:<8} ZONE", "WARD", "NAME", "CLUSTER");
            println!("{}", "-".repeat(60));
            for ward in &clusters.ward_clusters {
                println!(
                    "{:<8} {:<28} {:<8} {}",
                    ward.ward_code, ward.ward_name, ward.cluster, ward.risk_zone
                );
            }
            for (zone, count) in &clusters.cluster_summary {
                println!("{zone}: {count}");
            }
        }
        Commands::Route { from, to } => {
            let route = client.safe_route(from, to).await?;
            println!(
                "{:.1} km, risk score {:.2}",
                route.distance_km, route.risk_score
            );
            for point in &route.waypoints {
                println!("  {point}");
            }
            if !route.avoided_wards.is_empty() {
                println!("Avoided wards: {}", route.avoided_wards.join(", "));
            }
        }
        Commands::SafeZone { location } => {
            let zone = client.nearest_safe_zone(location).await?;
            print!("{} ({:.1} km)", zone.name, zone.distance_km);
            if let Some(point) = zone.location {
                print!(" at {point}");
            }
            println!();
        }
    }

    Ok(())
}
