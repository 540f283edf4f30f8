use anyhow::Context;
use citymap::{bounds, config, export, regions, render, server, venues};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the map data and the web page
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Render a city's venue dots to PNG, one image per zoom level
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        city: String,
    },
    /// Write a city's region distributions to CSV
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        city: String,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Export at most max_region + 1 regions
        #[arg(long)]
        max_region: Option<usize>,
    },
    /// Print a summary of a city's regions and venues
    Inspect {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        city: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let cities = bounds::CityTable::load(&app_config.data.city_bounds)?;
            info!("Loaded bounds for {} cities", cities.len());
            server::start_server(app_config, cities).await?;
        }
        Commands::Render { config, city } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let cities = bounds::CityTable::load(&app_config.data.city_bounds)?;
            let city = cities.get(city)?;

            let venues = venues::load_venues(
                &venues::venue_file(&app_config.regions_dir(), &city.id),
                app_config.venues.min_visits,
            )?;
            let written = render::render_venue_layers(&app_config, city, &venues)?;
            info!("Wrote {} images for {}", written.len(), city.id);
        }
        Commands::Export { config, city, output, max_region } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let cities = bounds::CityTable::load(&app_config.data.city_bounds)?;
            let city = cities.get(city)?;

            let max_region = max_region.unwrap_or(app_config.display.max_region);
            let regions = regions::load_regions(&regions::region_file(&app_config.regions_dir(), &city.id), max_region)?;
            let output = output.clone().unwrap_or_else(|| PathBuf::from(format!("{}_regions.csv", city.id)));
            export::export_region_stats(&output, &city.id, &regions)?;
        }
        Commands::Inspect { config, city } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let cities = bounds::CityTable::load(&app_config.data.city_bounds)?;
            let city = cities.get(city)?;

            let regions = regions::load_regions(
                &regions::region_file(&app_config.regions_dir(), &city.id),
                app_config.display.max_region,
            )?;
            println!("{} ({})", city.name, city.id);
            for region in &regions {
                println!("  {:>3}  {}{}", region.index, region.name, regions::weight_sentence(region));
            }
            if let Some(max) = regions::max_bounds(&regions, app_config.display.bounds_padding) {
                println!("  max bounds: {:?}", bounds::to_lat_lng(&max));
            }

            let venue_path = venues::venue_file(&app_config.regions_dir(), &city.id);
            let venues = venues::load_venues(&venue_path, app_config.venues.min_visits)
                .with_context(|| format!("No usable venues for {}", city.id))?;
            match venues::LogScale::for_venues(&venues, &app_config.venues) {
                Some(scale) => println!("  {} venues, radius domain {:?}", venues.len(), scale.domain()),
                None => println!("  no venue with at least {} visits", app_config.venues.min_visits),
            }
        }
    }

    Ok(())
}
