use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;

use driveway_tracker::{
    config::AppConfig, db, geocode::GeocoderService, init_tracing, pipeline::GeocodingPipeline,
    search::SearchService, seed::load_permit_export, store::AddressStore, store::SearchField,
};

#[derive(Parser)]
#[command(
    name = "driveway-tracker",
    about = "Maintenance tasks for the permitted-driveway map",
    version
)]
struct Cli {
    /// Directory holding the address store (default from DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import the municipal permit export into an empty store
    Seed {
        /// Path to the permit JSON export
        file: PathBuf,
    },
    /// Resolve coordinates for every record still missing them
    Geocode,
    /// Prefix search over the address or street-name dimension
    Search {
        /// Query prefix, matched case-insensitively
        query: String,
        /// Dimension to match: address or street-name
        #[arg(long, default_value = "address")]
        field: String,
    },
    /// Print a random sample of geocoded records
    Sample {
        /// Sample size (default from MAP_SAMPLE_SIZE)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Report collection totals
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| PathBuf::from(&config.data_dir));
    let context = db::bootstrap(&data_dir, &config.database_file_name)
        .context("failed to open the address store")?;
    let store = AddressStore::new(Arc::new(Mutex::new(context.connection)));

    match cli.command {
        Command::Seed { file } => {
            let records = load_permit_export(&file)
                .with_context(|| format!("failed to read permit export {}", file.display()))?;
            let inserted = store.bulk_insert(&records)?;
            println!("{inserted} of {} records imported", records.len());
        }
        Command::Geocode => {
            let geocoder =
                GeocoderService::new(&config).context("geocoding requires MAPBOX_ACCESS_TOKEN")?;
            let pipeline = GeocodingPipeline::new(store, geocoder, &config);
            let stats = pipeline.run().await;
            println!(
                "geocoded {} of {} pending records ({} unresolved, {} batches)",
                stats.geocoded, stats.pending, stats.unresolved, stats.batches
            );
        }
        Command::Search { query, field } => {
            let field = SearchField::parse(&field)?;
            let results = SearchService::new(store).search(&query, field);
            for record in &results {
                println!("{}  ({})", record.address, record.date);
            }
            println!("{} matches", results.len());
        }
        Command::Sample { limit } => {
            let limit = limit.unwrap_or(config.sample_size);
            for record in SearchService::new(store).sample_view(limit) {
                println!("{}  ({})", record.address, record.date);
            }
        }
        Command::Status => {
            let total = store.count()?;
            let pending = store.find_missing_coordinates()?.len();
            let token = if config.has_mapbox_token() {
                "set"
            } else {
                "missing"
            };
            println!("{total} records, {pending} awaiting geocoding, geocoder token {token}");
        }
    }

    Ok(())
}
