pub mod config;
pub mod db;
pub mod errors;
pub mod geocode;
pub mod pipeline;
pub mod search;
pub mod seed;
pub mod store;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use geocode::{GeocodeLookup, GeocoderService};
pub use pipeline::{GeocodingPipeline, GeocodingStats};
pub use search::{SearchService, ViewEvent, ViewState};
pub use seed::{load_permit_export, parse_permit_export};
pub use store::{AddressRecord, AddressStore, Coordinates, NewAddressRecord, SearchField};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,driveway_tracker=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
