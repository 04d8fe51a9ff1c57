use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::geocode::GeocoderService;
use crate::store::{AddressRecord, AddressStore};

/// One-off maintenance pass that resolves coordinates for every record
/// still lacking them. Records are enumerated once up front; rows added
/// while a run is in flight wait for the next run.
pub struct GeocodingPipeline {
    store: AddressStore,
    geocoder: GeocoderService,
    batch_size: usize,
    batch_delay: Duration,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GeocodingStats {
    pub pending: usize,
    pub geocoded: usize,
    pub unresolved: usize,
    pub batches: usize,
}

impl GeocodingPipeline {
    pub fn new(store: AddressStore, geocoder: GeocoderService, config: &AppConfig) -> Self {
        Self::with_pacing(
            store,
            geocoder,
            config.geocode_batch_size,
            Duration::from_millis(config.geocode_batch_delay_ms),
        )
    }

    pub fn with_pacing(
        store: AddressStore,
        geocoder: GeocoderService,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Self {
        Self {
            store,
            geocoder,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Runs to completion over the records enumerated at the start.
    /// Individual resolution failures are logged and skipped; the delay
    /// between batches paces the external provider.
    pub async fn run(&self) -> GeocodingStats {
        let pending = match self.store.find_missing_coordinates() {
            Ok(records) => records,
            Err(err) => {
                warn!(?err, "failed to enumerate ungeocoded records; nothing to do");
                Vec::new()
            }
        };

        let mut stats = GeocodingStats {
            pending: pending.len(),
            ..GeocodingStats::default()
        };

        for (index, batch) in pending.chunks(self.batch_size).enumerate() {
            if index > 0 {
                sleep(self.batch_delay).await;
            }
            stats.batches += 1;

            let outcomes = join_all(batch.iter().map(|record| self.geocode_one(record))).await;
            for resolved in outcomes {
                if resolved {
                    stats.geocoded += 1;
                } else {
                    stats.unresolved += 1;
                }
            }
        }

        info!(
            pending = stats.pending,
            geocoded = stats.geocoded,
            unresolved = stats.unresolved,
            batches = stats.batches,
            "geocoding run complete"
        );
        stats
    }

    async fn geocode_one(&self, record: &AddressRecord) -> bool {
        let Some(coordinates) = self.geocoder.resolve(&record.address).await else {
            warn!(address = %record.address, "record left ungeocoded");
            return false;
        };

        match self.store.set_coordinates(record.id, coordinates) {
            Ok(true) => {
                info!(
                    address = %record.address,
                    longitude = coordinates.longitude,
                    latitude = coordinates.latitude,
                    "geocoded address"
                );
                true
            }
            Ok(false) => {
                warn!(address = %record.address, "record already resolved; skipping write");
                false
            }
            Err(err) => {
                warn!(?err, address = %record.address, "failed to persist coordinates");
                false
            }
        }
    }
}
