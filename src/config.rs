use std::{env, io};

use secrecy::SecretString;
use tracing::debug;

const DEFAULT_GEOCODE_BATCH_SIZE: usize = 5;
const DEFAULT_GEOCODE_BATCH_DELAY_MS: u64 = 1_000;
const DEFAULT_SAMPLE_SIZE: usize = 25;
const DEFAULT_LOCALITY_SUFFIX: &str = "Jersey City, NJ";
const DEFAULT_GEOCODER_API_BASE: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_file_name: String,
    pub data_dir: String,
    pub geocode_batch_size: usize,
    pub geocode_batch_delay_ms: u64,
    pub locality_suffix: String,
    pub geocoder_api_base: String,
    pub sample_size: usize,
    pub mapbox_access_token: Option<SecretString>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            database_file_name: env::var("DATABASE_FILE_NAME")
                .unwrap_or_else(|_| "driveway-tracker.db".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            geocode_batch_size: parse_usize("GEOCODE_BATCH_SIZE", DEFAULT_GEOCODE_BATCH_SIZE)
                .max(1),
            geocode_batch_delay_ms: parse_u64(
                "GEOCODE_BATCH_DELAY_MS",
                DEFAULT_GEOCODE_BATCH_DELAY_MS,
            ),
            locality_suffix: env::var("GEOCODE_LOCALITY_SUFFIX")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOCALITY_SUFFIX.to_string()),
            geocoder_api_base: env::var("MAPBOX_API_BASE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GEOCODER_API_BASE.to_string()),
            sample_size: parse_usize("MAP_SAMPLE_SIZE", DEFAULT_SAMPLE_SIZE).max(1),
            mapbox_access_token: env::var("MAPBOX_ACCESS_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
        }
    }

    pub fn has_mapbox_token(&self) -> bool {
        self.mapbox_access_token.is_some()
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_overrides_from_env() {
        env::set_var("DATABASE_FILE_NAME", "custom.db");
        env::set_var("GEOCODE_BATCH_SIZE", "7");
        env::set_var("GEOCODE_BATCH_DELAY_MS", "250");
        env::set_var("MAPBOX_ACCESS_TOKEN", "pk.test");

        let config = AppConfig::from_env();

        assert_eq!(config.database_file_name, "custom.db");
        assert_eq!(config.geocode_batch_size, 7);
        assert_eq!(config.geocode_batch_delay_ms, 250);
        assert!(config.has_mapbox_token());

        // a zero batch size is clamped rather than propagated
        env::set_var("GEOCODE_BATCH_SIZE", "0");
        assert_eq!(AppConfig::from_env().geocode_batch_size, 1);

        env::remove_var("DATABASE_FILE_NAME");
        env::remove_var("GEOCODE_BATCH_SIZE");
        env::remove_var("GEOCODE_BATCH_DELAY_MS");
        env::remove_var("MAPBOX_ACCESS_TOKEN");
    }

    #[test]
    fn falls_back_to_defaults() {
        env::remove_var("GEOCODE_LOCALITY_SUFFIX");
        env::remove_var("MAP_SAMPLE_SIZE");
        let config = AppConfig::from_env();
        assert_eq!(config.locality_suffix, DEFAULT_LOCALITY_SUFFIX);
        assert_eq!(config.sample_size, DEFAULT_SAMPLE_SIZE);
        assert_eq!(config.geocoder_api_base, DEFAULT_GEOCODER_API_BASE);
    }
}
