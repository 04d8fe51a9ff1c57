use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::store::Coordinates;

const HTTP_TIMEOUT_SECS: u64 = 10;

#[async_trait]
pub trait GeocodeLookup: Send + Sync {
    /// `Ok(None)` means the provider had no candidates. Transport and
    /// parse failures surface as errors for [`GeocoderService`] to
    /// contain.
    async fn locate(&self, address: &str) -> AppResult<Option<Coordinates>>;
}

/// Best-effort address resolution. Failures never escape `resolve`; an
/// unresolvable address stays ungeocoded and the caller decides the
/// fallback.
#[derive(Clone)]
pub struct GeocoderService {
    inner: Arc<dyn GeocodeLookup>,
}

impl GeocoderService {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            inner: Arc::new(MapboxGeocoder::new(config)?),
        })
    }

    pub fn from_lookup(lookup: Arc<dyn GeocodeLookup>) -> Self {
        Self { inner: lookup }
    }

    pub async fn resolve(&self, address: &str) -> Option<Coordinates> {
        match self.inner.locate(address).await {
            Ok(Some(coordinates)) => Some(coordinates),
            Ok(None) => {
                debug!(address, "geocoder returned no candidates");
                None
            }
            Err(err) => {
                warn!(?err, address, "geocoding lookup failed; treating as unresolved");
                None
            }
        }
    }
}

pub struct MapboxGeocoder {
    http: Client,
    api_base: Url,
    locality_suffix: String,
    access_token: SecretString,
}

impl MapboxGeocoder {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let access_token = config.mapbox_access_token.clone().ok_or_else(|| {
            AppError::Config("MAPBOX_ACCESS_TOKEN must be set for geocoding".into())
        })?;
        let api_base = Url::parse(&config.geocoder_api_base)
            .map_err(|err| AppError::Config(format!("invalid geocoder API base URL: {err}")))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api_base,
            locality_suffix: config.locality_suffix.clone(),
            access_token,
        })
    }

    // {base}/{query, locality}.json?access_token=...&limit=1
    fn request_url(&self, address: &str) -> AppResult<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config("invalid geocoder API base".into()))?
            .push(&format!("{address}, {}.json", self.locality_suffix));
        url.query_pairs_mut()
            .append_pair("access_token", self.access_token.expose_secret())
            .append_pair("limit", "1");
        Ok(url)
    }
}

#[async_trait]
impl GeocodeLookup for MapboxGeocoder {
    async fn locate(&self, address: &str) -> AppResult<Option<Coordinates>> {
        #[derive(Deserialize)]
        struct GeocodeResponse {
            #[serde(default)]
            features: Vec<GeocodeFeature>,
        }

        #[derive(Deserialize)]
        struct GeocodeFeature {
            center: Option<Vec<f64>>,
        }

        let url = self.request_url(address)?;
        let response = self.http.get(url).send().await?.error_for_status()?;
        let parsed: GeocodeResponse = response.json().await?;

        let Some(feature) = parsed.features.into_iter().next() else {
            return Ok(None);
        };
        let Some(center) = feature.center else {
            return Ok(None);
        };
        if center.len() < 2 {
            return Ok(None);
        }

        let coordinates = Coordinates::new(center[0], center[1]);
        Ok(coordinates.is_finite().then_some(coordinates))
    }
}
