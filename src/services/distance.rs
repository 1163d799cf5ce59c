//! Trip distance resolution.
//!
//! Distances are always kilometers. The remote distance-matrix lookup reports
//! meters, which are converted at the boundary so both sources are comparable.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::error::AppError;

/// Mean Earth radius.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Only a fully known pair is a coordinate.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self::new(latitude, longitude)),
            _ => None,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceSource {
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "road")]
    Road,
    #[serde(rename = "great_circle")]
    GreatCircle,
}

impl DistanceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceSource::Manual => "manual",
            DistanceSource::Road => "road",
            DistanceSource::GreatCircle => "great_circle",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "manual" => Some(DistanceSource::Manual),
            "road" => Some(DistanceSource::Road),
            "great_circle" => Some(DistanceSource::GreatCircle),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DistanceSource::Manual => "entered manually",
            DistanceSource::Road => "road distance",
            DistanceSource::GreatCircle => "straight line",
        }
    }
}

impl fmt::Display for DistanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance {
    pub km: f64,
    pub source: DistanceSource,
}

/// Haversine distance in kilometers.
pub fn great_circle_km(start: Coordinate, finish: Coordinate) -> f64 {
    let lat1 = start.latitude.to_radians();
    let lat2 = finish.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (finish.longitude - start.longitude).to_radians();

    // Rounding can push `a` a hair past 1 for antipodal points.
    let a = ((d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2))
        .clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no distance API key configured")]
    MissingApiKey,
    #[error("distance request failed: {0}")]
    Request(reqwest::Error),
    #[error("distance service answered {0}")]
    Status(String),
    #[error("malformed distance response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for LookupError {
    /// The request URL carries the API key, so it never reaches the message.
    fn from(err: reqwest::Error) -> Self {
        LookupError::Request(err.without_url())
    }
}

/// Remote road-distance source.
#[async_trait]
pub trait DistanceLookup: Send + Sync {
    async fn road_distance_meters(
        &self,
        start: Coordinate,
        finish: Coordinate,
    ) -> Result<u64, LookupError>;
}

/// Client for a Google Distance Matrix compatible endpoint.
pub struct DistanceMatrixClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl DistanceMatrixClient {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| AppError::Config(format!("invalid DISTANCE_API_URL: {err}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    pub fn request_url(&self, start: Coordinate, finish: Coordinate, api_key: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("origins", &start.to_string())
            .append_pair("destinations", &finish.to_string())
            .append_pair("key", api_key);
        url
    }
}

#[async_trait]
impl DistanceLookup for DistanceMatrixClient {
    async fn road_distance_meters(
        &self,
        start: Coordinate,
        finish: Coordinate,
    ) -> Result<u64, LookupError> {
        let api_key = self.api_key.as_deref().ok_or(LookupError::MissingApiKey)?;
        let response = self
            .client
            .get(self.request_url(start, finish, api_key))
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        parse_matrix_response(&body)
    }
}

#[derive(Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Deserialize)]
struct MatrixElement {
    status: String,
    #[serde(default)]
    distance: Option<MatrixValue>,
}

#[derive(Deserialize)]
struct MatrixValue {
    value: u64,
}

/// Extracts `rows[0].elements[0].distance.value` (meters).
pub fn parse_matrix_response(body: &str) -> Result<u64, LookupError> {
    let parsed: MatrixResponse =
        serde_json::from_str(body).map_err(|err| LookupError::Malformed(err.to_string()))?;
    if parsed.status != "OK" {
        let detail = parsed
            .error_message
            .map(|msg| format!("{}: {msg}", parsed.status))
            .unwrap_or(parsed.status);
        return Err(LookupError::Status(detail));
    }
    let element = parsed
        .rows
        .into_iter()
        .next()
        .and_then(|row| row.elements.into_iter().next())
        .ok_or_else(|| LookupError::Malformed("no rows or elements".into()))?;
    if element.status != "OK" {
        return Err(LookupError::Status(element.status));
    }
    element
        .distance
        .map(|distance| distance.value)
        .ok_or_else(|| LookupError::Malformed("element without distance".into()))
}

/// Resolves trip distances: road distance when the lookup answers,
/// great-circle distance otherwise.
#[derive(Clone)]
pub struct DistanceResolver {
    lookup: Option<Arc<dyn DistanceLookup>>,
}

impl DistanceResolver {
    pub fn new(lookup: Arc<dyn DistanceLookup>) -> Self {
        Self {
            lookup: Some(lookup),
        }
    }

    pub fn local_only() -> Self {
        Self { lookup: None }
    }

    pub async fn resolve(
        &self,
        start: Option<Coordinate>,
        finish: Option<Coordinate>,
    ) -> Option<Distance> {
        let (start, finish) = (start?, finish?);

        if let Some(lookup) = &self.lookup {
            match lookup.road_distance_meters(start, finish).await {
                Ok(meters) => {
                    return Some(Distance {
                        km: meters as f64 / 1000.0,
                        source: DistanceSource::Road,
                    })
                }
                Err(LookupError::MissingApiKey) => {
                    debug!("no distance API key, using great-circle distance")
                }
                Err(err) => warn!("distance lookup failed, using great-circle distance: {err}"),
            }
        }

        Some(Distance {
            km: great_circle_km(start, finish),
            source: DistanceSource::GreatCircle,
        })
    }
}
