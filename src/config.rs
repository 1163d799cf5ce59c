use std::{env, net::SocketAddr, time::Duration};

use crate::error::AppError;

pub const DEFAULT_DISTANCE_API_URL: &str =
    "https://maps.googleapis.com/maps/api/distancematrix/json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub cookie_secret: String,
    pub google_api_key: Option<String>,
    pub distance_api_url: String,
    pub distance_timeout: Duration,
    pub price_per_km: f64,
    pub session_ttl_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://triplog.db?mode=rwc".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-trip-log-cookie-secret".to_string());

        let google_api_key = env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let distance_api_url = env::var("DISTANCE_API_URL")
            .unwrap_or_else(|_| DEFAULT_DISTANCE_API_URL.to_string());

        let timeout_secs: u64 = env::var("DISTANCE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid DISTANCE_TIMEOUT_SECS: {err}")))?;

        let price_per_km: f64 = env::var("PRICE_PER_KM")
            .unwrap_or_else(|_| "5.0".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid PRICE_PER_KM: {err}")))?;
        if !price_per_km.is_finite() || price_per_km < 0.0 {
            return Err(AppError::Config(
                "PRICE_PER_KM must be a non-negative number".into(),
            ));
        }

        let session_ttl_hours: i64 = env::var("SESSION_TTL_HOURS")
            .unwrap_or_else(|_| "168".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid SESSION_TTL_HOURS: {err}")))?;

        Ok(Self {
            database_url,
            listen_addr,
            cookie_secret,
            google_api_key,
            distance_api_url,
            distance_timeout: Duration::from_secs(timeout_secs),
            price_per_km,
            session_ttl_hours,
        })
    }
}
