use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    config::AppConfig,
    db::DbPool,
    error::AppError,
    services::distance::{DistanceMatrixClient, DistanceResolver},
};

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub distance: DistanceResolver,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, distance: DistanceResolver) -> Self {
        let digest = Sha512::digest(config.cookie_secret.as_bytes());
        let cookie_key = Key::from(&digest[..]);
        Self {
            config,
            db,
            distance,
            cookie_key,
        }
    }

    /// Wires the resolver to the configured distance-matrix endpoint, or to
    /// the great-circle formula alone when no API key is set.
    pub fn with_remote_distance(config: AppConfig, db: DbPool) -> Result<Self, AppError> {
        let distance = if config.google_api_key.is_some() {
            let client = DistanceMatrixClient::new(
                &config.distance_api_url,
                config.google_api_key.clone(),
                config.distance_timeout,
            )?;
            DistanceResolver::new(Arc::new(client))
        } else {
            DistanceResolver::local_only()
        };
        Ok(Self::new(config, db, distance))
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
