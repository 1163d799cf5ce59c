#![allow(dead_code)]

use std::{fs::File, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use tempfile::TempDir;
use triplog::{
    config::{AppConfig, DEFAULT_DISTANCE_API_URL},
    db::{init_pool, migrate},
    services::distance::{Coordinate, DistanceLookup, DistanceResolver, LookupError},
    state::AppState,
};

/// Lookup that always answers with the same road distance.
pub struct FixedLookup(pub u64);

#[async_trait]
impl DistanceLookup for FixedLookup {
    async fn road_distance_meters(
        &self,
        _start: Coordinate,
        _finish: Coordinate,
    ) -> Result<u64, LookupError> {
        Ok(self.0)
    }
}

/// Lookup standing in for a dead or misbehaving distance service.
pub struct UnreachableLookup;

#[async_trait]
impl DistanceLookup for UnreachableLookup {
    async fn road_distance_meters(
        &self,
        _start: Coordinate,
        _finish: Coordinate,
    ) -> Result<u64, LookupError> {
        Err(LookupError::Status("UNKNOWN_ERROR".into()))
    }
}

pub struct TestState {
    pub app: AppState,
    _root: TempDir,
}

impl TestState {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_lookup(Arc::new(UnreachableLookup)).await
    }

    pub async fn with_lookup(lookup: Arc<dyn DistanceLookup>) -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for test database")?;
        let db_path = root.path().join("triplog.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            cookie_secret: "test-cookie-secret".into(),
            google_api_key: None,
            distance_api_url: DEFAULT_DISTANCE_API_URL.into(),
            distance_timeout: Duration::from_secs(1),
            price_per_km: 5.0,
            session_ttl_hours: 1,
        };

        let db = init_pool(&config.database_url).await?;
        migrate(&db).await?;

        let app = AppState::new(config, db, DistanceResolver::new(lookup));
        Ok(Self { app, _root: root })
    }
}
