use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::services::{
    billing::Billable,
    distance::{Coordinate, DistanceSource},
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: i64,
    pub user_id: i64,
    pub customer: String,
    pub date: NaiveDateTime,
    pub location: String,
    pub distance_km: Option<f64>,
    pub distance_source: Option<String>,
    pub report: bool,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub finish_latitude: Option<f64>,
    pub finish_longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    pub fn start(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.start_latitude, self.start_longitude)
    }

    pub fn finish(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.finish_latitude, self.finish_longitude)
    }

    pub fn source(&self) -> Option<DistanceSource> {
        self.distance_source.as_deref().and_then(DistanceSource::parse)
    }
}

impl Billable for Trip {
    fn distance_km(&self) -> Option<f64> {
        self.distance_km
    }

    fn is_reported(&self) -> bool {
        self.report
    }
}

/// A trip joined with its owner's username, for listings.
#[derive(Debug, Clone, FromRow)]
pub struct TripWithOwner {
    #[sqlx(flatten)]
    pub trip: Trip,
    pub owner_username: String,
}

impl Billable for TripWithOwner {
    fn distance_km(&self) -> Option<f64> {
        self.trip.distance_km
    }

    fn is_reported(&self) -> bool {
        self.trip.report
    }
}
