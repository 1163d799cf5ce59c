//! Input schemas for every form the app accepts.
//!
//! Each `*Form` mirrors the submitted fields; `validate` turns it into the
//! typed input the database layer works with.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_with::{serde_as, NoneAsEmptyString};

use crate::{error::AppError, services::distance::Coordinate};

pub const MIN_PASSWORD_LEN: usize = 8;

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct NewTripForm {
    pub customer: String,
    pub date: String,
    #[serde(default)]
    pub location: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub report: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTrip {
    pub customer: String,
    pub date: NaiveDateTime,
    pub location: String,
    pub distance_km: Option<f64>,
    pub report: bool,
}

impl NewTripForm {
    pub fn validate(self) -> Result<NewTrip, AppError> {
        let customer = required(&self.customer, "Customer")?;
        let date = parse_trip_date(&self.date)?;
        if let Some(km) = self.distance {
            if !km.is_finite() || km < 0.0 {
                return Err(AppError::BadRequest(
                    "Distance must be a non-negative number".into(),
                ));
            }
        }
        Ok(NewTrip {
            customer,
            date,
            location: self.location.trim().to_string(),
            distance_km: self.distance,
            report: checkbox(self.report.as_deref()),
        })
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripLocationForm {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub start_latitude: Option<f64>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub start_longitude: Option<f64>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub finish_latitude: Option<f64>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub finish_longitude: Option<f64>,
    #[serde(default)]
    pub report: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripLocation {
    pub start: Option<Coordinate>,
    pub finish: Option<Coordinate>,
    pub report: bool,
}

impl TripLocationForm {
    pub fn validate(self) -> Result<TripLocation, AppError> {
        Ok(TripLocation {
            start: coordinate("Start", self.start_latitude, self.start_longitude)?,
            finish: coordinate("Finish", self.finish_latitude, self.finish_longitude)?,
            report: checkbox(self.report.as_deref()),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUserForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub is_admin: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_admin: bool,
}

impl NewUserForm {
    pub fn validate(self) -> Result<NewUser, AppError> {
        let username = required(&self.username, "Username")?;
        if username.chars().any(char::is_whitespace) {
            return Err(AppError::BadRequest(
                "Username must not contain spaces".into(),
            ));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.password != self.password_confirm {
            return Err(AppError::BadRequest("Passwords do not match".into()));
        }
        Ok(NewUser {
            username,
            password: self.password,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            is_admin: checkbox(self.is_admin.as_deref()),
        })
    }
}

/// Accepts a plain day or an HTML `datetime-local` value.
pub fn parse_trip_date(raw: &str) -> Result<NaiveDateTime, AppError> {
    let raw = raw.trim();
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .ok_or_else(|| AppError::BadRequest(format!("Invalid date '{raw}'")))
}

fn required(value: &str, label: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AppError::BadRequest(format!("{label} is required")))
    } else {
        Ok(trimmed.to_string())
    }
}

fn checkbox(value: Option<&str>) -> bool {
    matches!(value, Some("yes" | "on" | "true" | "1"))
}

fn coordinate(
    label: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Option<Coordinate>, AppError> {
    match (latitude, longitude) {
        (None, None) => Ok(None),
        (Some(latitude), Some(longitude)) => {
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(AppError::BadRequest(format!(
                    "{label} latitude must be between -90 and 90"
                )));
            }
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(AppError::BadRequest(format!(
                    "{label} longitude must be between -180 and 180"
                )));
            }
            Ok(Some(Coordinate::new(latitude, longitude)))
        }
        _ => Err(AppError::BadRequest(format!(
            "{label} needs both latitude and longitude"
        ))),
    }
}
