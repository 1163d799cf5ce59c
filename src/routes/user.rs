use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use chrono::Local;
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::{AuthenticatedUser, CurrentUser},
    db,
    error::AppError,
    forms::{NewTripForm, TripLocationForm},
    models::trip::TripWithOwner,
    services::billing::{self, ReportPeriod},
    state::AppState,
};

use super::{format_km, format_money, format_trip_date};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(calendar))
        .route("/trips/new", get(trip_new_form).post(trip_new_submit))
        .route("/trips/:id", get(trip_detail).post(trip_location_submit))
}

#[derive(Clone)]
struct TripRow {
    id: i64,
    date: String,
    customer: String,
    location: String,
    owner: String,
    distance: String,
    source: String,
    report: bool,
}

impl From<&TripWithOwner> for TripRow {
    fn from(row: &TripWithOwner) -> Self {
        Self {
            id: row.trip.id,
            date: format_trip_date(row.trip.date),
            customer: row.trip.customer.clone(),
            location: row.trip.location.clone(),
            owner: row.owner_username.clone(),
            distance: format_km(row.trip.distance_km),
            source: row
                .trip
                .source()
                .map(|source| source.label().to_string())
                .unwrap_or_default(),
            report: row.trip.report,
        }
    }
}

#[derive(Template)]
#[template(path = "user/calendar.html")]
struct CalendarTemplate {
    display_name: String,
    is_admin: bool,
    month: String,
    trips: Vec<TripRow>,
    trip_count: usize,
    total_distance: String,
    total_price: String,
    reported_distance: String,
    reported_price: String,
}

#[derive(Deserialize)]
struct CalendarQuery {
    month: Option<String>,
}

/// Admins see every trip of the selected month, everyone else their own trips.
async fn calendar(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<CalendarQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;

    let period = match query.month.as_deref().filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => ReportPeriod::parse(raw)?,
        None => ReportPeriod::containing(Local::now().date_naive()),
    };

    let trips = if user.is_admin() {
        let (from, until) = period
            .bounds()
            .ok_or_else(|| AppError::BadRequest("month out of range".into()))?;
        db::trips::list_between(&state.db, from, until).await?
    } else {
        db::trips::list_for_user(&state.db, user.id).await?
    };

    let summary = billing::summarize(&trips, state.config.price_per_km);
    Ok(AskamaTemplateResponse::into_response(CalendarTemplate {
        display_name: user.display_name.clone(),
        is_admin: user.is_admin(),
        month: period.as_input_value(),
        trips: trips.iter().map(TripRow::from).collect(),
        trip_count: summary.trip_count,
        total_distance: format_km(Some(summary.total_distance_km)),
        total_price: format_money(summary.total_price),
        reported_distance: format_km(Some(summary.reported_distance_km)),
        reported_price: format_money(summary.reported_price),
    }))
}

#[derive(Template)]
#[template(path = "user/trip_new.html")]
struct TripNewTemplate {
    show_error: bool,
    error_message: String,
    customer: String,
    date: String,
    location: String,
    distance: String,
}

async fn trip_new_form(current: CurrentUser) -> Result<impl IntoResponse, AppError> {
    current.require_user()?;
    Ok(AskamaTemplateResponse::into_response(TripNewTemplate {
        show_error: false,
        error_message: String::new(),
        customer: String::new(),
        date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
        location: String::new(),
        distance: String::new(),
    }))
}

async fn trip_new_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<NewTripForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let input = match form.clone().validate() {
        Ok(input) => input,
        Err(AppError::BadRequest(msg)) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                AskamaTemplateResponse::into_response(TripNewTemplate {
                    show_error: true,
                    error_message: msg,
                    customer: form.customer,
                    date: form.date,
                    location: form.location,
                    distance: form.distance.map(|km| km.to_string()).unwrap_or_default(),
                }),
            )
                .into_response())
        }
        Err(err) => return Err(err),
    };

    let trip = db::trips::create(&state.db, user.id, &input).await?;
    info!(trip_id = trip.id, user = %user.username, "trip created");
    Ok(Redirect::to("/me").into_response())
}

#[derive(Template)]
#[template(path = "user/trip_detail.html")]
struct TripDetailTemplate {
    show_error: bool,
    error_message: String,
    is_admin: bool,
    trip: TripRow,
    start_latitude: String,
    start_longitude: String,
    finish_latitude: String,
    finish_longitude: String,
}

fn coordinate_text(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Owners may view their own trips, admins any trip.
async fn load_visible_trip(
    state: &AppState,
    user: &AuthenticatedUser,
    trip_id: i64,
) -> Result<TripWithOwner, AppError> {
    let trip = db::trips::find_with_owner(&state.db, trip_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if trip.trip.user_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(trip)
}

fn render_trip_detail(
    user: &AuthenticatedUser,
    trip: &TripWithOwner,
    error: Option<String>,
) -> Response {
    let status = if error.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (
        status,
        AskamaTemplateResponse::into_response(TripDetailTemplate {
            show_error: error.is_some(),
            error_message: error.unwrap_or_default(),
            is_admin: user.is_admin(),
            trip: TripRow::from(trip),
            start_latitude: coordinate_text(trip.trip.start_latitude),
            start_longitude: coordinate_text(trip.trip.start_longitude),
            finish_latitude: coordinate_text(trip.trip.finish_latitude),
            finish_longitude: coordinate_text(trip.trip.finish_longitude),
        }),
    )
        .into_response()
}

async fn trip_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trip = load_visible_trip(&state, user, trip_id).await?;
    Ok(render_trip_detail(user, &trip, None))
}

async fn trip_location_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
    Form(form): Form<TripLocationForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trip = load_visible_trip(&state, user, trip_id).await?;

    let location = match form.validate() {
        Ok(location) => location,
        Err(AppError::BadRequest(msg)) => return Ok(render_trip_detail(user, &trip, Some(msg))),
        Err(err) => return Err(err),
    };

    let distance = state
        .distance
        .resolve(location.start, location.finish)
        .await;
    db::trips::update_location(&state.db, trip_id, &location, distance)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(
        trip_id,
        distance_km = distance.map(|d| d.km),
        source = distance.map(|d| d.source.as_str()),
        "trip location updated"
    );
    Ok(Redirect::to("/me").into_response())
}
