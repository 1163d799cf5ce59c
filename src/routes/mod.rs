pub mod admin;
pub mod public;
pub mod user;

use axum::{middleware, Router};
use chrono::{NaiveDateTime, Timelike};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{middleware::auth_redirect::redirect_unauthorized, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .nest("/me", user::router())
        .nest("/admin", admin::router())
        .nest_service("/static", ServeDir::new("static"))
        .layer(middleware::from_fn(redirect_unauthorized))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn format_km(km: Option<f64>) -> String {
    km.map(|km| format!("{km:.2} km"))
        .unwrap_or_else(|| "–".into())
}

fn format_money(amount: f64) -> String {
    format!("{amount:.2}")
}

fn format_trip_date(date: NaiveDateTime) -> String {
    if date.hour() == 0 && date.minute() == 0 && date.second() == 0 {
        date.format("%d.%m.%Y").to_string()
    } else {
        date.format("%d.%m.%Y %H:%M").to_string()
    }
}
