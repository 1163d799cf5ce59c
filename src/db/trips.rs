use chrono::{NaiveDateTime, Utc};

use crate::{
    db::DbPool,
    forms::{NewTrip, TripLocation},
    models::trip::{Trip, TripWithOwner},
    services::distance::{Distance, DistanceSource},
};

const WITH_OWNER: &str =
    "SELECT trips.*, users.username AS owner_username FROM trips JOIN users ON users.id = trips.user_id";

pub async fn create(pool: &DbPool, user_id: i64, input: &NewTrip) -> Result<Trip, sqlx::Error> {
    let source = input.distance_km.map(|_| DistanceSource::Manual.as_str());
    sqlx::query_as::<_, Trip>(
        "INSERT INTO trips (user_id, customer, date, location, distance_km, distance_source, report, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) RETURNING *",
    )
    .bind(user_id)
    .bind(&input.customer)
    .bind(input.date)
    .bind(&input.location)
    .bind(input.distance_km)
    .bind(source)
    .bind(input.report)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}

pub async fn find_with_owner(pool: &DbPool, id: i64) -> Result<Option<TripWithOwner>, sqlx::Error> {
    sqlx::query_as::<_, TripWithOwner>(&format!("{WITH_OWNER} WHERE trips.id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_for_user(pool: &DbPool, user_id: i64) -> Result<Vec<TripWithOwner>, sqlx::Error> {
    sqlx::query_as::<_, TripWithOwner>(&format!(
        "{WITH_OWNER} WHERE trips.user_id = ?1 ORDER BY trips.date DESC, trips.id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Trips dated within `[from, until)`.
pub async fn list_between(
    pool: &DbPool,
    from: NaiveDateTime,
    until: NaiveDateTime,
) -> Result<Vec<TripWithOwner>, sqlx::Error> {
    sqlx::query_as::<_, TripWithOwner>(&format!(
        "{WITH_OWNER} WHERE trips.date >= ?1 AND trips.date < ?2 ORDER BY trips.date DESC, trips.id DESC"
    ))
    .bind(from)
    .bind(until)
    .fetch_all(pool)
    .await
}

/// Stores new endpoints and the report flag. Without a resolved distance a
/// manually entered distance is kept, while one derived from the previous
/// coordinates is cleared.
pub async fn update_location(
    pool: &DbPool,
    id: i64,
    location: &TripLocation,
    distance: Option<Distance>,
) -> Result<Option<Trip>, sqlx::Error> {
    sqlx::query_as::<_, Trip>(
        "UPDATE trips SET
            start_latitude = ?1,
            start_longitude = ?2,
            finish_latitude = ?3,
            finish_longitude = ?4,
            report = ?5,
            distance_km = CASE
                WHEN ?6 IS NOT NULL THEN ?6
                WHEN distance_source = 'manual' THEN distance_km
                ELSE NULL
            END,
            distance_source = CASE
                WHEN ?7 IS NOT NULL THEN ?7
                WHEN distance_source = 'manual' THEN distance_source
                ELSE NULL
            END
         WHERE id = ?8 RETURNING *",
    )
    .bind(location.start.map(|c| c.latitude))
    .bind(location.start.map(|c| c.longitude))
    .bind(location.finish.map(|c| c.latitude))
    .bind(location.finish.map(|c| c.longitude))
    .bind(location.report)
    .bind(distance.map(|d| d.km))
    .bind(distance.map(|d| d.source.as_str()))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM trips WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
