use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::{DateTime, Local, Utc};
use tracing::info;

use crate::{
    auth::{self, CurrentUser},
    db,
    error::AppError,
    forms::NewUserForm,
    models::user::User,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(users_list))
        .route("/users/new", get(user_new_form).post(user_new_submit))
        .route("/users/:id/delete", post(user_delete))
        .route("/trips/:id/delete", post(trip_delete))
}

#[derive(Clone)]
struct AdminUserRow {
    id: i64,
    username: String,
    name: String,
    email: String,
    role: String,
    created_at: String,
    last_login_at: String,
    is_self: bool,
}

#[derive(Template)]
#[template(path = "admin/users_list.html")]
struct AdminUsersTemplate {
    users: Vec<AdminUserRow>,
}

async fn users_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let admin = current.require_admin()?;
    let users = db::users::list_all(&state.db)
        .await?
        .into_iter()
        .map(|user: User| AdminUserRow {
            id: user.id,
            name: user.display_name(),
            role: user.role().to_string(),
            username: user.username,
            email: user.email,
            created_at: format_timestamp(user.created_at),
            last_login_at: user
                .last_login_at
                .map(format_timestamp)
                .unwrap_or_else(|| "–".into()),
            is_self: user.id == admin.id,
        })
        .collect();
    Ok(AskamaTemplateResponse::into_response(AdminUsersTemplate {
        users,
    }))
}

#[derive(Template)]
#[template(path = "admin/user_new.html")]
struct AdminUserNewTemplate {
    show_error: bool,
    error_message: String,
    username: String,
    first_name: String,
    last_name: String,
    email: String,
    is_admin: bool,
}

async fn user_new_form(current: CurrentUser) -> Result<impl IntoResponse, AppError> {
    current.require_admin()?;
    Ok(AskamaTemplateResponse::into_response(AdminUserNewTemplate {
        show_error: false,
        error_message: String::new(),
        username: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
        is_admin: false,
    }))
}

async fn user_new_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<NewUserForm>,
) -> Result<Response, AppError> {
    current.require_admin()?;

    let result = match form.clone().validate() {
        Ok(input) => auth::register_user(&state, &input, input.is_admin).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(_) => Ok(Redirect::to("/admin/users").into_response()),
        Err(AppError::BadRequest(msg) | AppError::Conflict(msg)) => Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(AdminUserNewTemplate {
                show_error: true,
                error_message: msg,
                is_admin: form.is_admin.is_some(),
                username: form.username,
                first_name: form.first_name,
                last_name: form.last_name,
                email: form.email,
            }),
        )
            .into_response()),
        Err(err) => Err(err),
    }
}

async fn user_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<i64>,
) -> Result<Redirect, AppError> {
    let admin = current.require_admin()?;
    if admin.id == user_id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".into(),
        ));
    }
    if !db::users::delete(&state.db, user_id).await? {
        return Err(AppError::NotFound);
    }
    info!(user_id, by = %admin.username, "user deleted");
    Ok(Redirect::to("/admin/users"))
}

async fn trip_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<Redirect, AppError> {
    let admin = current.require_admin()?;
    if !db::trips::delete(&state.db, trip_id).await? {
        return Err(AppError::NotFound);
    }
    info!(trip_id, by = %admin.username, "trip deleted");
    Ok(Redirect::to("/me"))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%d.%m.%Y %H:%M")
        .to_string()
}
