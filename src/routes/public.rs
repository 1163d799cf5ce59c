use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    auth::{self, CurrentUser},
    db,
    error::AppError,
    forms::NewUserForm,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/health", get(health))
        .route("/login", get(login_form).post(login_submit))
        .route("/register", get(register_form).post(register_submit))
        .route("/logout", post(logout))
}

#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate {
    logged_in: bool,
    display_name: String,
}

async fn landing(current: CurrentUser) -> impl IntoResponse {
    AskamaTemplateResponse::into_response(LandingTemplate {
        logged_in: current.0.is_some(),
        display_name: current
            .0
            .map(|user| user.display_name)
            .unwrap_or_default(),
    })
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    show_error: bool,
    error_message: String,
    username: String,
    show_register: bool,
}

async fn login_form(State(state): State<AppState>) -> Result<Response, AppError> {
    let show_register = db::users::count_all(&state.db).await? == 0;
    Ok(AskamaTemplateResponse::into_response(LoginTemplate {
        show_error: false,
        error_message: String::new(),
        username: String::new(),
        show_register,
    }))
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match auth::authenticate_user(&state, &form.username, &form.password).await {
        Ok(user) => {
            let session_id = auth::create_session(&state, user.id).await?;
            info!(username = %user.username, "login");
            Ok((
                auth::apply_session_cookie(jar, &session_id),
                Redirect::to("/me"),
            )
                .into_response())
        }
        Err(AppError::Unauthorized) => {
            warn!(username = %form.username, "failed login");
            Ok(render_login_error(
                form.username,
                "User not found or incorrect password".into(),
            ))
        }
        Err(err) => Err(err),
    }
}

fn render_login_error(username: String, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(LoginTemplate {
            show_error: true,
            error_message: message,
            username,
            show_register: false,
        }),
    )
        .into_response()
}

#[derive(Template)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    show_error: bool,
    error_message: String,
    username: String,
    first_name: String,
    last_name: String,
    email: String,
}

/// Registration only bootstraps the first account; afterwards admins add users.
async fn registration_open(state: &AppState) -> Result<bool, AppError> {
    Ok(db::users::count_all(&state.db).await? == 0)
}

async fn register_form(State(state): State<AppState>) -> Result<Response, AppError> {
    if !registration_open(&state).await? {
        return Ok(Redirect::to("/login").into_response());
    }
    Ok(AskamaTemplateResponse::into_response(RegisterTemplate {
        show_error: false,
        error_message: String::new(),
        username: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
    }))
}

async fn register_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<NewUserForm>,
) -> Result<Response, AppError> {
    if !registration_open(&state).await? {
        return Ok(Redirect::to("/login").into_response());
    }

    let result = match form.clone().validate() {
        Ok(input) => auth::register_user(&state, &input, true).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(user) => {
            let session_id = auth::create_session(&state, user.id).await?;
            Ok((
                auth::apply_session_cookie(jar, &session_id),
                Redirect::to("/me"),
            )
                .into_response())
        }
        Err(AppError::BadRequest(msg) | AppError::Conflict(msg)) => {
            Ok(render_register_error(form, msg))
        }
        Err(err) => Err(err),
    }
}

fn render_register_error(form: NewUserForm, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(RegisterTemplate {
            show_error: true,
            error_message: message,
            username: form.username,
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email,
        }),
    )
        .into_response()
}

async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        auth::destroy_session(&state, cookie.value()).await?;
    }
    Ok((auth::clear_session_cookie(jar), Redirect::to("/login")))
}
