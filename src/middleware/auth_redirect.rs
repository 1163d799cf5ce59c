use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

/// Sends anonymous visitors to the login page and non-admins back to the
/// landing page instead of showing bare 401/403 responses.
pub async fn redirect_unauthorized(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    match response.status() {
        StatusCode::UNAUTHORIZED => Redirect::to("/login").into_response(),
        StatusCode::FORBIDDEN => Redirect::to("/").into_response(),
        _ => response,
    }
}
