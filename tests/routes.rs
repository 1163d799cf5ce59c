mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use tower::ServiceExt;
use triplog::{auth, db, forms::NewUserForm, routes::create_router, state::AppState};
use url::form_urlencoded;

use common::TestState;

struct TestApp {
    router: Router,
    state: AppState,
    _test_state: TestState,
}

impl TestApp {
    async fn spawn() -> Self {
        let test_state = TestState::new().await.expect("test state");
        let state = test_state.app.clone();
        Self {
            router: create_router(state.clone()),
            state,
            _test_state: test_state,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, path: &str, cookie: Option<&str>, fields: &[(&str, &str)]) -> Response {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// Bootstraps the administrator through the registration page.
    async fn bootstrap_admin(&self) -> String {
        let response = self
            .post_form(
                "/register",
                None,
                &[
                    ("username", "boss"),
                    ("password", "correct-horse"),
                    ("password_confirm", "correct-horse"),
                ],
            )
            .await;
        assert_eq!(location(&response), Some("/me"));
        session_cookie(&response).expect("registration logs in")
    }

    async fn create_driver(&self) -> String {
        let input = NewUserForm {
            username: "driver".into(),
            password: "correct-horse".into(),
            password_confirm: "correct-horse".into(),
            ..NewUserForm::default()
        }
        .validate()
        .unwrap();
        auth::register_user(&self.state, &input, false).await.unwrap();

        let response = self
            .post_form(
                "/login",
                None,
                &[("username", "driver"), ("password", "correct-horse")],
            )
            .await;
        assert_eq!(location(&response), Some("/me"));
        session_cookie(&response).expect("login sets a session cookie")
    }
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(auth::SESSION_COOKIE))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

#[tokio::test]
async fn health_returns_ok() {
    let app = TestApp::spawn().await;
    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_visitors_are_sent_to_login() {
    let app = TestApp::spawn().await;
    for path in ["/me", "/me/trips/new", "/admin/users"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), Some("/login"), "{path}");
    }
}

#[tokio::test]
async fn registration_closes_after_the_first_user() {
    let app = TestApp::spawn().await;
    assert_eq!(app.get("/register", None).await.status(), StatusCode::OK);

    app.bootstrap_admin().await;

    let response = app.get("/register", None).await;
    assert_eq!(location(&response), Some("/login"));

    let response = app
        .post_form(
            "/register",
            None,
            &[
                ("username", "intruder"),
                ("password", "correct-horse"),
                ("password_confirm", "correct-horse"),
            ],
        )
        .await;
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(db::users::count_all(&app.state.db).await.unwrap(), 1);

    let boss = db::users::find_by_username(&app.state.db, "boss")
        .await
        .unwrap()
        .unwrap();
    assert!(boss.is_admin);
}

#[tokio::test]
async fn wrong_password_shows_the_form_again() {
    let app = TestApp::spawn().await;
    app.bootstrap_admin().await;

    let response = app
        .post_form(
            "/login",
            None,
            &[("username", "boss"), ("password", "wrong-horse")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn unknown_and_wrong_credentials_look_the_same() {
    let app = TestApp::spawn().await;
    app.bootstrap_admin().await;

    for (username, password) in [("boss", "wrong-horse"), ("nobody", "correct-horse")] {
        let response = app
            .post_form("/login", None, &[("username", username), ("password", password)])
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(session_cookie(&response).is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("User not found or incorrect password"), "{body}");
    }
}

#[tokio::test]
async fn admin_pages_reject_regular_users_every_time() {
    let app = TestApp::spawn().await;
    app.bootstrap_admin().await;
    let driver = app.create_driver().await;
    let boss = db::users::find_by_username(&app.state.db, "boss")
        .await
        .unwrap()
        .unwrap();

    for _ in 0..2 {
        let response = app.get("/admin/users", Some(&driver)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/"));

        let response = app
            .post_form(&format!("/admin/users/{}/delete", boss.id), Some(&driver), &[])
            .await;
        assert_eq!(location(&response), Some("/"));
    }

    assert_eq!(db::users::count_all(&app.state.db).await.unwrap(), 2);
}

#[tokio::test]
async fn admin_manages_users() {
    let app = TestApp::spawn().await;
    let boss = app.bootstrap_admin().await;

    assert_eq!(
        app.get("/admin/users", Some(&boss)).await.status(),
        StatusCode::OK
    );

    let response = app
        .post_form(
            "/admin/users/new",
            Some(&boss),
            &[
                ("username", "driver"),
                ("password", "correct-horse"),
                ("password_confirm", "correct-horse"),
            ],
        )
        .await;
    assert_eq!(location(&response), Some("/admin/users"));

    let response = app
        .post_form(
            "/admin/users/new",
            Some(&boss),
            &[
                ("username", "driver"),
                ("password", "correct-horse"),
                ("password_confirm", "correct-horse"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let driver = db::users::find_by_username(&app.state.db, "driver")
        .await
        .unwrap()
        .unwrap();
    assert!(!driver.is_admin);

    let response = app
        .post_form(&format!("/admin/users/{}/delete", driver.id), Some(&boss), &[])
        .await;
    assert_eq!(location(&response), Some("/admin/users"));
    assert_eq!(db::users::count_all(&app.state.db).await.unwrap(), 1);
}

#[tokio::test]
async fn users_only_see_their_own_trips() {
    let app = TestApp::spawn().await;
    let boss = app.bootstrap_admin().await;
    let driver = app.create_driver().await;

    let response = app
        .post_form(
            "/me/trips/new",
            Some(&boss),
            &[
                ("customer", "ACME"),
                ("date", "2024-03-05"),
                ("location", "Warsaw"),
                ("distance", ""),
            ],
        )
        .await;
    assert_eq!(location(&response), Some("/me"));

    let owner = db::users::find_by_username(&app.state.db, "boss")
        .await
        .unwrap()
        .unwrap();
    let trips = db::trips::list_for_user(&app.state.db, owner.id)
        .await
        .unwrap();
    assert_eq!(trips.len(), 1);
    let trip_id = trips[0].trip.id;
    assert_eq!(trips[0].trip.distance_km, None);

    let response = app.get(&format!("/me/trips/{trip_id}"), Some(&driver)).await;
    assert_eq!(location(&response), Some("/"));

    let response = app
        .post_form(
            &format!("/me/trips/{trip_id}"),
            Some(&boss),
            &[
                ("start_latitude", "0"),
                ("start_longitude", "0"),
                ("finish_latitude", "0"),
                ("finish_longitude", "1"),
                ("report", "yes"),
            ],
        )
        .await;
    assert_eq!(location(&response), Some("/me"));

    let trip = db::trips::find_with_owner(&app.state.db, trip_id)
        .await
        .unwrap()
        .unwrap()
        .trip;
    assert!(trip.report);
    let km = trip.distance_km.unwrap();
    assert!((km - 111.19).abs() < 0.01, "got {km}");

    let response = app
        .post_form(&format!("/admin/trips/{trip_id}/delete"), Some(&driver), &[])
        .await;
    assert_eq!(location(&response), Some("/"));

    let response = app
        .post_form(&format!("/admin/trips/{trip_id}/delete"), Some(&boss), &[])
        .await;
    assert_eq!(location(&response), Some("/me"));
    assert!(db::trips::find_with_owner(&app.state.db, trip_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::spawn().await;
    let boss = app.bootstrap_admin().await;
    assert_eq!(app.get("/me", Some(&boss)).await.status(), StatusCode::OK);

    let response = app.post_form("/logout", Some(&boss), &[]).await;
    assert_eq!(location(&response), Some("/login"));

    let response = app.get("/me", Some(&boss)).await;
    assert_eq!(location(&response), Some("/login"));
}
