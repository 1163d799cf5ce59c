use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::{
    db,
    error::AppError,
    forms::NewUser,
    models::user::{User, UserRole},
    state::AppState,
};

pub const SESSION_COOKIE: &str = "triplog_session";

/// Verified against when the username is unknown so both failures cost one
/// Argon2id run with the same parameters as stored hashes.
const UNKNOWN_USER_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name(),
            role: user.role(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Self(Some(user.clone())));
        }

        let jar = PrivateCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };

        let user = load_session_user(state, cookie.value()).await?;
        if let Some(user) = &user {
            parts.extensions.insert(user.clone());
        }
        Ok(Self(user))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }

    pub fn require_admin(&self) -> Result<&AuthenticatedUser, AppError> {
        let user = self.require_user()?;
        if user.is_admin() {
            Ok(user)
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Argon2id, 19 MiB memory, 2 iterations, parallelism 1.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let params = Params::new(19 * 1024, 2, 1, None)
        .map_err(|err| AppError::Other(anyhow!("invalid argon2 params: {err}")))?;
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Other(anyhow!("password hashing failed: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| AppError::Other(anyhow!("stored password hash is invalid: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub async fn register_user(
    state: &AppState,
    input: &NewUser,
    is_admin: bool,
) -> Result<User, AppError> {
    const TAKEN: &str = "This username is already taken";

    if db::users::find_by_username(&state.db, &input.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(TAKEN.into()));
    }

    let password_hash = hash_password(&input.password)?;
    let user = db::users::create(&state.db, input, &password_hash, is_admin)
        .await
        .map_err(|err| AppError::unique_violation(err, TAKEN))?;
    info!(username = %user.username, admin = user.is_admin, "user created");
    Ok(user)
}

/// Unknown usernames and wrong passwords are indistinguishable to the caller.
pub async fn authenticate_user(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let Some(user) = db::users::find_by_username(&state.db, username.trim()).await? else {
        debug!(username, "login for unknown user");
        let _ = verify_password(password, UNKNOWN_USER_HASH);
        return Err(AppError::Unauthorized);
    };
    if !verify_password(password, &user.password_hash)? {
        debug!(username, "login with wrong password");
        return Err(AppError::Unauthorized);
    }
    db::users::touch_last_login(&state.db, user.id).await?;
    Ok(user)
}

pub async fn create_session(state: &AppState, user_id: i64) -> Result<String, AppError> {
    let ttl = Duration::hours(state.config.session_ttl_hours);
    let session = db::sessions::create(&state.db, user_id, ttl).await?;
    Ok(session.id)
}

pub async fn destroy_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    db::sessions::delete(&state.db, session_id).await?;
    Ok(())
}

pub async fn load_session_user(
    state: &AppState,
    session_id: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let Some(session) = db::sessions::find(&state.db, session_id).await? else {
        return Ok(None);
    };
    let now = Utc::now();
    if session.is_expired(now) {
        let purged = db::sessions::delete_expired(&state.db, now).await?;
        debug!(purged, "expired sessions removed");
        return Ok(None);
    }
    let Some(user) = db::users::find_by_id(&state.db, session.user_id).await? else {
        return Ok(None);
    };
    db::sessions::touch(&state.db, &session.id).await?;
    Ok(Some(AuthenticatedUser::from(&user)))
}

pub fn apply_session_cookie(jar: PrivateCookieJar, session_id: &str) -> PrivateCookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, session_id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct-horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct-horse", &hash).unwrap());
        assert!(!verify_password("wrong-horse", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_user_hash_never_matches() {
        let parsed = PasswordHash::new(UNKNOWN_USER_HASH).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        assert_eq!(Params::try_from(&parsed).unwrap().m_cost(), 19 * 1024);
        assert!(!verify_password("", UNKNOWN_USER_HASH).unwrap());
        assert!(!verify_password("correct-horse", UNKNOWN_USER_HASH).unwrap());
    }

    #[test]
    fn non_admin_is_forbidden_from_admin_areas() {
        let current = CurrentUser(Some(AuthenticatedUser {
            id: 1,
            username: "driver".into(),
            display_name: "driver".into(),
            role: UserRole::User,
        }));
        assert!(current.require_user().is_ok());
        assert!(matches!(current.require_admin(), Err(AppError::Forbidden)));
        assert!(matches!(
            CurrentUser::default().require_user(),
            Err(AppError::Unauthorized)
        ));
    }
}
