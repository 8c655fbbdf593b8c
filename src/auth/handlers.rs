use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{check_new_password, hash_password, verify_password},
        repo_types::{NewUser, User},
    },
    error::{AppError, AppResult},
    extract::JsonBody,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.\-]{3,150}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

/// Trims optional profile text and drops it when blank.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn issue_tokens(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(mut payload): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    payload.username = payload.username.trim().to_string();
    let email = non_blank(&payload.email).map(str::to_lowercase);

    if !is_valid_username(&payload.username) {
        warn!("invalid username");
        return Err(AppError::validation("Invalid username"));
    }
    if let Some(email) = email.as_deref() {
        if !is_valid_email(email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::validation("Invalid email"));
        }
    }
    if let Err(reason) = check_new_password(&payload.password, &payload.password_confirm) {
        warn!(reason, "password rejected");
        return Err(AppError::validation(reason));
    }

    if User::find_by_username(&state.db, &payload.username).await?.is_some() {
        warn!("username already registered");
        return Err(AppError::Conflict("Username already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        &NewUser {
            username: &payload.username,
            email: email.as_deref(),
            password_hash: &hash,
            first_name: non_blank(&payload.first_name),
            last_name: non_blank(&payload.last_name),
            bio: non_blank(&payload.bio),
        },
    )
    .await?;

    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let Some(user) = User::find_by_username(&state.db, payload.username.trim()).await? else {
        warn!("login unknown username");
        return Err(AppError::unauthorized("Invalid credentials"));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    info!(user_id = %user.id, "user logged in");
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let claims = JwtKeys::from_ref(&state)
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;
    Ok(Json(PublicUser::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("cook@example.com"));
        assert!(!is_valid_email("cook@example"));
        assert!(!is_valid_email("co ok@example.com"));
    }

    #[test]
    fn username_validation() {
        assert!(is_valid_username("jane_smith"));
        assert!(is_valid_username("j.doe-2"));
        assert!(!is_valid_username("jo"));
        assert!(!is_valid_username("has space"));
    }

    #[test]
    fn blank_profile_fields_are_dropped() {
        assert_eq!(non_blank(&Some("  ".into())), None);
        assert_eq!(non_blank(&Some(" Chef ".into())), Some("Chef"));
        assert_eq!(non_blank(&None), None);
    }

    #[test]
    fn public_user_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            username: "jane".into(),
            email: Some("jane@example.com".into()),
            password_hash: "$argon2id$secret".into(),
            first_name: None,
            last_name: None,
            bio: Some("Pastry lover".into()),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("jane@example.com"));
        assert!(json.contains("date_joined"));
        assert!(!json.contains("argon2"));
    }
}
