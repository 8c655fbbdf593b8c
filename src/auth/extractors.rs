use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;
use crate::error::AppError;

/// Authenticated caller. Rejects the request when no valid access token is present.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

/// Caller identity when the endpoint also serves anonymous users.
/// A missing header means anonymous; a present but invalid one is still rejected.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthUser(pub Option<Uuid>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AppError::unauthorized("Invalid Authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(Some)
        .ok_or_else(|| AppError::unauthorized("Invalid Authorization header"))
}

fn authenticate(keys: &JwtKeys, token: &str) -> Result<Uuid, AppError> {
    keys.verify_access(token).map(|c| c.sub).map_err(|e| {
        warn!(error = %e, "rejected bearer token");
        AppError::unauthorized("Invalid or expired token")
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;
        let keys = JwtKeys::from_ref(state);
        Ok(AuthUser(authenticate(&keys, token)?))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            None => Ok(MaybeAuthUser(None)),
            Some(token) => {
                let keys = JwtKeys::from_ref(state);
                Ok(MaybeAuthUser(Some(authenticate(&keys, token)?)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::Request;

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/recipes");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn anonymous_when_header_missing() {
        let state = AppState::fake();
        let mut parts = parts_with(None);
        let MaybeAuthUser(user) = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(user.is_none());

        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn valid_access_token_identifies_user() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();
        let token = JwtKeys::from_ref(&state).sign_access(user_id).unwrap();
        let header = format!("Bearer {token}");

        let mut parts = parts_with(Some(&header));
        let AuthUser(id) = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(id, user_id);

        let mut parts = parts_with(Some(&header));
        let MaybeAuthUser(id) = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(id, Some(user_id));
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_even_for_optional_auth() {
        let state = AppState::fake();
        let mut parts = parts_with(Some("Bearer not-a-jwt"));
        let err = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let mut parts = parts_with(Some("Token abc"));
        let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_refresh(Uuid::new_v4()).unwrap();
        let header = format!("Bearer {token}");
        let mut parts = parts_with(Some(&header));
        assert!(AuthUser::from_request_parts(&mut parts, &state).await.is_err());
    }
}
