use async_trait::async_trait;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;

/// JSON request body whose rejections render as `AppError`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

/// Path parameters whose rejections render as `AppError`.
#[derive(Debug, Clone, Copy)]
pub struct PathParam<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection.body_text(), "rejected request body");
        AppError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            // A segment that is not a valid id cannot name an existing resource.
            PathRejection::FailedToDeserializePathParams(err) => {
                debug!(error = %err.body_text(), "rejected path segment");
                AppError::not_found("Not found")
            }
            other => AppError::Internal(anyhow::anyhow!(other.body_text())),
        }
    }
}

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

#[async_trait]
impl<S, T> FromRequestParts<S> for PathParam<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(value) =
            axum::extract::Path::<T>::from_request_parts(parts, state).await?;
        Ok(PathParam(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, StatusCode},
        response::IntoResponse,
    };
    use serde::Deserialize;
    use uuid::Uuid;

    use crate::recipes::dto::CreateRecipeRequest;

    fn json_request(body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/recipes")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn error_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    #[tokio::test]
    async fn unknown_enum_value_is_a_validation_error() {
        let body = r#"{"title":"Soup","difficulty":"extreme","food_type":"soup"}"#;
        let err = JsonBody::<CreateRecipeRequest>::from_request(json_request(body), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let (status, json) = error_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
        assert!(json["detail"].as_str().unwrap().contains("extreme"));
    }

    #[tokio::test]
    async fn missing_field_and_bad_syntax_are_validation_errors() {
        let err = JsonBody::<Named>::from_request(json_request("{}"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = JsonBody::<Named>::from_request(json_request("{\"name\":"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_content_type_is_a_validation_error() {
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/recipes")
            .body(Body::from("{\"name\":\"x\"}"))
            .unwrap();
        let err = JsonBody::<Named>::from_request(req, &()).await.unwrap_err();
        let (_, json) = error_json(err).await;
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn well_formed_body_passes_through() {
        let JsonBody(named) = JsonBody::<Named>::from_request(json_request(r#"{"name":"x"}"#), &())
            .await
            .unwrap();
        assert_eq!(named.name, "x");
    }

    #[tokio::test]
    async fn path_rejection_renders_as_json_error() {
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/recipes/not-a-uuid")
            .body(())
            .unwrap()
            .into_parts();
        let err = PathParam::<Uuid>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        let (_, json) = error_json(err).await;
        assert!(json["error"].is_string());
        assert!(json["detail"].is_string());
    }
}
