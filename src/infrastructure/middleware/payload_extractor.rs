// JSON body extractor whose rejections come back as `AppError`

use crate::error::AppError;
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

/// `Json<T>` for request bodies; malformed bodies become `BadPayload`
#[derive(Debug, Clone)]
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, StatusCode},
        response::IntoResponse,
    };
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        nodes: Vec<i64>,
    }

    fn json_request(body: &'static str) -> Request {
        axum::http::Request::builder()
            .method("PUT")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_well_formed_body_is_extracted() {
        let AppJson(payload) = AppJson::<Payload>::from_request(json_request(r#"{"nodes":[1,2]}"#), &())
            .await
            .unwrap();
        assert_eq!(payload.nodes, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_bad_payload() {
        let err = AppJson::<Payload>::from_request(json_request(r#"{"nodes":"x"}"#), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadPayload(_)));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], 400);
        assert!(value["error"].is_string());
    }

    #[tokio::test]
    async fn test_syntax_error_and_missing_content_type_are_bad_payload() {
        let broken = AppJson::<Payload>::from_request(json_request("{\"nodes\":"), &()).await;
        assert!(matches!(broken, Err(AppError::BadPayload(_))));

        let untyped = axum::http::Request::builder()
            .method("PUT")
            .body(Body::from(r#"{"nodes":[]}"#))
            .unwrap();
        let result = AppJson::<Payload>::from_request(untyped, &()).await;
        assert!(matches!(result, Err(AppError::BadPayload(_))));
    }
}
