// ViewerContext Extractor - hands the request's viewer to handlers

use crate::infrastructure::viewer::ViewerContext;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use std::sync::Arc;

/// Cheap-to-clone handle on the request's `ViewerContext`.
///
/// Derefs to `ViewerContext`, so handlers use it like a reference:
/// `vc.user_id()`, `vc.require_authenticated()?`.
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        // Missing only when the middleware was not layered onto the route
        let vc = parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(vc.clone()))
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR);

        async move { vc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_extracts_from_extensions() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(Arc::new(ViewerContext::user(5, "test-request".to_string())));
        let (mut parts, _) = request.into_parts();

        let vc = Vc::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(vc.user_id(), Some(5));
        assert_eq!(vc.request_id, "test-request");
    }

    #[tokio::test]
    async fn test_missing_viewer_is_rejected() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let result = Vc::from_request_parts(&mut parts, &()).await;
        assert_eq!(result.unwrap_err(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
