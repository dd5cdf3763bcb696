// ViewerContext Middleware - turns the bearer token into a request-scoped viewer
// Token issuance lives elsewhere; this layer only verifies and reads `user_id`

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::infrastructure::viewer::ViewerContext;

/// Claims carried by editor tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    #[serde(default)]
    pub exp: Option<u64>,
}

/// HS256 verifier for caller tokens
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    dev_auth_bypass: bool,
}

impl TokenVerifier {
    pub fn new(secret: &str, dev_auth_bypass: bool) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            dev_auth_bypass,
        }
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        if let Some(exp) = token_data.claims.exp {
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            if exp < now {
                return Err(AppError::Unauthorized("Token expired".to_string()));
            }
        }
        Ok(token_data.claims)
    }

    /// Build the viewer for a request from its headers.
    ///
    /// Invalid or expired credentials fall back to an anonymous viewer, so
    /// public routes keep working; editor routes refuse anonymous viewers.
    pub fn viewer_for(&self, headers: &HeaderMap) -> ViewerContext {
        let request_id = format!("req-{}", Uuid::new_v4());
        if self.dev_auth_bypass {
            return ViewerContext::system(request_id);
        }

        match self.caller_for(headers, &request_id) {
            Ok(viewer) => viewer,
            Err(err) => {
                tracing::warn!(request_id = %request_id, error = %err, "Ignoring invalid credentials");
                ViewerContext::anonymous(request_id)
            }
        }
    }

    fn caller_for(&self, headers: &HeaderMap, request_id: &str) -> AppResult<ViewerContext> {
        let Some(value) = headers.get("authorization") else {
            return Ok(ViewerContext::anonymous(request_id.to_string()));
        };
        let value = value
            .to_str()
            .map_err(|_| AppError::Unauthorized("Malformed authorization header".to_string()))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Expected a bearer token".to_string()))?;

        let claims = self.verify(token.trim())?;
        Ok(ViewerContext::user(claims.user_id, request_id.to_string()))
    }
}

/// Application state that can verify caller tokens
pub trait HasTokenVerifier {
    fn token_verifier(&self) -> &TokenVerifier;
}

/// Inserts an `Arc<ViewerContext>` into request extensions for the `Vc` extractor
pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Response
where
    T: HasTokenVerifier + Clone + Send + Sync + 'static,
{
    let viewer = app_state.token_verifier().viewer_for(request.headers());
    tracing::debug!(request_id = %viewer.request_id, viewer = ?viewer.viewer, "Resolved viewer");

    request.extensions_mut().insert(Arc::new(viewer));
    next.run(request).await
}
