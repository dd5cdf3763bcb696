// Request middleware - caller identity for handlers

pub mod payload_extractor;
pub mod viewer_context_extractor;
pub mod viewer_context_middleware;

pub use payload_extractor::AppJson;
pub use viewer_context_extractor::Vc;
pub use viewer_context_middleware::{
    viewer_context_middleware, Claims, HasTokenVerifier, TokenVerifier,
};
