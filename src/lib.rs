// Aventyr - backend for branching adventure stories

// Core types and primitives
pub mod core;

// Domain models
pub mod models;

// Storage, media, leases and request identity
pub mod infrastructure;

// Adventure operations
pub mod services;

// HTTP surface
pub mod adventure_interface;
pub mod app_state;

// Common utilities
pub mod config;
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
