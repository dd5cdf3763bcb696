// Core types and primitives

pub mod slug;
pub mod strong_types;

pub use slug::{check_slug, is_valid_slug, SlugPair};
pub use strong_types::{AdventureId, Permission, RowId};
