// Infrastructure - storage backends, media files, write leases and caller identity
pub mod database;        // Graph store traits
pub mod leases;          // Per-adventure write leases
pub mod media;           // Media file storage
pub mod middleware;      // Request viewer middleware
pub mod sqlite_database; // SQLite graph store
pub mod viewer;          // Viewer context

pub use database::{AdventureFilter, GraphStore, GraphWriteTx, Page};
pub use leases::{AdventureLease, AdventureLeases};
pub use media::{DiskMediaStore, MediaStore};
pub use sqlite_database::SqliteGraphStore;
pub use viewer::ViewerContext;
