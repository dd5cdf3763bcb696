// Business services - each operation resolves, checks and writes through the store traits

pub mod archive_service;
pub mod content_service;
pub mod copy_service;
pub mod player_page;
pub mod reconcile;

pub use archive_service::{ArchiveService, ExportedArchive};
pub use content_service::AdventureService;
pub use copy_service::CopyService;
pub use player_page::{PlayerRenderer, StaticPlayerPage};
pub use reconcile::{ReconcileEngine, ReconcileSummary};
