use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::{
        database::GraphStore,
        leases::AdventureLeases,
        media::{DiskMediaStore, MediaStore},
        middleware::{HasTokenVerifier, TokenVerifier},
        sqlite_database::SqliteGraphStore,
    },
    services::{AdventureService, ArchiveService, CopyService, ReconcileEngine, StaticPlayerPage},
};

#[derive(Clone)]
pub struct AppState {
    pub adventures: AdventureService,
    pub copies: CopyService,
    pub archives: ArchiveService,
    pub token_verifier: TokenVerifier,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = SqliteGraphStore::connect(&config.database.url, config.database.max_connections).await?;
        let store: Arc<dyn GraphStore> = Arc::new(store);
        let media: Arc<dyn MediaStore> = Arc::new(DiskMediaStore::new(config.media.system_path.clone()));

        Ok(Self::with_stores(config, store, media))
    }

    /// Wire the services over already constructed stores
    pub fn with_stores(config: Config, store: Arc<dyn GraphStore>, media: Arc<dyn MediaStore>) -> Self {
        let engine = ReconcileEngine::new(store.clone(), AdventureLeases::new());
        let upload_dir = config.media.upload_dir.clone();

        let copies = CopyService::new(store.clone(), media.clone(), engine.clone(), upload_dir.clone());
        let archives = ArchiveService::new(
            store.clone(),
            media.clone(),
            Arc::new(StaticPlayerPage::new()),
            copies.clone(),
            config.media.clone(),
        );
        let adventures = AdventureService::new(store, media, engine, copies.clone(), upload_dir);
        let token_verifier = TokenVerifier::new(&config.auth.jwt_secret, config.auth.dev_auth_bypass);

        Self {
            adventures,
            copies,
            archives,
            token_verifier,
            config,
        }
    }
}

impl HasTokenVerifier for AppState {
    fn token_verifier(&self) -> &TokenVerifier {
        &self.token_verifier
    }
}
