// Shared fixtures for the service-level tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use aventyr::{
    app_state::AppState,
    config::{AuthConfig, Config, DatabaseConfig, MediaConfig, ServerConfig, DEFAULT_EXPORT_SIZE_LIMIT},
    core::{AdventureId, Permission},
    infrastructure::{
        database::{AdventureFilter, GraphStore, GraphWriteTx, Page},
        media::{DiskMediaStore, MediaStore},
        sqlite_database::SqliteGraphStore,
    },
    models::{
        Adventure, AdventureFields, AdventureListing, AdventureSkeleton, Category, Link, Node,
        NodeStat, Report, User,
    },
    AppError, AppResult,
};

pub fn test_config(system_path: &std::path::Path) -> Config {
    Config {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        media: MediaConfig {
            system_path: system_path.to_path_buf(),
            upload_dir: "upload".to_string(),
            web_dir: "web".to_string(),
            export_size_limit: DEFAULT_EXPORT_SIZE_LIMIT,
        },
        auth: AuthConfig {
            jwt_secret: "test-secret".to_string(),
            dev_auth_bypass: false,
        },
    }
}

/// Services over an in-memory database and a temporary media root
pub struct Harness {
    pub state: AppState,
    pub sqlite: Arc<SqliteGraphStore>,
    pub store: Arc<dyn GraphStore>,
    pub media: Arc<dyn MediaStore>,
    pub counters: Arc<WriteCounters>,
    pub dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = Arc::new(SqliteGraphStore::new_in_memory().await.unwrap());
        let counters = Arc::new(WriteCounters::default());
        let store: Arc<dyn GraphStore> = Arc::new(CountingStore {
            inner: sqlite.clone(),
            counters: counters.clone(),
        });
        let media: Arc<dyn MediaStore> = Arc::new(DiskMediaStore::new(dir.path()));
        let state = AppState::with_stores(test_config(dir.path()), store.clone(), media.clone());

        Self {
            state,
            sqlite,
            store,
            media,
            counters,
            dir,
        }
    }

    pub fn path(&self, relative: &str) -> std::path::PathBuf {
        self.dir.path().join(relative)
    }

    pub async fn adventure_count(&self) -> i64 {
        let listing = self
            .store
            .search_adventures(&AdventureFilter::Category(1), Page::default())
            .await
            .unwrap();
        listing.count
    }

    pub async fn edit_view(&self, slug: &str) -> Adventure {
        self.store.fetch_adventure(slug, Permission::ReadWrite).await.unwrap()
    }
}

/// Row-level write calls observed through the store
#[derive(Debug, Default)]
pub struct WriteCounters {
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
    pub transactions: AtomicUsize,
    /// Makes every link insert fail with a storage error
    pub fail_link_inserts: AtomicBool,
}

impl WriteCounters {
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.inserts.store(0, Ordering::SeqCst);
        self.updates.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
        self.transactions.store(0, Ordering::SeqCst);
    }
}

/// Delegating store that counts every row write of a reconciliation
pub struct CountingStore {
    pub inner: Arc<SqliteGraphStore>,
    pub counters: Arc<WriteCounters>,
}

struct CountingTx {
    inner: Box<dyn GraphWriteTx>,
    counters: Arc<WriteCounters>,
}

#[async_trait]
impl GraphWriteTx for CountingTx {
    async fn persist_adventure_fields(&mut self, id: AdventureId, fields: &AdventureFields) -> AppResult<()> {
        self.inner.persist_adventure_fields(id, fields).await
    }

    async fn insert_node(&mut self, id: AdventureId, node: &Node) -> AppResult<i64> {
        self.counters.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_node(id, node).await
    }

    async fn update_node(&mut self, id: AdventureId, row_id: i64, node: &Node) -> AppResult<()> {
        self.counters.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_node(id, row_id, node).await
    }

    async fn delete_node(&mut self, id: AdventureId, row_id: i64) -> AppResult<()> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_node(id, row_id).await
    }

    async fn insert_link(&mut self, id: AdventureId, link: &Link) -> AppResult<i64> {
        self.counters.inserts.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_link_inserts.load(Ordering::SeqCst) {
            return Err(AppError::StorageError("link insert failed".to_string()));
        }
        self.inner.insert_link(id, link).await
    }

    async fn update_link(&mut self, id: AdventureId, row_id: i64, link: &Link) -> AppResult<()> {
        self.counters.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_link(id, row_id, link).await
    }

    async fn delete_link(&mut self, id: AdventureId, row_id: i64) -> AppResult<()> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_link(id, row_id).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.inner.commit().await
    }
}

#[async_trait]
impl GraphStore for CountingStore {
    async fn fetch_adventure(&self, slug: &str, mode: Permission) -> AppResult<Adventure> {
        self.inner.fetch_adventure(slug, mode).await
    }

    async fn fetch_adventure_by_id(&self, id: AdventureId) -> AppResult<Adventure> {
        self.inner.fetch_adventure_by_id(id).await
    }

    async fn slug_exists(&self, slug: &str) -> AppResult<bool> {
        self.inner.slug_exists(slug).await
    }

    async fn create_adventure_skeleton(
        &self,
        edit_slug: &str,
        view_slug: &str,
        title: &str,
        category_id: i64,
    ) -> AppResult<AdventureSkeleton> {
        self.inner
            .create_adventure_skeleton(edit_slug, view_slug, title, category_id)
            .await
    }

    async fn delete_adventure_cascade(&self, id: AdventureId) -> AppResult<bool> {
        self.inner.delete_adventure_cascade(id).await
    }

    async fn bump_edit_version(&self, edit_slug: &str) -> AppResult<()> {
        self.inner.bump_edit_version(edit_slug).await
    }

    async fn count_view(&self, id: AdventureId) -> AppResult<()> {
        self.inner.count_view(id).await
    }

    async fn update_adventure_metadata(&self, adventure: &Adventure) -> AppResult<()> {
        self.inner.update_adventure_metadata(adventure).await
    }

    async fn add_adventure_user(&self, id: AdventureId, user_id: i64) -> AppResult<()> {
        self.inner.add_adventure_user(id, user_id).await
    }

    async fn remove_adventure_user(&self, id: AdventureId, user_id: i64) -> AppResult<()> {
        self.inner.remove_adventure_user(id, user_id).await
    }

    async fn fetch_user(&self, user_id: i64) -> AppResult<User> {
        self.inner.fetch_user(user_id).await
    }

    async fn search_adventures(&self, filter: &AdventureFilter, page: Page) -> AppResult<AdventureListing> {
        self.inner.search_adventures(filter, page).await
    }

    async fn log_node_visit(&self, id: AdventureId, node_id: i64) -> AppResult<()> {
        self.inner.log_node_visit(id, node_id).await
    }

    async fn node_statistics(
        &self,
        id: AdventureId,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> AppResult<Vec<NodeStat>> {
        self.inner.node_statistics(id, start, stop).await
    }

    async fn create_report(&self, id: AdventureId, reason: &str, comment: &str) -> AppResult<Report> {
        self.inner.create_report(id, reason, comment).await
    }

    async fn reports(&self, handled: bool) -> AppResult<Vec<Report>> {
        self.inner.reports(handled).await
    }

    async fn set_report_handled(&self, report_id: i64, handled: bool) -> AppResult<()> {
        self.inner.set_report_handled(report_id, handled).await
    }

    async fn categories(&self) -> AppResult<Vec<Category>> {
        self.inner.categories().await
    }

    async fn category(&self, id: i64) -> AppResult<Category> {
        self.inner.category(id).await
    }

    async fn create_category(&self, category: &Category) -> AppResult<Category> {
        self.inner.create_category(category).await
    }

    async fn update_category(&self, category: &Category) -> AppResult<Category> {
        self.inner.update_category(category).await
    }

    async fn delete_category(&self, id: i64) -> AppResult<bool> {
        self.inner.delete_category(id).await
    }

    async fn begin_write(&self) -> AppResult<Box<dyn GraphWriteTx>> {
        self.counters.transactions.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.begin_write().await?;
        Ok(Box::new(CountingTx {
            inner,
            counters: self.counters.clone(),
        }))
    }
}
