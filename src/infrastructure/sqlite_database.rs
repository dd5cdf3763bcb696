use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Transaction};
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::{AdventureId, Permission, RowId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{AdventureFilter, GraphStore, GraphWriteTx, Page};
use crate::models::catalog::{DEFAULT_CATEGORY_ID, DEFAULT_CATEGORY_TITLE};
use crate::models::{
    Adventure, AdventureFields, AdventureListing, AdventureSkeleton, Category, Link, Node,
    NodeStat, Props, Report, User,
};

const ADVENTURE_COLUMNS: &str = "adv.id, adv.title, adv.description, adv.slug, adv.view_slug, \
     adv.locked, adv.cover_url, adv.edit_version, adv.view_count, adv.props, adv.created_at, \
     adv.updated_at, cat.id AS cat_id, cat.sort_order AS cat_sort_order, cat.title AS cat_title, \
     cat.description AS cat_description, cat.icon AS cat_icon, cat.image AS cat_image";

const ADVENTURE_FROM: &str =
    "FROM adventure adv LEFT JOIN adventure_category cat ON adv.category_id = cat.id";

const SEARCH_CONDITION: &str = "(adv.title LIKE ? OR adv.description LIKE ?) \
     OR adv.id IN (SELECT adn.adventure_id FROM adventure_node adn WHERE adn.content LIKE ? OR adn.title LIKE ?) \
     OR adv.id IN (SELECT adl.adventure_id FROM adventure_link adl WHERE adl.source_link_title LIKE ? OR adl.target_link_title LIKE ?)";

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Category ids are nullable in storage; zero means none
fn category_param(category_id: i64) -> Option<i64> {
    (category_id > 0).then_some(category_id)
}

/// Extract the on-disk file of a sqlite url, if it has one
pub fn database_file(url: &str) -> Option<PathBuf> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// SQLite implementation of the graph store
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid database url {}: {}", url, e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to connect to {}: {}", url, e)))?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// One pinned connection so every query sees the same in-memory database
    pub async fn new_in_memory() -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::StorageError(format!("Invalid in-memory url: {}", e)))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::StorageError(format!("Failed to connect to in-memory SQLite: {}", e))
            })?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create tables if missing and seed the default category
    pub async fn initialize(&self) -> AppResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS adventure_category (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                icon TEXT NOT NULL DEFAULT '',
                image TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS adventure (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                slug TEXT NOT NULL UNIQUE,
                view_slug TEXT NOT NULL UNIQUE,
                locked INTEGER NOT NULL DEFAULT 0,
                category_id INTEGER REFERENCES adventure_category(id) ON DELETE SET NULL,
                cover_url TEXT NOT NULL DEFAULT '',
                edit_version INTEGER NOT NULL DEFAULT 0,
                view_count INTEGER NOT NULL DEFAULT 0,
                props TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS adventure_node (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                adventure_id INTEGER NOT NULL REFERENCES adventure(id) ON DELETE CASCADE,
                node_id INTEGER NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                icon TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                x INTEGER NOT NULL DEFAULT 0,
                y INTEGER NOT NULL DEFAULT 0,
                image_url TEXT NOT NULL DEFAULT '',
                image_id INTEGER NOT NULL DEFAULT 0,
                image_layout_type TEXT NOT NULL DEFAULT '',
                node_type TEXT NOT NULL DEFAULT '',
                props TEXT NOT NULL DEFAULT ''
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS adventure_link (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                adventure_id INTEGER NOT NULL REFERENCES adventure(id) ON DELETE CASCADE,
                link_id INTEGER NOT NULL,
                source_node_id INTEGER NOT NULL,
                source_link_title TEXT NOT NULL DEFAULT '',
                target_node_id INTEGER NOT NULL,
                target_link_title TEXT NOT NULL DEFAULT '',
                link_type TEXT NOT NULL DEFAULT '',
                props TEXT NOT NULL DEFAULT ''
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL DEFAULT '',
                role INTEGER NOT NULL DEFAULT 2
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS user_adventure (
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                adventure_id INTEGER NOT NULL REFERENCES adventure(id) ON DELETE CASCADE,
                PRIMARY KEY (user_id, adventure_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS adventure_report (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                adventure_id INTEGER NOT NULL REFERENCES adventure(id) ON DELETE CASCADE,
                report_reason TEXT NOT NULL DEFAULT '',
                comment TEXT NOT NULL DEFAULT '',
                is_handled INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS adventure_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                adventure_id INTEGER NOT NULL REFERENCES adventure(id) ON DELETE CASCADE,
                log_type INTEGER NOT NULL DEFAULT 0,
                data INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_adventure_node_adventure ON adventure_node(adventure_id)",
            "CREATE INDEX IF NOT EXISTS idx_adventure_link_adventure ON adventure_link(adventure_id)",
            "CREATE INDEX IF NOT EXISTS idx_adventure_log_adventure ON adventure_log(adventure_id, created_at)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::StorageError(format!("Failed to create schema: {}", e)))?;
        }

        let now = now_millis();
        sqlx::query(
            "INSERT OR IGNORE INTO adventure_category (id, title, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(DEFAULT_CATEGORY_ID)
        .bind(DEFAULT_CATEGORY_TITLE)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to seed default category: {}", e)))?;

        Ok(())
    }

    /// Register an editor account
    pub async fn create_user(&self, username: &str, name: &str, role: i64) -> AppResult<User> {
        let result = sqlx::query("INSERT INTO users (username, name, role) VALUES (?, ?, ?)")
            .bind(username)
            .bind(name)
            .bind(role)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to create user {}: {}", username, e)))?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            name: name.to_string(),
            role,
        })
    }

    async fn fetch_content(&self, adventure: &mut Adventure) -> AppResult<()> {
        let id = adventure.id.value();

        let node_rows = sqlx::query(
            "SELECT id, node_id, title, icon, content, x, y, image_url, image_id, image_layout_type, node_type, props \
             FROM adventure_node WHERE adventure_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to get nodes for adventure {}: {}", id, e)))?;
        adventure.nodes = node_rows.iter().map(node_from_row).collect::<AppResult<_>>()?;

        let link_rows = sqlx::query(
            "SELECT id, link_id, source_node_id, source_link_title, target_node_id, target_link_title, link_type, props \
             FROM adventure_link WHERE adventure_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to get links for adventure {}: {}", id, e)))?;
        adventure.links = link_rows.iter().map(link_from_row).collect::<AppResult<_>>()?;

        let user_rows = sqlx::query(
            "SELECT u.id, u.username, u.name, u.role FROM users u \
             INNER JOIN user_adventure ua ON ua.user_id = u.id WHERE ua.adventure_id = ? ORDER BY u.id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to get users for adventure {}: {}", id, e)))?;
        adventure.users = user_rows.iter().map(user_from_row).collect::<AppResult<_>>()?;

        Ok(())
    }

    async fn count_matches(&self, filter: &AdventureFilter) -> AppResult<i64> {
        let count: i64 = match filter {
            AdventureFilter::Category(0) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM adventure WHERE category_id IS NULL")
                    .fetch_one(&self.pool)
                    .await
            }
            AdventureFilter::Category(category_id) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM adventure WHERE category_id = ?")
                    .bind(category_id)
                    .fetch_one(&self.pool)
                    .await
            }
            AdventureFilter::Search(text) => {
                let pattern = format!("%{}%", text);
                let sql = format!("SELECT COUNT(*) FROM adventure adv WHERE {}", SEARCH_CONDITION);
                let mut query = sqlx::query_scalar::<Sqlite, i64>(&sql);
                for _ in 0..6 {
                    query = query.bind(pattern.clone());
                }
                query.fetch_one(&self.pool).await
            }
            AdventureFilter::ReportReason(reason) => {
                sqlx::query_scalar(
                    "SELECT COUNT(DISTINCT adventure_id) FROM adventure_report WHERE report_reason = ?",
                )
                .bind(reason)
                .fetch_one(&self.pool)
                .await
            }
        }
        .map_err(|e| AppError::StorageError(format!("Failed to count adventures: {}", e)))?;

        Ok(count)
    }
}

fn adventure_from_row(row: &SqliteRow) -> AppResult<Adventure> {
    let category = match row.try_get::<Option<i64>, _>("cat_id")? {
        Some(id) => Category {
            id,
            sort_order: row.try_get("cat_sort_order")?,
            title: row.try_get("cat_title")?,
            description: row.try_get("cat_description")?,
            icon: row.try_get("cat_icon")?,
            image: row.try_get("cat_image")?,
        },
        None => Category::default(),
    };

    Ok(Adventure {
        id: AdventureId::new(row.try_get("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        slug: row.try_get("slug")?,
        view_slug: row.try_get("view_slug")?,
        locked: row.try_get("locked")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
        category,
        cover_url: row.try_get("cover_url")?,
        edit_version: row.try_get("edit_version")?,
        view_count: row.try_get("view_count")?,
        props: Props::from_raw(row.try_get::<String, _>("props")?),
        ..Default::default()
    })
}

fn node_from_row(row: &SqliteRow) -> AppResult<Node> {
    Ok(Node {
        id: RowId::from_raw(row.try_get("id")?),
        node_id: row.try_get("node_id")?,
        title: row.try_get("title")?,
        icon: row.try_get("icon")?,
        content: row.try_get("content")?,
        x: row.try_get("x")?,
        y: row.try_get("y")?,
        image_url: row.try_get("image_url")?,
        image_id: row.try_get("image_id")?,
        image_layout_type: row.try_get("image_layout_type")?,
        node_type: row.try_get("node_type")?,
        changed: false,
        props: Props::from_raw(row.try_get::<String, _>("props")?),
    })
}

fn link_from_row(row: &SqliteRow) -> AppResult<Link> {
    Ok(Link {
        id: RowId::from_raw(row.try_get("id")?),
        link_id: row.try_get("link_id")?,
        source_node_id: row.try_get("source_node_id")?,
        source_link_title: row.try_get("source_link_title")?,
        target_node_id: row.try_get("target_node_id")?,
        target_link_title: row.try_get("target_link_title")?,
        link_type: row.try_get("link_type")?,
        changed: false,
        props: Props::from_raw(row.try_get::<String, _>("props")?),
    })
}

fn user_from_row(row: &SqliteRow) -> AppResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        name: row.try_get("name")?,
        role: row.try_get("role")?,
    })
}

fn category_from_row(row: &SqliteRow) -> AppResult<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        sort_order: row.try_get("sort_order")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        icon: row.try_get("icon")?,
        image: row.try_get("image")?,
    })
}

fn report_from_row(row: &SqliteRow) -> AppResult<Report> {
    Ok(Report {
        id: row.try_get("id")?,
        adventure_id: row.try_get("adventure_id")?,
        report_reason: row.try_get("report_reason")?,
        comment: row.try_get("comment")?,
        is_handled: row.try_get("is_handled")?,
        created_at: from_millis(row.try_get("created_at")?).unwrap_or_default(),
    })
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn fetch_adventure(&self, slug: &str, mode: Permission) -> AppResult<Adventure> {
        let condition = match mode {
            Permission::ReadOnly => "adv.view_slug = ?",
            Permission::ReadWrite => "adv.slug = ?",
            Permission::Ignore => "(adv.slug = ? OR adv.view_slug = ?)",
        };
        let sql = format!("SELECT {} {} WHERE {}", ADVENTURE_COLUMNS, ADVENTURE_FROM, condition);

        let mut query = sqlx::query(&sql).bind(slug);
        if mode == Permission::Ignore {
            query = query.bind(slug);
        }

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to get adventure {}: {}", slug, e)))?
            .ok_or_else(|| AppError::NotFound("Adventure not found".to_string()))?;

        let mut adventure = adventure_from_row(&row)?;
        self.fetch_content(&mut adventure).await?;

        adventure.permission = if slug == adventure.view_slug {
            Permission::ReadOnly
        } else {
            Permission::ReadWrite
        };
        Ok(adventure)
    }

    async fn fetch_adventure_by_id(&self, id: AdventureId) -> AppResult<Adventure> {
        let sql = format!("SELECT {} {} WHERE adv.id = ?", ADVENTURE_COLUMNS, ADVENTURE_FROM);
        let row = sqlx::query(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to get adventure {}: {}", id, e)))?
            .ok_or_else(|| AppError::NotFound("Adventure not found".to_string()))?;

        let mut adventure = adventure_from_row(&row)?;
        self.fetch_content(&mut adventure).await?;
        adventure.permission = Permission::ReadWrite;
        Ok(adventure)
    }

    async fn slug_exists(&self, slug: &str) -> AppResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM adventure WHERE slug = ? OR view_slug = ?")
                .bind(slug)
                .bind(slug)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::StorageError(format!("Failed to check slug {}: {}", slug, e)))?;
        Ok(count > 0)
    }

    async fn create_adventure_skeleton(
        &self,
        edit_slug: &str,
        view_slug: &str,
        title: &str,
        category_id: i64,
    ) -> AppResult<AdventureSkeleton> {
        let now = now_millis();
        let result = sqlx::query(
            "INSERT INTO adventure (title, slug, view_slug, category_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(title)
        .bind(edit_slug)
        .bind(view_slug)
        .bind(category_param(category_id))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to create adventure: {}", e)))?;

        Ok(AdventureSkeleton {
            id: AdventureId::new(result.last_insert_rowid()),
            edit_slug: edit_slug.to_string(),
            view_slug: view_slug.to_string(),
        })
    }

    async fn delete_adventure_cascade(&self, id: AdventureId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM adventure WHERE id = ?")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to delete adventure {}: {}", id, e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn bump_edit_version(&self, edit_slug: &str) -> AppResult<()> {
        sqlx::query("UPDATE adventure SET edit_version = edit_version + 1 WHERE slug = ?")
            .bind(edit_slug)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to bump edit version: {}", e)))?;
        Ok(())
    }

    async fn count_view(&self, id: AdventureId) -> AppResult<()> {
        sqlx::query("UPDATE adventure SET view_count = view_count + 1 WHERE id = ?")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to count view for {}: {}", id, e)))?;
        Ok(())
    }

    async fn update_adventure_metadata(&self, adventure: &Adventure) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE adventure SET title = ?, description = ?, category_id = ?, locked = ?, cover_url = ?, \
             view_slug = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&adventure.title)
        .bind(&adventure.description)
        .bind(category_param(adventure.category.id))
        .bind(adventure.locked)
        .bind(&adventure.cover_url)
        .bind(&adventure.view_slug)
        .bind(now_millis())
        .bind(adventure.id.value())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::StorageError(format!("Failed to update adventure {}: {}", adventure.id, e))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Adventure not found".to_string()));
        }
        Ok(())
    }

    async fn add_adventure_user(&self, id: AdventureId, user_id: i64) -> AppResult<()> {
        sqlx::query("INSERT OR IGNORE INTO user_adventure (user_id, adventure_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to add user {}: {}", user_id, e)))?;
        Ok(())
    }

    async fn remove_adventure_user(&self, id: AdventureId, user_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM user_adventure WHERE user_id = ? AND adventure_id = ?")
            .bind(user_id)
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to remove user {}: {}", user_id, e)))?;
        Ok(())
    }

    async fn fetch_user(&self, user_id: i64) -> AppResult<User> {
        let row = sqlx::query("SELECT id, username, name, role FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to get user {}: {}", user_id, e)))?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user_from_row(&row)
    }

    async fn search_adventures(
        &self,
        filter: &AdventureFilter,
        page: Page,
    ) -> AppResult<AdventureListing> {
        let count = self.count_matches(filter).await?;
        if count == 0 {
            return Ok(AdventureListing::default());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} {} WHERE ",
            ADVENTURE_COLUMNS, ADVENTURE_FROM
        ));
        match filter {
            AdventureFilter::Category(0) => {
                qb.push("adv.category_id IS NULL");
            }
            AdventureFilter::Category(category_id) => {
                qb.push("adv.category_id = ");
                qb.push_bind(*category_id);
            }
            AdventureFilter::Search(text) => {
                let pattern = format!("%{}%", text);
                qb.push("(adv.title LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR adv.description LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(") OR adv.id IN (SELECT adn.adventure_id FROM adventure_node adn WHERE adn.content LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR adn.title LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(") OR adv.id IN (SELECT adl.adventure_id FROM adventure_link adl WHERE adl.source_link_title LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR adl.target_link_title LIKE ");
                qb.push_bind(pattern);
                qb.push(")");
            }
            AdventureFilter::ReportReason(reason) => {
                qb.push("adv.id IN (SELECT DISTINCT adventure_id FROM adventure_report WHERE report_reason = ");
                qb.push_bind(reason.clone());
                qb.push(")");
            }
        }
        qb.push(" ORDER BY adv.id LIMIT ");
        qb.push_bind(page.page_size);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to search adventures: {}", e)))?;

        let adventures = rows
            .iter()
            .map(adventure_from_row)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(AdventureListing { adventures, count })
    }

    async fn log_node_visit(&self, id: AdventureId, node_id: i64) -> AppResult<()> {
        sqlx::query("INSERT INTO adventure_log (adventure_id, log_type, data, created_at) VALUES (?, 0, ?, ?)")
            .bind(id.value())
            .bind(node_id)
            .bind(now_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to log visit for {}: {}", id, e)))?;
        Ok(())
    }

    async fn node_statistics(
        &self,
        id: AdventureId,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> AppResult<Vec<NodeStat>> {
        let rows = sqlx::query(
            "SELECT al.data AS node_id, an.title AS title, COUNT(*) AS visit_count \
             FROM adventure_log al INNER JOIN adventure_node an \
               ON al.data = an.node_id AND al.adventure_id = an.adventure_id \
             WHERE al.adventure_id = ? AND al.log_type = 0 AND al.created_at BETWEEN ? AND ? \
             GROUP BY al.data, an.title ORDER BY al.data",
        )
        .bind(id.value())
        .bind(start.timestamp_millis())
        .bind(stop.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to get statistics for {}: {}", id, e)))?;

        rows.iter()
            .map(|row| {
                Ok(NodeStat {
                    node_id: row.try_get("node_id")?,
                    title: row.try_get("title")?,
                    visit_count: row.try_get("visit_count")?,
                })
            })
            .collect()
    }

    async fn create_report(
        &self,
        id: AdventureId,
        reason: &str,
        comment: &str,
    ) -> AppResult<Report> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO adventure_report (adventure_id, report_reason, comment, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.value())
        .bind(reason)
        .bind(comment)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to report adventure {}: {}", id, e)))?;

        Ok(Report {
            id: result.last_insert_rowid(),
            adventure_id: id.value(),
            report_reason: reason.to_string(),
            comment: comment.to_string(),
            is_handled: 0,
            created_at,
        })
    }

    async fn reports(&self, handled: bool) -> AppResult<Vec<Report>> {
        let rows = sqlx::query(
            "SELECT id, adventure_id, report_reason, comment, is_handled, created_at FROM adventure_report \
             WHERE is_handled = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(i64::from(handled))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to get reports: {}", e)))?;

        rows.iter().map(report_from_row).collect()
    }

    async fn set_report_handled(&self, report_id: i64, handled: bool) -> AppResult<()> {
        let result = sqlx::query("UPDATE adventure_report SET is_handled = ? WHERE id = ?")
            .bind(i64::from(handled))
            .bind(report_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to update report {}: {}", report_id, e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Report not found".to_string()));
        }
        Ok(())
    }

    async fn categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, sort_order, title, description, icon, image FROM adventure_category ORDER BY sort_order, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to get categories: {}", e)))?;

        rows.iter().map(category_from_row).collect()
    }

    async fn category(&self, id: i64) -> AppResult<Category> {
        let row = sqlx::query(
            "SELECT id, sort_order, title, description, icon, image FROM adventure_category WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to get category {}: {}", id, e)))?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

        category_from_row(&row)
    }

    async fn create_category(&self, category: &Category) -> AppResult<Category> {
        let now = now_millis();
        let result = sqlx::query(
            "INSERT INTO adventure_category (sort_order, title, description, icon, image, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(category.sort_order)
        .bind(&category.title)
        .bind(&category.description)
        .bind(&category.icon)
        .bind(&category.image)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to create category: {}", e)))?;

        Ok(Category {
            id: result.last_insert_rowid(),
            ..category.clone()
        })
    }

    async fn update_category(&self, category: &Category) -> AppResult<Category> {
        let result = sqlx::query(
            "UPDATE adventure_category SET sort_order = ?, title = ?, description = ?, icon = ?, image = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(category.sort_order)
        .bind(&category.title)
        .bind(&category.description)
        .bind(&category.icon)
        .bind(&category.image)
        .bind(now_millis())
        .bind(category.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to update category {}: {}", category.id, e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        Ok(category.clone())
    }

    async fn delete_category(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM adventure_category WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to delete category {}: {}", id, e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn begin_write(&self) -> AppResult<Box<dyn GraphWriteTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to begin transaction: {}", e)))?;
        Ok(Box::new(SqliteWriteTx { tx }))
    }
}

/// Write transaction over the sqlite pool
pub struct SqliteWriteTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl GraphWriteTx for SqliteWriteTx {
    async fn persist_adventure_fields(
        &mut self,
        id: AdventureId,
        fields: &AdventureFields,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE adventure SET title = ?, description = ?, category_id = ?, locked = ?, cover_url = ?, \
             props = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(category_param(fields.category_id))
        .bind(fields.locked)
        .bind(&fields.cover_url)
        .bind(&fields.props)
        .bind(now_millis())
        .bind(id.value())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to update adventure {}: {}", id, e)))?;
        Ok(())
    }

    async fn insert_node(&mut self, id: AdventureId, node: &Node) -> AppResult<i64> {
        let result = sqlx::query(
            "INSERT INTO adventure_node (adventure_id, node_id, title, icon, content, x, y, image_url, image_id, \
             image_layout_type, node_type, props) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.value())
        .bind(node.node_id)
        .bind(&node.title)
        .bind(&node.icon)
        .bind(&node.content)
        .bind(node.x)
        .bind(node.y)
        .bind(&node.image_url)
        .bind(node.image_id)
        .bind(&node.image_layout_type)
        .bind(&node.node_type)
        .bind(node.props.raw())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to insert node {}: {}", node.node_id, e)))?;
        Ok(result.last_insert_rowid())
    }

    async fn update_node(&mut self, id: AdventureId, row_id: i64, node: &Node) -> AppResult<()> {
        sqlx::query(
            "UPDATE adventure_node SET node_id = ?, title = ?, icon = ?, content = ?, x = ?, y = ?, image_url = ?, \
             image_id = ?, image_layout_type = ?, node_type = ?, props = ? WHERE id = ? AND adventure_id = ?",
        )
        .bind(node.node_id)
        .bind(&node.title)
        .bind(&node.icon)
        .bind(&node.content)
        .bind(node.x)
        .bind(node.y)
        .bind(&node.image_url)
        .bind(node.image_id)
        .bind(&node.image_layout_type)
        .bind(&node.node_type)
        .bind(node.props.raw())
        .bind(row_id)
        .bind(id.value())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to update node {}: {}", row_id, e)))?;
        Ok(())
    }

    async fn delete_node(&mut self, id: AdventureId, row_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM adventure_node WHERE id = ? AND adventure_id = ?")
            .bind(row_id)
            .bind(id.value())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to delete node {}: {}", row_id, e)))?;
        Ok(())
    }

    async fn insert_link(&mut self, id: AdventureId, link: &Link) -> AppResult<i64> {
        let result = sqlx::query(
            "INSERT INTO adventure_link (adventure_id, link_id, source_node_id, source_link_title, target_node_id, \
             target_link_title, link_type, props) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.value())
        .bind(link.link_id)
        .bind(link.source_node_id)
        .bind(&link.source_link_title)
        .bind(link.target_node_id)
        .bind(&link.target_link_title)
        .bind(&link.link_type)
        .bind(link.props.raw())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to insert link {}: {}", link.link_id, e)))?;
        Ok(result.last_insert_rowid())
    }

    async fn update_link(&mut self, id: AdventureId, row_id: i64, link: &Link) -> AppResult<()> {
        sqlx::query(
            "UPDATE adventure_link SET link_id = ?, source_node_id = ?, source_link_title = ?, target_node_id = ?, \
             target_link_title = ?, link_type = ?, props = ? WHERE id = ? AND adventure_id = ?",
        )
        .bind(link.link_id)
        .bind(link.source_node_id)
        .bind(&link.source_link_title)
        .bind(link.target_node_id)
        .bind(&link.target_link_title)
        .bind(&link.link_type)
        .bind(link.props.raw())
        .bind(row_id)
        .bind(id.value())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to update link {}: {}", row_id, e)))?;
        Ok(())
    }

    async fn delete_link(&mut self, id: AdventureId, row_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM adventure_link WHERE id = ? AND adventure_id = ?")
            .bind(row_id)
            .bind(id.value())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to delete link {}: {}", row_id, e)))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to commit transaction: {}", e)))
    }
}
