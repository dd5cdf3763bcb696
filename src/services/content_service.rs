// Adventure service - lifecycle, access checks and the smaller adventure features
// Content writes go through the reconciliation engine

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::core::{check_slug, AdventureId, Permission, RowId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{AdventureFilter, GraphStore, Page};
use crate::infrastructure::media::MediaStore;
use crate::infrastructure::viewer::ViewerContext;
use crate::models::{
    Adventure, AdventureListing, Category, Link, Node, NodeStat, Report, ReportRequest, User,
};
use crate::services::copy_service::{media_dir, CopyService};
use crate::services::reconcile::ReconcileEngine;

/// Minimum length of a free-text adventure search
pub const MIN_SEARCH_LEN: usize = 3;

fn default_node(
    node_id: i64,
    node_type: &str,
    title: &str,
    icon: &str,
    text: &str,
    x: i64,
    y: i64,
) -> Node {
    Node {
        id: RowId::Pending,
        node_id,
        title: title.to_string(),
        icon: icon.to_string(),
        content: text.to_string(),
        x,
        y,
        node_type: node_type.to_string(),
        ..Default::default()
    }
}

fn default_link(link_id: i64, source: i64, target: i64) -> Link {
    Link {
        id: RowId::Pending,
        link_id,
        source_node_id: source,
        target_node_id: target,
        link_type: "bidirectional".to_string(),
        ..Default::default()
    }
}

/// Starter graph for a new adventure: a root with a left and a right branch
pub fn default_graph() -> (Vec<Node>, Vec<Link>) {
    let nodes = vec![
        default_node(0, "root", "Start", "🏠", "<p>Detta är starten på ditt nya PS.</p>", 345, 100),
        default_node(1, "default", "Vänster", "", "<p>Du har gått till vänster.</p>", 144, 383),
        default_node(2, "default", "Höger", "", "<p>Du har gått till höger.</p>", 546, 383),
    ];
    let links = vec![default_link(0, 0, 1), default_link(1, 0, 2)];
    (nodes, links)
}

/// Keep only the file name of an upload; anything path-like is rejected
pub fn sanitize_file_name(name: &str) -> AppResult<String> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if file_name.is_empty() || file_name == "." || file_name == ".." {
        return Err(AppError::BadPayload(format!("Invalid file name: {}", name)));
    }
    Ok(file_name.to_string())
}

#[derive(Clone)]
pub struct AdventureService {
    store: Arc<dyn GraphStore>,
    media: Arc<dyn MediaStore>,
    engine: ReconcileEngine,
    copies: CopyService,
    upload_dir: String,
}

impl AdventureService {
    pub fn new(
        store: Arc<dyn GraphStore>,
        media: Arc<dyn MediaStore>,
        engine: ReconcileEngine,
        copies: CopyService,
        upload_dir: impl Into<String>,
    ) -> Self {
        Self {
            store,
            media,
            engine,
            copies,
            upload_dir: upload_dir.into(),
        }
    }

    pub fn engine(&self) -> &ReconcileEngine {
        &self.engine
    }

    /// Public read through either slug. Readers holding only the view slug
    /// never see the edit slug.
    pub async fn read_adventure(&self, slug: &str) -> AppResult<Adventure> {
        check_slug(slug)?;
        let mut adventure = self.store.fetch_adventure(slug, Permission::Ignore).await?;
        if adventure.permission == Permission::ReadOnly {
            self.store.count_view(adventure.id).await?;
            adventure.slug.clear();
        }
        Ok(adventure)
    }

    pub async fn fetch_by_id(&self, id: AdventureId) -> AppResult<Adventure> {
        self.store.fetch_adventure_by_id(id).await
    }

    /// Empty adventure shell
    #[instrument(skip(self))]
    pub async fn create_new(&self) -> AppResult<Adventure> {
        let skeleton = self.copies.rotate_identity(&[]).await?;
        info!(adventure_id = %skeleton.id, "Created new adventure");
        self.store.fetch_adventure_by_id(skeleton.id).await
    }

    /// Shell populated with the three-node starter graph
    #[instrument(skip(self))]
    pub async fn create_default(&self) -> AppResult<Adventure> {
        let skeleton = self.copies.rotate_identity(&[]).await?;
        let mut snapshot = self.store.fetch_adventure_by_id(skeleton.id).await?;
        let (nodes, links) = default_graph();
        snapshot.nodes = nodes;
        snapshot.links = links;

        let adventure = self.copies.commit_into(&skeleton, &snapshot).await?;
        info!(adventure_id = %adventure.id, "Created default adventure");
        Ok(adventure)
    }

    /// Start an editing session: identify the caller, bump the edit version,
    /// then check the access list
    #[instrument(skip(self, viewer), fields(request_id = %viewer.request_id))]
    pub async fn open_for_edit(&self, edit_slug: &str, viewer: &ViewerContext) -> AppResult<Adventure> {
        check_slug(edit_slug)?;
        // Unknown callers never move the version
        let caller = if viewer.is_system() {
            None
        } else {
            Some(self.caller(viewer).await?)
        };

        self.store.bump_edit_version(edit_slug).await?;
        let adventure = self.store.fetch_adventure(edit_slug, Permission::ReadWrite).await?;

        if let Some(user) = caller {
            if !user.is_admin() && !adventure.has_user(user.id) {
                return Err(AppError::Forbidden("No access to this adventure".to_string()));
            }
        }
        Ok(adventure)
    }

    async fn caller(&self, viewer: &ViewerContext) -> AppResult<User> {
        let user_id = viewer
            .user_id()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
        self.store.fetch_user(user_id).await.map_err(|e| match e {
            AppError::NotFound(_) => AppError::Unauthorized("Unknown user".to_string()),
            other => other,
        })
    }

    /// Admin routes accept the system viewer and tier 1 users
    pub async fn require_admin(&self, viewer: &ViewerContext) -> AppResult<()> {
        if viewer.is_system() {
            return Ok(());
        }
        if self.caller(viewer).await?.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }

    /// Admin metadata edit; also reconciles the editor access list
    #[instrument(skip(self, payload))]
    pub async fn update_metadata(&self, id: AdventureId, payload: &Adventure) -> AppResult<Adventure> {
        let existing = self.store.fetch_adventure_by_id(id).await?;

        if payload.view_slug.is_empty() {
            return Err(AppError::BadPayload("view_slug must not be empty".to_string()));
        }
        if payload.view_slug != existing.view_slug && self.store.slug_exists(&payload.view_slug).await? {
            return Err(AppError::BadPayload("view_slug is already taken".to_string()));
        }

        let mut updated = payload.clone();
        updated.id = id;
        self.store.update_adventure_metadata(&updated).await?;

        let wanted: HashSet<i64> = payload.users.iter().map(|u| u.id).collect();
        let current: HashSet<i64> = existing.users.iter().map(|u| u.id).collect();
        for user_id in current.difference(&wanted) {
            self.store.remove_adventure_user(id, *user_id).await?;
        }
        for user_id in wanted.difference(&current) {
            self.store.add_adventure_user(id, *user_id).await?;
        }

        self.store.fetch_adventure_by_id(id).await
    }

    /// Hard delete; the media folder is removed best effort
    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: AdventureId) -> AppResult<()> {
        let adventure = self.store.fetch_adventure_by_id(id).await?;
        self.store.delete_adventure_cascade(id).await?;

        let folder = media_dir(&self.upload_dir, &adventure.slug);
        if let Err(e) = self.media.remove_tree(&folder).await {
            warn!("Deleted adventure {} but could not remove {}: {}", id, folder, e);
        }
        info!(adventure_id = %id, "Deleted adventure");
        Ok(())
    }

    pub async fn search(&self, filter: AdventureFilter, page: Page) -> AppResult<AdventureListing> {
        if let AdventureFilter::Search(text) = &filter {
            if text.chars().count() < MIN_SEARCH_LEN {
                return Ok(AdventureListing::default());
            }
        }
        self.store.search_adventures(&filter, page).await
    }

    /// Only edit-slug holders are counted, so readers cannot skew statistics
    pub async fn record_node_visit(&self, edit_slug: &str, node_id: i64) -> AppResult<()> {
        check_slug(edit_slug)?;
        let adventure = self.store.fetch_adventure(edit_slug, Permission::ReadWrite).await?;
        self.store.log_node_visit(adventure.id, node_id).await
    }

    pub async fn node_statistics(
        &self,
        id: AdventureId,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> AppResult<Vec<NodeStat>> {
        if stop < start {
            return Err(AppError::BadPayload("stop is before start".to_string()));
        }
        self.store.node_statistics(id, start, stop).await
    }

    pub async fn report_adventure(&self, slug: &str, request: &ReportRequest) -> AppResult<Report> {
        check_slug(slug)?;
        if request.code.trim().is_empty() {
            return Err(AppError::BadPayload("Report reason is required".to_string()));
        }
        let adventure = self.store.fetch_adventure(slug, Permission::Ignore).await?;
        self.store
            .create_report(adventure.id, &request.code, &request.comment)
            .await
    }

    pub async fn reports(&self, handled: bool) -> AppResult<Vec<Report>> {
        self.store.reports(handled).await
    }

    pub async fn mark_report_handled(&self, report_id: i64, handled: bool) -> AppResult<()> {
        self.store.set_report_handled(report_id, handled).await
    }

    pub async fn categories(&self) -> AppResult<Vec<Category>> {
        self.store.categories().await
    }

    pub async fn category(&self, id: i64) -> AppResult<Category> {
        self.store.category(id).await
    }

    pub async fn save_category(&self, category: &Category) -> AppResult<Category> {
        if category.title.trim().is_empty() {
            return Err(AppError::BadPayload("Category title is required".to_string()));
        }
        if category.id == 0 {
            self.store.create_category(category).await
        } else {
            self.store.update_category(category).await
        }
    }

    pub async fn delete_category(&self, id: i64) -> AppResult<()> {
        if self.store.delete_category(id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Category not found".to_string()))
        }
    }

    /// Store an upload in the adventure's media folder and return its url
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_media(&self, edit_slug: &str, file_name: &str, bytes: &[u8]) -> AppResult<String> {
        check_slug(edit_slug)?;
        let adventure = self.store.fetch_adventure(edit_slug, Permission::ReadWrite).await?;
        let file_name = sanitize_file_name(file_name)?;

        let folder = media_dir(&self.upload_dir, &adventure.slug);
        self.media
            .write_file(&format!("{}/{}", folder, file_name), bytes)
            .await?;
        Ok(format!("/{}/{}", folder, file_name))
    }

    /// Remove a media file unless more than one node still uses it.
    /// Returns whether the file was removed.
    #[instrument(skip(self))]
    pub async fn delete_media(&self, edit_slug: &str, file_name: &str) -> AppResult<bool> {
        check_slug(edit_slug)?;
        let adventure = self.store.fetch_adventure(edit_slug, Permission::ReadWrite).await?;
        let file_name = sanitize_file_name(file_name)?;

        let references = adventure
            .nodes
            .iter()
            .filter(|node| node.references(&file_name))
            .take(2)
            .count();
        if references != 1 {
            info!("Keeping {}: referenced by {} nodes", file_name, references);
            return Ok(false);
        }

        let path = format!("{}/{}", media_dir(&self.upload_dir, &adventure.slug), file_name);
        self.media.remove_file(&path).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_graph_topology() {
        let (nodes, links) = default_graph();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].node_type, "root");
        assert_eq!(nodes[0].icon, "🏠");
        assert!(nodes.iter().all(|n| n.id.is_pending()));
        let edges: Vec<(i64, i64)> = links
            .iter()
            .map(|l| (l.source_node_id, l.target_node_id))
            .collect();
        assert_eq!(edges, vec![(0, 1), (0, 2)]);
        assert!(links.iter().all(|l| l.link_type == "bidirectional"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("photo.jpg").unwrap(), "photo.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_file_name("C:\\pics\\a.png").unwrap(), "a.png");
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name("dir/").is_err());
    }
}
