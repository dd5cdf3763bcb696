// Identity rotation and adventure copy
// A copy is a new adventure row whose content points at its own media folder

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::core::{check_slug, Permission, RowId, SlugPair};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::GraphStore;
use crate::infrastructure::media::MediaStore;
use crate::models::catalog::DEFAULT_CATEGORY_ID;
use crate::models::{Adventure, AdventureSkeleton};
use crate::services::reconcile::ReconcileEngine;

pub const NEW_ADVENTURE_TITLE: &str = "Nytt äventyr";
pub const COPY_TITLE_PREFIX: &str = "Copy of ";

const MAX_ROTATION_ATTEMPTS: usize = 16;

/// Relative media folder of an adventure
pub fn media_dir(upload_dir: &str, edit_slug: &str) -> String {
    format!("{}/{}", upload_dir.trim_matches('/'), edit_slug)
}

/// Rewrite a snapshot so it can be inserted under `target`.
///
/// Storage ids are cleared so every row is re-inserted; logical ids are kept.
/// Slug references are rewritten textually: first occurrence for single URL
/// fields, every occurrence for props documents.
pub fn rebase_snapshot(source: &Adventure, old_slug: &str, target: &AdventureSkeleton) -> Adventure {
    let new_slug = target.edit_slug.as_str();
    let rewrite_url = |url: &str| {
        if old_slug.is_empty() {
            url.to_string()
        } else {
            url.replacen(old_slug, new_slug, 1)
        }
    };

    let mut snapshot = source.clone();
    snapshot.id = target.id;
    snapshot.slug = target.edit_slug.clone();
    snapshot.view_slug = target.view_slug.clone();
    snapshot.edit_version = 0;
    snapshot.view_count = 0;
    snapshot.permission = Permission::ReadWrite;
    snapshot.cover_url = rewrite_url(&source.cover_url);
    snapshot.props = source.props.replace_all(old_slug, new_slug);

    for node in &mut snapshot.nodes {
        node.id = RowId::Pending;
        node.image_url = rewrite_url(&node.image_url);
        node.props = node.props.replace_all(old_slug, new_slug);
    }
    for link in &mut snapshot.links {
        link.id = RowId::Pending;
    }
    snapshot
}

#[derive(Clone)]
pub struct CopyService {
    store: Arc<dyn GraphStore>,
    media: Arc<dyn MediaStore>,
    engine: ReconcileEngine,
    upload_dir: String,
}

impl CopyService {
    pub fn new(
        store: Arc<dyn GraphStore>,
        media: Arc<dyn MediaStore>,
        engine: ReconcileEngine,
        upload_dir: impl Into<String>,
    ) -> Self {
        Self {
            store,
            media,
            engine,
            upload_dir: upload_dir.into(),
        }
    }

    /// Mint a new empty adventure whose slugs collide with nothing stored
    /// and with none of `avoid`
    pub async fn rotate_identity(&self, avoid: &[&str]) -> AppResult<AdventureSkeleton> {
        for _ in 0..MAX_ROTATION_ATTEMPTS {
            let pair = SlugPair::generate();
            if !pair.is_distinct_from(avoid) {
                continue;
            }
            if self.store.slug_exists(&pair.edit_slug).await?
                || self.store.slug_exists(&pair.view_slug).await?
            {
                warn!("Generated slug collided, retrying");
                continue;
            }
            return self
                .store
                .create_adventure_skeleton(
                    &pair.edit_slug,
                    &pair.view_slug,
                    NEW_ADVENTURE_TITLE,
                    DEFAULT_CATEGORY_ID,
                )
                .await;
        }
        Err(AppError::Internal(
            "Could not generate unique adventure slugs".to_string(),
        ))
    }

    /// Reconcile a rebased snapshot into a fresh skeleton, removing the
    /// skeleton again if the content write fails
    pub async fn commit_into(&self, skeleton: &AdventureSkeleton, snapshot: &Adventure) -> AppResult<Adventure> {
        match self.engine.reconcile_by_id(skeleton.id, snapshot).await {
            Ok(adventure) => Ok(adventure),
            Err(e) => {
                if let Err(cleanup) = self.store.delete_adventure_cascade(skeleton.id).await {
                    warn!("Failed to remove skeleton {}: {}", skeleton.id, cleanup);
                }
                Err(e)
            }
        }
    }

    /// Duplicate the adventure owning `source_slug` along with its media
    #[instrument(skip(self))]
    pub async fn copy_adventure(&self, source_slug: &str) -> AppResult<Adventure> {
        check_slug(source_slug)?;
        let source = self.store.fetch_adventure(source_slug, Permission::ReadWrite).await?;
        let skeleton = self
            .rotate_identity(&[source.slug.as_str(), source.view_slug.as_str()])
            .await?;

        let mut snapshot = rebase_snapshot(&source, &source.slug, &skeleton);
        snapshot.title = format!("{}{}", COPY_TITLE_PREFIX, source.title);

        let copied = self.commit_into(&skeleton, &snapshot).await?;

        // Content stays committed even when the media copy fails
        self.media
            .copy_tree(
                &media_dir(&self.upload_dir, &source.slug),
                &media_dir(&self.upload_dir, &skeleton.edit_slug),
            )
            .await
            .map_err(|e| {
                warn!("Copied adventure {} but media copy failed: {}", copied.id, e);
                e
            })?;

        info!(source = %source.id, copy = %copied.id, "Copied adventure");
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AdventureId;
    use crate::models::{Link, Node, Props};

    #[test]
    fn test_rebase_rewrites_references() {
        let source = Adventure {
            id: AdventureId::new(3),
            slug: "oldslug1".to_string(),
            view_slug: "viewviewviewview".to_string(),
            cover_url: "/upload/oldslug1/c.jpg".to_string(),
            edit_version: 9,
            nodes: vec![Node {
                id: RowId::Persisted(40),
                node_id: 2,
                image_url: "/upload/oldslug1/n.jpg".to_string(),
                props: Props::from_raw(
                    r#"{"audio_url":"/upload/oldslug1/a.mp3","subtitles_url":"/upload/oldslug1/s.vtt"}"#,
                ),
                ..Default::default()
            }],
            links: vec![Link {
                id: RowId::Persisted(50),
                link_id: 7,
                ..Default::default()
            }],
            ..Default::default()
        };
        let target = AdventureSkeleton {
            id: AdventureId::new(4),
            edit_slug: "newslug1".to_string(),
            view_slug: "NEWVIEWNEWVIEW12".to_string(),
        };

        let rebased = rebase_snapshot(&source, &source.slug, &target);
        assert_eq!(rebased.id, target.id);
        assert_eq!(rebased.edit_version, 0);
        assert_eq!(rebased.cover_url, "/upload/newslug1/c.jpg");
        assert_eq!(rebased.nodes[0].id, RowId::Pending);
        assert_eq!(rebased.nodes[0].node_id, 2);
        assert_eq!(rebased.nodes[0].image_url, "/upload/newslug1/n.jpg");
        assert!(!rebased.nodes[0].props.contains("oldslug1"));
        assert_eq!(
            rebased.nodes[0].props.fields().subtitles_url.as_deref(),
            Some("/upload/newslug1/s.vtt")
        );
        assert_eq!(rebased.links[0].id, RowId::Pending);
        assert_eq!(rebased.links[0].link_id, 7);
    }

    #[test]
    fn test_rebase_with_empty_slug_leaves_urls() {
        let source = Adventure {
            cover_url: "/upload/x/c.jpg".to_string(),
            ..Default::default()
        };
        let target = AdventureSkeleton {
            id: AdventureId::new(1),
            edit_slug: "abc".to_string(),
            view_slug: "def".to_string(),
        };
        assert_eq!(rebase_snapshot(&source, "", &target).cover_url, "/upload/x/c.jpg");
    }

    #[test]
    fn test_media_dir() {
        assert_eq!(media_dir("upload", "abc"), "upload/abc");
        assert_eq!(media_dir("/upload/", "abc"), "upload/abc");
    }
}
