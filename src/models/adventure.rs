// Adventure aggregate - the root of a story graph

use crate::core::{AdventureId, Permission};
use crate::models::catalog::{Category, User};
use crate::models::graph::{Link, Node};
use crate::models::props::{AdventureProps, Props};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Full adventure snapshot as exchanged with editors and stored in archives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adventure {
    pub id: AdventureId,
    pub title: String,
    pub description: String,
    /// Edit slug; grants read-write access
    pub slug: String,
    pub view_slug: String,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub category: Category,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub cover_url: String,
    pub edit_version: i64,
    pub view_count: i64,
    pub props: Props<AdventureProps>,
    pub users: Vec<User>,
    /// Which slug the caller resolved this adventure through
    #[serde(skip)]
    pub permission: Permission,
}

impl Adventure {
    /// Deduplicated set of media references reachable from the graph
    pub fn referenced_assets(&self) -> BTreeSet<String> {
        let mut assets = BTreeSet::new();
        assets.insert(self.cover_url.clone());
        for node in &self.nodes {
            assets.extend(node.asset_urls().into_iter().map(str::to_string));
        }
        assets.extend(self.props.fields().font_list.iter().cloned());
        assets.remove("");
        assets
    }

    pub fn node(&self, node_id: i64) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    pub fn has_user(&self, user_id: i64) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }

    /// The scalar fields a content write overwrites
    pub fn fields(&self) -> AdventureFields {
        AdventureFields {
            title: self.title.clone(),
            description: self.description.clone(),
            category_id: self.category.id,
            locked: self.locked,
            cover_url: self.cover_url.clone(),
            props: self.props.raw().to_string(),
        }
    }
}

/// Last-writer-wins metadata written by a reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct AdventureFields {
    pub title: String,
    pub description: String,
    /// Zero means uncategorised
    pub category_id: i64,
    pub locked: bool,
    pub cover_url: String,
    pub props: String,
}

/// A freshly created, empty adventure row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdventureSkeleton {
    pub id: AdventureId,
    pub edit_slug: String,
    pub view_slug: String,
}

/// One page of an admin listing together with the total match count
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdventureListing {
    pub adventures: Vec<Adventure>,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_assets_skips_empty() {
        let adventure = Adventure {
            cover_url: "/upload/x/c.jpg".to_string(),
            nodes: vec![
                Node {
                    image_url: "/upload/x/n.jpg".to_string(),
                    ..Default::default()
                },
                Node::default(),
            ],
            ..Default::default()
        };
        let assets: Vec<String> = adventure.referenced_assets().into_iter().collect();
        assert_eq!(assets, vec!["/upload/x/c.jpg", "/upload/x/n.jpg"]);
    }

    #[test]
    fn test_referenced_assets_includes_props_and_fonts() {
        let adventure = Adventure {
            nodes: vec![Node {
                props: Props::from_raw(
                    r#"{"audio_url":"/upload/x/a.mp3","audio_url_alt":"/upload/x/a.mp3","subtitles_url":"/upload/x/s.vtt"}"#,
                ),
                ..Default::default()
            }],
            props: Props::from_raw(r#"{"font_list":["/upload/x/f.woff",""]}"#),
            ..Default::default()
        };
        let assets = adventure.referenced_assets();
        assert_eq!(assets.len(), 3);
        assert!(assets.contains("/upload/x/f.woff"));
        assert!(assets.contains("/upload/x/s.vtt"));
    }

    #[test]
    fn test_snapshot_field_names() {
        let adventure: Adventure = serde_json::from_str(
            r#"{"id":4,"title":"T","slug":"abcdefgh","view_slug":"v","edit_version":2,
                "category":{"id":1,"title":"Okategoriserad","icon":""},"nodes":[],"links":[],"users":[]}"#,
        )
        .unwrap();
        assert_eq!(adventure.id, AdventureId::new(4));
        assert_eq!(adventure.edit_version, 2);
        assert_eq!(adventure.fields().category_id, 1);

        let json = serde_json::to_value(&adventure).unwrap();
        for key in ["id", "title", "description", "slug", "view_slug", "category", "nodes", "links", "edit_version", "view_count", "users"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert!(json.get("permission").is_none());
    }

    #[test]
    fn test_empty_snapshot_keeps_every_archive_field() {
        let json = serde_json::to_value(Adventure::default()).unwrap();
        assert_eq!(json["slug"], "");
        assert_eq!(json["locked"], false);
        assert_eq!(json["cover_url"], "");
        assert_eq!(json["props"], "");

        let back: Adventure = serde_json::from_value(json).unwrap();
        assert_eq!(back, Adventure::default());
    }
}
