// Graph rows - story nodes and the links between them

use crate::core::RowId;
use crate::models::props::{LinkProps, NodeProps, Props};
use serde::{Deserialize, Serialize};

/// A story vertex. `node_id` is the client's stable logical id and is what
/// links reference; `id` is the storage identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub id: RowId,
    pub node_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(rename = "text")]
    pub content: String,
    pub x: i64,
    pub y: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    pub image_id: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_layout_type: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub node_type: String,
    /// Dirty flag set by the editor; only changed persisted rows get written
    pub changed: bool,
    #[serde(skip_serializing_if = "Props::is_empty")]
    pub props: Props<NodeProps>,
}

impl Node {
    /// Every media reference this node carries, empty ones excluded
    pub fn asset_urls(&self) -> Vec<&str> {
        let mut urls = Vec::new();
        if !self.image_url.is_empty() {
            urls.push(self.image_url.as_str());
        }
        urls.extend(self.props.fields().asset_urls());
        urls
    }

    /// True when the image url or props document mentions `needle`
    pub fn references(&self, needle: &str) -> bool {
        self.image_url.contains(needle) || self.props.contains(needle)
    }
}

/// An edge between two nodes, addressed by logical node ids
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    pub id: RowId,
    pub link_id: i64,
    #[serde(rename = "source")]
    pub source_node_id: i64,
    #[serde(rename = "source_title")]
    pub source_link_title: String,
    #[serde(rename = "target")]
    pub target_node_id: i64,
    #[serde(rename = "target_title")]
    pub target_link_title: String,
    #[serde(rename = "type")]
    pub link_type: String,
    pub changed: bool,
    #[serde(skip_serializing_if = "Props::is_empty")]
    pub props: Props<LinkProps>,
}

/// Rows that live under an adventure and carry a storage id plus a dirty flag
pub trait GraphRow {
    fn row_id(&self) -> RowId;
    fn is_changed(&self) -> bool;
}

impl GraphRow for Node {
    fn row_id(&self) -> RowId {
        self.id
    }

    fn is_changed(&self) -> bool {
        self.changed
    }
}

impl GraphRow for Link {
    fn row_id(&self) -> RowId {
        self.id
    }

    fn is_changed(&self) -> bool {
        self.changed
    }
}
