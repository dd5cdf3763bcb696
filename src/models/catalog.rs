// Catalog entities around adventures: categories, editors, reports, visit stats

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category every new adventure starts in
pub const DEFAULT_CATEGORY_ID: i64 = 1;
pub const DEFAULT_CATEGORY_TITLE: &str = "Okategoriserad";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub id: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub sort_order: i64,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub icon: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// Editor or administrator account. Role 1 is the administrator tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub role: i64,
}

impl User {
    pub const ADMIN_ROLE: i64 = 1;

    pub fn is_admin(&self) -> bool {
        self.role <= Self::ADMIN_ROLE
    }
}

/// Moderation report filed against an adventure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub adventure_id: i64,
    pub report_reason: String,
    pub comment: String,
    pub is_handled: i64,
    pub created_at: DateTime<Utc>,
}

/// Body of a report submitted from the player
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportRequest {
    pub code: String,
    pub comment: String,
}

/// Visit count for one logical node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStat {
    pub node_id: i64,
    pub title: String,
    pub visit_count: i64,
}
