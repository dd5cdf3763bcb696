// Graph Store Interface - persistence contract for adventures and their content
// The reconciliation engine only talks to storage through these traits

use crate::core::{AdventureId, Permission};
use crate::error::AppResult;
use crate::models::{
    Adventure, AdventureFields, AdventureListing, AdventureSkeleton, Category, Link, Node,
    NodeStat, Report, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Filter for the admin adventure listing
#[derive(Debug, Clone, PartialEq)]
pub enum AdventureFilter {
    /// Category id 0 selects uncategorised adventures
    Category(i64),
    /// Substring match over titles, descriptions, node and link text
    Search(String),
    ReportReason(String),
}

/// Largest page a listing returns
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page selection for listings; `page_index` starts at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page_size: i64,
    pub page_index: i64,
}

impl Page {
    /// Out-of-range values fall back to the defaults or are clamped
    pub fn new(page_size: Option<i64>, page_index: Option<i64>) -> Self {
        let defaults = Self::default();
        Self {
            page_size: page_size
                .filter(|s| *s > 0)
                .map_or(defaults.page_size, |s| s.min(MAX_PAGE_SIZE)),
            page_index: page_index.filter(|i| *i > 0).unwrap_or(defaults.page_index),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page_index.max(1) - 1).saturating_mul(self.page_size.max(0))
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page_size: 20,
            page_index: 1,
        }
    }
}

/// Read side and one-shot writes of the adventure store
#[async_trait]
pub trait GraphStore: Send + Sync {
    // Adventure resolution
    async fn fetch_adventure(&self, slug: &str, mode: Permission) -> AppResult<Adventure>;
    async fn fetch_adventure_by_id(&self, id: AdventureId) -> AppResult<Adventure>;

    /// True when either slug column already holds `slug`
    async fn slug_exists(&self, slug: &str) -> AppResult<bool>;

    /// Insert an empty adventure row under the given slugs
    async fn create_adventure_skeleton(
        &self,
        edit_slug: &str,
        view_slug: &str,
        title: &str,
        category_id: i64,
    ) -> AppResult<AdventureSkeleton>;

    /// Removes the adventure row; nodes, links, reports and logs go with it
    async fn delete_adventure_cascade(&self, id: AdventureId) -> AppResult<bool>;

    async fn bump_edit_version(&self, edit_slug: &str) -> AppResult<()>;
    async fn count_view(&self, id: AdventureId) -> AppResult<()>;

    /// Admin metadata write, including the view slug
    async fn update_adventure_metadata(&self, adventure: &Adventure) -> AppResult<()>;
    async fn add_adventure_user(&self, id: AdventureId, user_id: i64) -> AppResult<()>;
    async fn remove_adventure_user(&self, id: AdventureId, user_id: i64) -> AppResult<()>;
    async fn fetch_user(&self, user_id: i64) -> AppResult<User>;

    async fn search_adventures(
        &self,
        filter: &AdventureFilter,
        page: Page,
    ) -> AppResult<AdventureListing>;

    // Statistics
    async fn log_node_visit(&self, id: AdventureId, node_id: i64) -> AppResult<()>;
    async fn node_statistics(
        &self,
        id: AdventureId,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> AppResult<Vec<NodeStat>>;

    // Moderation reports
    async fn create_report(&self, id: AdventureId, reason: &str, comment: &str)
        -> AppResult<Report>;
    async fn reports(&self, handled: bool) -> AppResult<Vec<Report>>;
    async fn set_report_handled(&self, report_id: i64, handled: bool) -> AppResult<()>;

    // Categories
    async fn categories(&self) -> AppResult<Vec<Category>>;
    async fn category(&self, id: i64) -> AppResult<Category>;
    async fn create_category(&self, category: &Category) -> AppResult<Category>;
    async fn update_category(&self, category: &Category) -> AppResult<Category>;
    async fn delete_category(&self, id: i64) -> AppResult<bool>;

    /// Open a write transaction for one reconciliation
    async fn begin_write(&self) -> AppResult<Box<dyn GraphWriteTx>>;
}

/// All content sub-writes of one reconciliation. Dropping without `commit`
/// rolls every write back.
#[async_trait]
pub trait GraphWriteTx: Send {
    async fn persist_adventure_fields(
        &mut self,
        id: AdventureId,
        fields: &AdventureFields,
    ) -> AppResult<()>;

    /// Returns the storage id assigned to the new row
    async fn insert_node(&mut self, id: AdventureId, node: &Node) -> AppResult<i64>;
    async fn update_node(&mut self, id: AdventureId, row_id: i64, node: &Node) -> AppResult<()>;
    async fn delete_node(&mut self, id: AdventureId, row_id: i64) -> AppResult<()>;

    async fn insert_link(&mut self, id: AdventureId, link: &Link) -> AppResult<i64>;
    async fn update_link(&mut self, id: AdventureId, row_id: i64, link: &Link) -> AppResult<()>;
    async fn delete_link(&mut self, id: AdventureId, row_id: i64) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        let page = Page {
            page_size: 10,
            page_index: 3,
        };
        assert_eq!(page.offset(), 20);

        let first = Page {
            page_size: 10,
            page_index: 0,
        };
        assert_eq!(first.offset(), 0);
    }

    #[test]
    fn test_huge_pages_do_not_overflow() {
        let page = Page {
            page_size: i64::MAX / 2,
            page_index: 4,
        };
        assert_eq!(page.offset(), i64::MAX);

        let clamped = Page::new(Some(i64::MAX / 2), Some(i64::MAX));
        assert_eq!(clamped.page_size, MAX_PAGE_SIZE);
        assert_eq!(clamped.offset(), i64::MAX);

        let fallback = Page::new(Some(-5), Some(0));
        assert_eq!(fallback, Page::default());
    }
}
