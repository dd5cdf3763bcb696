// Content reconciliation - diff an incoming graph snapshot against storage
// and apply it as one transaction

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::core::{check_slug, AdventureId, Permission};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::GraphStore;
use crate::infrastructure::leases::AdventureLeases;
use crate::models::{Adventure, GraphRow};

/// Writes needed to turn the persisted rows into the incoming rows
#[derive(Debug)]
pub struct RowPlan<'a, T> {
    /// Persisted storage ids absent from the incoming set
    pub deletes: Vec<i64>,
    /// Incoming rows that have no storage id yet
    pub inserts: Vec<&'a T>,
    /// Persisted incoming rows flagged as changed, with their storage id
    pub updates: Vec<(i64, &'a T)>,
    /// Persisted rows left untouched
    pub unchanged: usize,
}

impl<T> RowPlan<'_, T> {
    pub fn is_noop(&self) -> bool {
        self.deletes.is_empty() && self.inserts.is_empty() && self.updates.is_empty()
    }
}

pub fn plan_rows<'a, T: GraphRow>(persisted: &[T], incoming: &'a [T]) -> RowPlan<'a, T> {
    let incoming_ids: HashSet<i64> = incoming
        .iter()
        .filter_map(|row| row.row_id().persisted())
        .collect();

    let deletes = persisted
        .iter()
        .filter_map(|row| row.row_id().persisted())
        .filter(|id| !incoming_ids.contains(id))
        .collect();

    let mut inserts = Vec::new();
    let mut updates = Vec::new();
    let mut unchanged = 0;
    for row in incoming {
        match row.row_id().persisted() {
            None => inserts.push(row),
            Some(id) if row.is_changed() => updates.push((id, row)),
            Some(_) => unchanged += 1,
        }
    }

    RowPlan {
        deletes,
        inserts,
        updates,
        unchanged,
    }
}

/// Counts reported after a successful reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub nodes_deleted: usize,
    pub nodes_inserted: usize,
    pub nodes_updated: usize,
    pub links_deleted: usize,
    pub links_inserted: usize,
    pub links_updated: usize,
}

#[derive(Clone)]
pub struct ReconcileEngine {
    store: Arc<dyn GraphStore>,
    leases: AdventureLeases,
}

impl ReconcileEngine {
    pub fn new(store: Arc<dyn GraphStore>, leases: AdventureLeases) -> Self {
        Self { store, leases }
    }

    /// Apply an editor's snapshot to the adventure owning `edit_slug`
    #[instrument(skip(self, incoming), fields(incoming_version = incoming.edit_version))]
    pub async fn reconcile_content(&self, edit_slug: &str, incoming: &Adventure) -> AppResult<Adventure> {
        check_slug(edit_slug)?;
        let resolved = self.store.fetch_adventure(edit_slug, Permission::ReadWrite).await?;
        self.reconcile_by_id(resolved.id, incoming).await
    }

    /// Same as `reconcile_content` for an adventure already resolved to its id
    pub async fn reconcile_by_id(&self, id: AdventureId, incoming: &Adventure) -> AppResult<Adventure> {
        let _lease = self.leases.acquire(id).await;

        // Re-read under the lease so the checks see the latest committed state
        let persisted = self.store.fetch_adventure_by_id(id).await?;
        if persisted.locked {
            return Err(AppError::Locked("Adventure is read-only".to_string()));
        }
        if persisted.edit_version > incoming.edit_version {
            return Err(AppError::StaleWrite(format!(
                "Adventure was edited elsewhere (version {} > {})",
                persisted.edit_version, incoming.edit_version
            )));
        }

        let summary = self.write_snapshot(&persisted, incoming).await?;
        info!(adventure_id = %id, ?summary, "Reconciled adventure content");

        self.store.fetch_adventure_by_id(id).await
    }

    async fn write_snapshot(&self, persisted: &Adventure, incoming: &Adventure) -> AppResult<ReconcileSummary> {
        let id = persisted.id;
        let nodes = plan_rows(&persisted.nodes, &incoming.nodes);
        let links = plan_rows(&persisted.links, &incoming.links);
        debug!(
            unchanged_nodes = nodes.unchanged,
            unchanged_links = links.unchanged,
            "Planned content write"
        );

        let mut tx = self.store.begin_write().await?;
        tx.persist_adventure_fields(id, &incoming.fields()).await?;

        for row_id in &nodes.deletes {
            tx.delete_node(id, *row_id).await?;
        }
        for node in &nodes.inserts {
            tx.insert_node(id, node).await?;
        }
        for (row_id, node) in &nodes.updates {
            tx.update_node(id, *row_id, node).await?;
        }

        for row_id in &links.deletes {
            tx.delete_link(id, *row_id).await?;
        }
        for link in &links.inserts {
            tx.insert_link(id, link).await?;
        }
        for (row_id, link) in &links.updates {
            tx.update_link(id, *row_id, link).await?;
        }

        tx.commit().await?;

        Ok(ReconcileSummary {
            nodes_deleted: nodes.deletes.len(),
            nodes_inserted: nodes.inserts.len(),
            nodes_updated: nodes.updates.len(),
            links_deleted: links.deletes.len(),
            links_inserted: links.inserts.len(),
            links_updated: links.updates.len(),
        })
    }
}
