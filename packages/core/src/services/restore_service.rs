//! Restore Service - reversing history recorded in the audit log
//!
//! Two operations, both preceded by a backup of the storage file and both
//! run in a single transaction:
//!
//! - **Entity restore** reverses one audit entry of one node or edge and
//!   records the reversal as `restore` (data recreated or reverted) or
//!   `restore_delete` (entity removed).
//! - **Timestamp restore** walks every entry newer than a point in time,
//!   newest first, and reverses each node/edge entry. Entries written by
//!   restores are skipped, so a reversal is never itself reversed.
//!
//! If the backup fails nothing is touched. If the reversal fails the
//! transaction rolls back and the backup stays on disk.
//!
//! # Inverse mapping
//!
//! | recorded action | node                     | edge                                  |
//! |-----------------|--------------------------|---------------------------------------|
//! | `delete`        | re-insert `old_data`     | re-insert `old_data` (endpoints must exist) |
//! | `create`        | delete node and its edges| delete edge                           |
//! | `update`        | overwrite with `old_data`| overwrite endpoints and payload       |

use crate::db::audit_log::{self, NewAuditEntry};
use crate::db::graph_queries as queries;
use crate::db::{begin_transaction, finish_transaction, random_suffix, GraphEvent};
use crate::models::time::format_timestamp;
use crate::models::{
    edge_payload, node_payload, AuditAction, AuditActor, AuditEntry, EdgeEndpoints, EntityData,
    EntityType,
};
use crate::services::error::GraphServiceError;
use crate::services::graph_service::{GraphService, SYSTEM_ENTITY_ID};
use chrono::{DateTime, Utc};
use libsql::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Outcome of a restore-to-timestamp pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRestoreSummary {
    pub timestamp: DateTime<Utc>,
    /// Node/edge entries whose inverse was applied
    pub operations_reversed: usize,
    /// Entries left alone: restore-tagged, non-graph, or unsafe to replay
    pub entries_skipped: usize,
    /// Backup taken before the pass
    pub backup_name: String,
}

/// Reverses recorded mutations through the graph service's store
pub struct RestoreService {
    graph: Arc<GraphService>,
}

impl RestoreService {
    pub fn new(graph: Arc<GraphService>) -> Self {
        Self { graph }
    }

    /// Reverse the single action recorded by audit entry `audit_id`
    ///
    /// The entry must belong to `entity_type`/`entity_id`. Only node and edge
    /// `create`/`update`/`delete` entries can be reversed.
    pub async fn restore_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        audit_id: i64,
        actor: &AuditActor,
    ) -> Result<(), GraphServiceError> {
        let db = self.graph.db();
        let _guard = db.lock_writes().await;

        let backup_name = format!(
            "pre_restore_entity_{}_{}_{}_{}",
            entity_type,
            sanitize_for_file_name(entity_id),
            db.now().format("%Y-%m-%d_%H-%M-%S"),
            random_suffix()
        );
        self.graph
            .create_backup_locked(Some(&backup_name), actor)
            .await
            .map_err(GraphServiceError::BackupFailed)?;

        let conn = db.connection().await?;
        begin_transaction(&conn).await?;
        let result = self
            .restore_entity_tx(&conn, entity_type, entity_id, audit_id, actor)
            .await;
        let events = finish_transaction(&conn, result).await?;

        tracing::info!(
            entity_type = %entity_type,
            entity_id = %entity_id,
            audit_id,
            backup_name = %backup_name,
            "entity restored"
        );
        for event in events {
            self.graph.emit_event(event);
        }
        Ok(())
    }

    async fn restore_entity_tx(
        &self,
        conn: &Connection,
        entity_type: EntityType,
        entity_id: &str,
        audit_id: i64,
        actor: &AuditActor,
    ) -> Result<Vec<GraphEvent>, GraphServiceError> {
        let entry = audit_log::entry_by_id(conn, audit_id, entity_type, entity_id)
            .await?
            .ok_or_else(|| GraphServiceError::AuditEntryNotFound {
                audit_id,
                entity_type,
                entity_id: entity_id.to_string(),
            })?;

        let now = self.graph.db().now_timestamp();

        match (entry.entity_type, entry.action) {
            (EntityType::Node, AuditAction::Delete) => {
                self.recreate_node(conn, &entry, actor, &now).await
            }
            (EntityType::Node, AuditAction::Create) => {
                self.remove_created_node(conn, &entry, actor, &now).await
            }
            (EntityType::Node, AuditAction::Update) => {
                self.revert_node(conn, &entry, actor, &now).await
            }
            (EntityType::Edge, AuditAction::Delete) => {
                self.recreate_edge(conn, &entry, actor, &now).await
            }
            (EntityType::Edge, AuditAction::Create) => {
                self.remove_created_edge(conn, &entry, actor, &now).await
            }
            (EntityType::Edge, AuditAction::Update) => {
                self.revert_edge(conn, &entry, actor, &now).await
            }
            (entity_type, action) => Err(GraphServiceError::NotReversible {
                audit_id,
                entity_type,
                action,
            }),
        }
    }

    async fn recreate_node(
        &self,
        conn: &Connection,
        entry: &AuditEntry,
        actor: &AuditActor,
        now: &str,
    ) -> Result<Vec<GraphEvent>, GraphServiceError> {
        let id = entry.entity_id.as_str();
        let payload = node_payload(id, snapshot(entry)?);

        if queries::node_exists(conn, id).await? {
            return Err(GraphServiceError::DuplicateNode { id: id.to_string() });
        }
        queries::insert_node(conn, id, &payload, now).await?;

        let new_data = Value::Object(payload.clone());
        record(conn, EntityType::Node, id, AuditAction::Restore, None, Some(&new_data), actor, now)
            .await?;

        Ok(vec![GraphEvent::NodeCreated {
            id: id.to_string(),
            data: payload,
        }])
    }

    /// Incident edges go first, each with its own `restore_delete` entry
    async fn remove_created_node(
        &self,
        conn: &Connection,
        entry: &AuditEntry,
        actor: &AuditActor,
        now: &str,
    ) -> Result<Vec<GraphEvent>, GraphServiceError> {
        let id = entry.entity_id.as_str();
        let current = queries::fetch_node_data(conn, id)
            .await?
            .ok_or_else(|| GraphServiceError::node_not_found(id))?;

        let edges = queries::fetch_incident_edges(conn, id).await?;
        queries::delete_incident_edges(conn, id).await?;
        let removed = self
            .graph
            .audit_edge_deletes(conn, edges, actor, AuditAction::RestoreDelete, now)
            .await?;

        queries::delete_node_row(conn, id).await?;
        let old_data = Value::Object(current);
        record(
            conn,
            EntityType::Node,
            id,
            AuditAction::RestoreDelete,
            Some(&old_data),
            None,
            actor,
            now,
        )
        .await?;

        let mut events: Vec<GraphEvent> = removed
            .into_iter()
            .map(|edge_id| GraphEvent::EdgeDeleted { id: edge_id })
            .collect();
        events.push(GraphEvent::NodeDeleted { id: id.to_string() });
        Ok(events)
    }

    async fn revert_node(
        &self,
        conn: &Connection,
        entry: &AuditEntry,
        actor: &AuditActor,
        now: &str,
    ) -> Result<Vec<GraphEvent>, GraphServiceError> {
        let id = entry.entity_id.as_str();
        let payload = node_payload(id, snapshot(entry)?);
        let current = queries::fetch_node_data(conn, id)
            .await?
            .ok_or_else(|| GraphServiceError::node_not_found(id))?;

        queries::update_node_data(conn, id, &payload, now).await?;

        let old_data = Value::Object(current);
        let new_data = Value::Object(payload.clone());
        record(
            conn,
            EntityType::Node,
            id,
            AuditAction::Restore,
            Some(&old_data),
            Some(&new_data),
            actor,
            now,
        )
        .await?;

        Ok(vec![GraphEvent::NodeUpdated {
            id: id.to_string(),
            data: payload,
        }])
    }

    async fn recreate_edge(
        &self,
        conn: &Connection,
        entry: &AuditEntry,
        actor: &AuditActor,
        now: &str,
    ) -> Result<Vec<GraphEvent>, GraphServiceError> {
        let id = entry.entity_id.as_str();
        let data = snapshot(entry)?;
        let endpoints = endpoints(entry, &data)?;

        if queries::edge_exists_by_id(conn, id).await? {
            return Err(GraphServiceError::DuplicateEdge { id: id.to_string() });
        }
        require_endpoints(conn, id, &endpoints).await?;

        let payload = edge_payload(id, &endpoints.source, &endpoints.target, data);
        queries::insert_edge(conn, id, &endpoints.source, &endpoints.target, &payload, now)
            .await?;

        let new_data = Value::Object(payload);
        record(conn, EntityType::Edge, id, AuditAction::Restore, None, Some(&new_data), actor, now)
            .await?;

        Ok(vec![GraphEvent::EdgeCreated {
            id: id.to_string(),
            source: endpoints.source,
            target: endpoints.target,
        }])
    }

    async fn remove_created_edge(
        &self,
        conn: &Connection,
        entry: &AuditEntry,
        actor: &AuditActor,
        now: &str,
    ) -> Result<Vec<GraphEvent>, GraphServiceError> {
        let id = entry.entity_id.as_str();
        let current = queries::fetch_edge_data(conn, id)
            .await?
            .ok_or_else(|| GraphServiceError::edge_not_found(id))?;

        queries::delete_edge_row(conn, id).await?;
        self.graph
            .audit_edge_deletes(
                conn,
                vec![(id.to_string(), current)],
                actor,
                AuditAction::RestoreDelete,
                now,
            )
            .await?;

        Ok(vec![GraphEvent::EdgeDeleted { id: id.to_string() }])
    }

    async fn revert_edge(
        &self,
        conn: &Connection,
        entry: &AuditEntry,
        actor: &AuditActor,
        now: &str,
    ) -> Result<Vec<GraphEvent>, GraphServiceError> {
        let id = entry.entity_id.as_str();
        let data = snapshot(entry)?;
        let endpoints = endpoints(entry, &data)?;

        let current = queries::fetch_edge_data(conn, id)
            .await?
            .ok_or_else(|| GraphServiceError::edge_not_found(id))?;
        require_endpoints(conn, id, &endpoints).await?;

        let payload = edge_payload(id, &endpoints.source, &endpoints.target, data);
        queries::update_edge(conn, id, &endpoints.source, &endpoints.target, &payload, now)
            .await?;

        let old_data = Value::Object(current);
        let new_data = Value::Object(payload);
        record(
            conn,
            EntityType::Edge,
            id,
            AuditAction::Restore,
            Some(&old_data),
            Some(&new_data),
            actor,
            now,
        )
        .await?;

        Ok(vec![GraphEvent::EdgeUpdated {
            id: id.to_string(),
            source: endpoints.source,
            target: endpoints.target,
        }])
    }

    /// Reverse every node/edge mutation recorded after `timestamp`
    ///
    /// Running it twice with the same timestamp and no writes in between
    /// leaves the graph in the same state; each run adds its own backup and
    /// summary entry.
    pub async fn restore_to_timestamp(
        &self,
        timestamp: DateTime<Utc>,
        actor: &AuditActor,
    ) -> Result<TimestampRestoreSummary, GraphServiceError> {
        let db = self.graph.db();
        let _guard = db.lock_writes().await;

        let backup_name = format!(
            "pre_restore_timestamp_{}_{}",
            timestamp.format("%Y-%m-%d_%H-%M-%S"),
            random_suffix()
        );
        self.graph
            .create_backup_locked(Some(&backup_name), actor)
            .await
            .map_err(GraphServiceError::BackupFailed)?;

        let conn = db.connection().await?;
        begin_transaction(&conn).await?;
        let result = self.restore_to_timestamp_tx(&conn, timestamp, actor).await;
        let (operations_reversed, entries_skipped) = finish_transaction(&conn, result).await?;

        tracing::info!(
            timestamp = %format_timestamp(timestamp),
            operations_reversed,
            entries_skipped,
            backup_name = %backup_name,
            "graph restored to timestamp"
        );
        self.graph.emit_event(GraphEvent::GraphRestored {
            timestamp,
            operations_reversed,
        });

        Ok(TimestampRestoreSummary {
            timestamp,
            operations_reversed,
            entries_skipped,
            backup_name,
        })
    }

    async fn restore_to_timestamp_tx(
        &self,
        conn: &Connection,
        timestamp: DateTime<Utc>,
        actor: &AuditActor,
    ) -> Result<(usize, usize), GraphServiceError> {
        let entries = audit_log::entries_after(conn, timestamp).await?;
        let now = self.graph.db().now_timestamp();

        let mut reversed = 0;
        let mut skipped = 0;
        for entry in &entries {
            if reverse_after_timestamp(conn, entry, &now).await? {
                reversed += 1;
            } else {
                skipped += 1;
            }
        }

        let summary = json!({
            "timestamp": format_timestamp(timestamp),
            "operations_reversed": reversed,
            "entries_skipped": skipped,
        });
        record(
            conn,
            EntityType::System,
            SYSTEM_ENTITY_ID,
            AuditAction::RestoreToTimestamp,
            None,
            Some(&summary),
            actor,
            &now,
        )
        .await?;

        Ok((reversed, skipped))
    }
}

/// Apply the inverse of one entry during a timestamp pass
///
/// Returns `false` when the entry is skipped. Re-insertions ignore ids that
/// already exist, and edges are only recreated or re-pointed when both
/// endpoints exist at that moment of the walk.
async fn reverse_after_timestamp(
    conn: &Connection,
    entry: &AuditEntry,
    now: &str,
) -> Result<bool, GraphServiceError> {
    if entry.action.is_reversal() {
        return Ok(false);
    }

    let id = entry.entity_id.as_str();

    match (entry.entity_type, entry.action) {
        (EntityType::Node, AuditAction::Delete) => {
            let Some(data) = entry.old_object() else {
                return Ok(false);
            };
            let payload = node_payload(id, data.clone());
            queries::insert_node_if_absent(conn, id, &payload, now).await?;
            Ok(true)
        }
        (EntityType::Node, AuditAction::Create) => {
            queries::delete_incident_edges(conn, id).await?;
            queries::delete_node_row(conn, id).await?;
            Ok(true)
        }
        (EntityType::Node, AuditAction::Update) => {
            let Some(data) = entry.old_object() else {
                return Ok(false);
            };
            queries::update_node_data(conn, id, &node_payload(id, data.clone()), now).await?;
            Ok(true)
        }
        (EntityType::Edge, AuditAction::Delete) | (EntityType::Edge, AuditAction::Update) => {
            let Some(data) = entry.old_object() else {
                return Ok(false);
            };
            let Ok(ends) = EdgeEndpoints::from_data(data) else {
                tracing::warn!(audit_id = entry.id, edge_id = %id, "edge snapshot lacks endpoints");
                return Ok(false);
            };
            if !queries::node_exists(conn, &ends.source).await?
                || !queries::node_exists(conn, &ends.target).await?
            {
                tracing::debug!(audit_id = entry.id, edge_id = %id, "endpoint missing, edge not replayed");
                return Ok(false);
            }

            let payload = edge_payload(id, &ends.source, &ends.target, data.clone());
            if entry.action == AuditAction::Delete {
                queries::insert_edge_if_absent(conn, id, &ends.source, &ends.target, &payload, now)
                    .await?;
            } else {
                queries::update_edge(conn, id, &ends.source, &ends.target, &payload, now).await?;
            }
            Ok(true)
        }
        (EntityType::Edge, AuditAction::Create) => {
            queries::delete_edge_row(conn, id).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

#[allow(clippy::too_many_arguments)]
async fn record(
    conn: &Connection,
    entity_type: EntityType,
    entity_id: &str,
    action: AuditAction,
    old_data: Option<&Value>,
    new_data: Option<&Value>,
    actor: &AuditActor,
    now: &str,
) -> Result<i64, GraphServiceError> {
    let id = audit_log::append(
        conn,
        NewAuditEntry {
            entity_type,
            entity_id,
            action,
            old_data,
            new_data,
        },
        actor,
        now,
    )
    .await?;
    Ok(id)
}

/// `old_data` of the entry as a payload map
fn snapshot(entry: &AuditEntry) -> Result<EntityData, GraphServiceError> {
    entry
        .old_object()
        .cloned()
        .ok_or_else(|| GraphServiceError::invalid_snapshot(entry.id, "old_data is not an object"))
}

fn endpoints(entry: &AuditEntry, data: &EntityData) -> Result<EdgeEndpoints, GraphServiceError> {
    EdgeEndpoints::from_data(data).map_err(|e| GraphServiceError::invalid_snapshot(entry.id, e.to_string()))
}

async fn require_endpoints(
    conn: &Connection,
    edge_id: &str,
    endpoints: &EdgeEndpoints,
) -> Result<(), GraphServiceError> {
    for node_id in [&endpoints.source, &endpoints.target] {
        if !queries::node_exists(conn, node_id).await? {
            return Err(GraphServiceError::dangling_edge(edge_id, node_id.as_str()));
        }
    }
    Ok(())
}

/// Keep ids usable inside a backup file name
fn sanitize_for_file_name(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{BackupManager, DatabaseService, DEFAULT_BACKUP_DIR};
    use crate::models::as_entity_data;
    use crate::models::time::{MockTimeProvider, TimeProvider};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    struct Harness {
        graph: Arc<GraphService>,
        restore: RestoreService,
        clock: Arc<MockTimeProvider>,
        _tmp: TempDir,
    }

    async fn harness() -> Harness {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("graph.db");
        let clock = Arc::new(MockTimeProvider::with_time(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let db = Arc::new(
            DatabaseService::with_options(db_path.clone(), 5000, clock.clone())
                .await
                .unwrap(),
        );
        let graph = Arc::new(GraphService::new(
            db,
            BackupManager::new(&db_path, DEFAULT_BACKUP_DIR),
        ));
        Harness {
            restore: RestoreService::new(graph.clone()),
            graph,
            clock,
            _tmp: tmp,
        }
    }

    impl Harness {
        fn tick(&self) {
            self.clock.advance(Duration::seconds(1));
        }

        async fn latest(&self, entity_type: EntityType, id: &str) -> AuditEntry {
            self.graph
                .audit_history(Some(entity_type), Some(id))
                .await
                .unwrap()
                .remove(0)
        }
    }

    #[tokio::test]
    async fn test_restore_create_entry_removes_node_and_edges() {
        let h = harness().await;
        let actor = AuditActor::system();
        h.graph.add_node("a", EntityData::new(), &actor).await.unwrap();
        h.graph.add_node("b", EntityData::new(), &actor).await.unwrap();
        h.graph.add_edge("e1", "a", "b", EntityData::new(), &actor).await.unwrap();

        let create = h
            .graph
            .audit_history(Some(EntityType::Node), Some("b"))
            .await
            .unwrap()
            .pop()
            .unwrap();
        h.tick();
        h.restore
            .restore_entity(EntityType::Node, "b", create.id, &actor)
            .await
            .unwrap();

        assert!(!h.graph.node_exists("b").await.unwrap());
        assert!(!h.graph.edge_exists_by_id("e1").await.unwrap());
        assert_eq!(h.latest(EntityType::Edge, "e1").await.action, AuditAction::RestoreDelete);
        assert_eq!(h.latest(EntityType::Node, "b").await.action, AuditAction::RestoreDelete);
    }

    #[tokio::test]
    async fn test_restore_update_entry_reverts_payload() {
        let h = harness().await;
        let actor = AuditActor::system();
        h.graph
            .add_node("n1", as_entity_data(json!({"v": 1})).unwrap(), &actor)
            .await
            .unwrap();
        h.tick();
        h.graph
            .update_node("n1", as_entity_data(json!({"v": 2})).unwrap(), &actor)
            .await
            .unwrap();

        let update = h.latest(EntityType::Node, "n1").await;
        h.restore
            .restore_entity(EntityType::Node, "n1", update.id, &actor)
            .await
            .unwrap();

        assert_eq!(h.graph.get_node("n1").await.unwrap().unwrap()["v"], 1);
        let restore = h.latest(EntityType::Node, "n1").await;
        assert_eq!(restore.action, AuditAction::Restore);
        assert_eq!(restore.new_data, Some(json!({"id": "n1", "v": 1})));
    }

    #[tokio::test]
    async fn test_restore_deleted_edge_needs_endpoints() {
        let h = harness().await;
        let actor = AuditActor::system();
        h.graph.add_node("n1", EntityData::new(), &actor).await.unwrap();
        h.graph.add_node("n2", EntityData::new(), &actor).await.unwrap();
        h.graph.add_edge("e1", "n1", "n2", EntityData::new(), &actor).await.unwrap();
        h.tick();
        h.graph.remove_node("n1", &actor).await.unwrap();

        let edge_delete = h.latest(EntityType::Edge, "e1").await;
        let err = h
            .restore
            .restore_entity(EntityType::Edge, "e1", edge_delete.id, &actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphServiceError::DanglingEdge { ref node_id, .. } if node_id == "n1"));

        let node_delete = h.latest(EntityType::Node, "n1").await;
        h.restore
            .restore_entity(EntityType::Node, "n1", node_delete.id, &actor)
            .await
            .unwrap();
        h.restore
            .restore_entity(EntityType::Edge, "e1", edge_delete.id, &actor)
            .await
            .unwrap();
        assert!(h.graph.edge_exists("n2", "n1").await.unwrap());
    }

    #[tokio::test]
    async fn test_restore_rejects_foreign_and_irreversible_entries() {
        let h = harness().await;
        let actor = AuditActor::system();
        h.graph.add_node("n1", EntityData::new(), &actor).await.unwrap();
        let create = h.latest(EntityType::Node, "n1").await;

        let err = h
            .restore
            .restore_entity(EntityType::Node, "other", create.id, &actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphServiceError::AuditEntryNotFound { .. }));

        let backup = h.graph.create_backup(Some("manual"), &actor).await.unwrap();
        assert_eq!(backup.backup_name, "manual");
        let backup_entry = h.latest(EntityType::System, SYSTEM_ENTITY_ID).await;
        let err = h
            .restore
            .restore_entity(EntityType::System, SYSTEM_ENTITY_ID, backup_entry.id, &actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphServiceError::NotReversible { .. }));
        assert!(h.graph.node_exists("n1").await.unwrap());
    }

    #[tokio::test]
    async fn test_timestamp_restore_reverses_later_work() {
        let h = harness().await;
        let actor = AuditActor::system();
        h.graph.add_node("a", EntityData::new(), &actor).await.unwrap();
        h.graph.add_node("b", EntityData::new(), &actor).await.unwrap();
        h.graph.add_edge("e1", "a", "b", EntityData::new(), &actor).await.unwrap();

        h.tick();
        let cutoff = h.clock.now();
        h.tick();

        h.graph.add_node("c", EntityData::new(), &actor).await.unwrap();
        h.graph.remove_node("a", &actor).await.unwrap();
        h.tick();

        let summary = h.restore.restore_to_timestamp(cutoff, &actor).await.unwrap();
        assert_eq!(summary.operations_reversed, 3);
        assert!(summary.backup_name.starts_with("pre_restore_timestamp_"));

        let snapshot = h.graph.get().await.unwrap();
        let mut nodes = snapshot.node_ids();
        nodes.sort_unstable();
        assert_eq!(nodes, vec!["a", "b"]);
        assert_eq!(snapshot.edge_ids(), vec!["e1"]);

        let entry = h.latest(EntityType::System, SYSTEM_ENTITY_ID).await;
        assert_eq!(entry.action, AuditAction::RestoreToTimestamp);
        assert_eq!(entry.new_data.as_ref().unwrap()["operations_reversed"], 3);
    }

    #[tokio::test]
    async fn test_timestamp_restore_skips_restore_entries() {
        let h = harness().await;
        let actor = AuditActor::system();
        let cutoff = h.clock.now();
        h.tick();

        h.graph.add_node("n1", EntityData::new(), &actor).await.unwrap();
        h.tick();
        let create = h.latest(EntityType::Node, "n1").await;
        h.restore
            .restore_entity(EntityType::Node, "n1", create.id, &actor)
            .await
            .unwrap();
        h.tick();

        h.restore.restore_to_timestamp(cutoff, &actor).await.unwrap();
        assert!(!h.graph.node_exists("n1").await.unwrap());
    }

    #[test]
    fn test_sanitize_for_file_name() {
        assert_eq!(sanitize_for_file_name("web-1"), "web-1");
        assert_eq!(sanitize_for_file_name("../etc/x y"), "___etc_x_y");
    }
}
