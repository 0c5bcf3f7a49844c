//! Graph Store Facade
//!
//! [`Graph`] wires the services to one storage file and exposes the
//! caller-facing contract: mutations report `bool`, lookups `Option`,
//! listings an empty `Vec` on failure, and backups a [`BackupReport`]. Every
//! failure is logged here with its cause; callers that need the cause use the
//! services directly ([`Graph::graph_service`] and friends).

use crate::config::GraphConfig;
use crate::db::{
    BackupError, BackupInfo, BackupManager, DatabaseError, DatabaseService, GraphEvent,
};
use crate::models::time::{SystemTimeProvider, TimeProvider};
use crate::models::{
    AuditAction, AuditActor, AuditEntry, EntityData, EntityType, GraphSnapshot, NodeStatus,
    StatusValue,
};
use crate::services::{GraphService, GraphServiceError, RestoreService, StatusService};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Result of a backup request as returned to callers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<BackupInfo> for BackupReport {
    fn from(info: BackupInfo) -> Self {
        Self {
            success: true,
            file: Some(info.file),
            backup_name: Some(info.backup_name),
            file_size: Some(info.file_size),
            error: None,
        }
    }
}

impl From<&BackupError> for BackupReport {
    fn from(err: &BackupError) -> Self {
        Self {
            success: false,
            file: err.existing_file().cloned(),
            error: Some(err.to_string()),
            ..Self::default()
        }
    }
}

/// An audit-logged graph store over one storage file
pub struct Graph {
    graph: Arc<GraphService>,
    status: StatusService,
    restore: RestoreService,
}

impl Graph {
    /// Open the store described by `config`
    pub async fn open(config: &GraphConfig) -> Result<Self, DatabaseError> {
        Self::open_with_clock(config, Arc::new(SystemTimeProvider)).await
    }

    /// Open with an explicit clock
    pub async fn open_with_clock(
        config: &GraphConfig,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<Self, DatabaseError> {
        config
            .validate()
            .map_err(|msg| DatabaseError::initialization_failed(format!("invalid configuration: {}", msg)))?;

        let db = Arc::new(
            DatabaseService::with_options(
                config.database_path.clone(),
                config.busy_timeout_ms,
                clock,
            )
            .await?,
        );
        let backups = BackupManager::new(&config.database_path, &config.backup_dir_name);
        let graph = Arc::new(GraphService::new(db.clone(), backups));

        tracing::info!(path = %config.database_path.display(), "graph store opened");
        Ok(Self {
            status: StatusService::new(db, graph.event_sender()),
            restore: RestoreService::new(graph.clone()),
            graph,
        })
    }

    pub fn graph_service(&self) -> &Arc<GraphService> {
        &self.graph
    }

    pub fn status_service(&self) -> &StatusService {
        &self.status
    }

    pub fn restore_service(&self) -> &RestoreService {
        &self.restore
    }

    pub fn subscribe_to_events(&self) -> broadcast::Receiver<GraphEvent> {
        self.graph.subscribe_to_events()
    }

    // Nodes

    pub async fn node_exists(&self, id: &str) -> bool {
        settle("node_exists", self.graph.node_exists(id).await).unwrap_or(false)
    }

    pub async fn get_node(&self, id: &str) -> Option<EntityData> {
        settle("get_node", self.graph.get_node(id).await).flatten()
    }

    pub async fn add_node(&self, id: &str, data: EntityData, actor: &AuditActor) -> bool {
        settle("add_node", self.graph.add_node(id, data, actor).await).is_some()
    }

    pub async fn update_node(&self, id: &str, data: EntityData, actor: &AuditActor) -> bool {
        settle("update_node", self.graph.update_node(id, data, actor).await).is_some()
    }

    pub async fn remove_node(&self, id: &str, actor: &AuditActor) -> bool {
        settle("remove_node", self.graph.remove_node(id, actor).await).is_some()
    }

    // Edges

    pub async fn edge_exists_by_id(&self, id: &str) -> bool {
        settle("edge_exists_by_id", self.graph.edge_exists_by_id(id).await).unwrap_or(false)
    }

    /// Undirected: matches an edge `a -> b` or `b -> a`
    pub async fn edge_exists(&self, a: &str, b: &str) -> bool {
        settle("edge_exists", self.graph.edge_exists(a, b).await).unwrap_or(false)
    }

    pub async fn add_edge(
        &self,
        id: &str,
        source: &str,
        target: &str,
        data: EntityData,
        actor: &AuditActor,
    ) -> bool {
        settle(
            "add_edge",
            self.graph.add_edge(id, source, target, data, actor).await,
        )
        .is_some()
    }

    pub async fn remove_edge(&self, id: &str, actor: &AuditActor) -> bool {
        settle("remove_edge", self.graph.remove_edge(id, actor).await).is_some()
    }

    /// `true` even when no edge left `source`
    pub async fn remove_edges_from(&self, source: &str, actor: &AuditActor) -> bool {
        settle(
            "remove_edges_from",
            self.graph.remove_edges_from(source, actor).await,
        )
        .is_some()
    }

    /// Whole graph; empty if it could not be read
    pub async fn get(&self) -> GraphSnapshot {
        settle("get", self.graph.get().await).unwrap_or_default()
    }

    // Audit

    pub async fn audit_log(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        action: AuditAction,
        old_data: Option<&Value>,
        new_data: Option<&Value>,
        actor: &AuditActor,
    ) -> bool {
        let result = self
            .graph
            .audit_log(entity_type, entity_id, action, old_data, new_data, actor)
            .await;
        settle("audit_log", result).is_some()
    }

    pub async fn get_audit_history(
        &self,
        entity_type: Option<EntityType>,
        entity_id: Option<&str>,
    ) -> Vec<AuditEntry> {
        settle(
            "get_audit_history",
            self.graph.audit_history(entity_type, entity_id).await,
        )
        .unwrap_or_default()
    }

    // Backups and restores

    pub async fn create_backup(&self, name: Option<&str>, actor: &AuditActor) -> BackupReport {
        match self.graph.create_backup(name, actor).await {
            Ok(info) => info.into(),
            Err(e) => {
                if matches!(e, BackupError::AlreadyExists { .. } | BackupError::InvalidName { .. }) {
                    tracing::warn!(error = %e, "create_backup rejected");
                } else {
                    tracing::error!(error = %e, "create_backup failed");
                }
                BackupReport::from(&e)
            }
        }
    }

    pub async fn restore_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        audit_id: i64,
        actor: &AuditActor,
    ) -> bool {
        let result = self
            .restore
            .restore_entity(entity_type, entity_id, audit_id, actor)
            .await;
        settle("restore_entity", result).is_some()
    }

    pub async fn restore_to_timestamp(&self, timestamp: DateTime<Utc>, actor: &AuditActor) -> bool {
        settle(
            "restore_to_timestamp",
            self.restore.restore_to_timestamp(timestamp, actor).await,
        )
        .is_some()
    }

    // Status

    pub fn allowed_statuses(&self) -> &'static [StatusValue] {
        StatusService::allowed_statuses()
    }

    pub async fn set_node_status(
        &self,
        node_id: &str,
        status: StatusValue,
        actor: &AuditActor,
    ) -> bool {
        settle(
            "set_node_status",
            self.status.set_status(node_id, status, actor).await,
        )
        .is_some()
    }

    pub async fn get_node_status(&self, node_id: &str) -> Option<NodeStatus> {
        settle("get_node_status", self.status.current(node_id).await).flatten()
    }

    pub async fn get_node_status_history(&self, node_id: &str) -> Vec<NodeStatus> {
        settle(
            "get_node_status_history",
            self.status.history(node_id).await,
        )
        .unwrap_or_default()
    }

    /// Current status of every existing node that has one, by node id
    pub async fn status(&self) -> Vec<NodeStatus> {
        settle("status", self.status.all_current().await).unwrap_or_default()
    }
}

/// Log a failed operation and drop the error
fn settle<T>(operation: &str, result: Result<T, GraphServiceError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_caller_error() => {
            tracing::warn!(operation, error = %e, "graph operation rejected");
            None
        }
        Err(e) => {
            tracing::error!(operation, error = %e, "graph operation failed");
            None
        }
    }
}
