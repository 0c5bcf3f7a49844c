//! Restore Integration Tests
//!
//! Entity restore and restore-to-timestamp against a store whose clock is
//! moved by hand, so "after t" is exact.

#[cfg(test)]
mod restore_tests {
    use anyhow::Result;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use gdmon_core::models::time::{MockTimeProvider, TimeProvider};
    use gdmon_core::{
        as_entity_data, AuditAction, AuditActor, AuditEntry, EntityData, EntityType, Graph,
        GraphConfig, GraphServiceError,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct TestStore {
        graph: Graph,
        clock: Arc<MockTimeProvider>,
        actor: AuditActor,
        temp_dir: TempDir,
    }

    impl TestStore {
        async fn new() -> Result<Self> {
            let temp_dir = TempDir::new()?;
            let clock = Arc::new(MockTimeProvider::with_time(
                Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            ));
            let config = GraphConfig::for_path(temp_dir.path().join("graph.db"));
            let graph = Graph::open_with_clock(&config, clock.clone()).await?;
            Ok(Self {
                graph,
                clock,
                actor: AuditActor::new(Some("restorer".to_string()), None),
                temp_dir,
            })
        }

        fn tick(&self) -> DateTime<Utc> {
            self.clock.advance(Duration::seconds(1));
            self.clock.now()
        }

        async fn latest(&self, entity_type: EntityType, id: &str) -> AuditEntry {
            self.graph
                .get_audit_history(Some(entity_type), Some(id))
                .await
                .into_iter()
                .next()
                .unwrap()
        }

        fn backup_count(&self) -> usize {
            std::fs::read_dir(self.temp_dir.path().join("backups"))
                .map(|dir| dir.count())
                .unwrap_or(0)
        }
    }

    fn data(value: serde_json::Value) -> EntityData {
        as_entity_data(value).unwrap()
    }

    #[tokio::test]
    async fn test_restore_delete_recreates_last_known_data() -> Result<()> {
        let store = TestStore::new().await?;
        let g = &store.graph;

        assert!(g.add_node("n1", data(json!({"role": "db", "tags": ["a", "b"]})), &store.actor).await);
        store.tick();
        assert!(g.remove_node("n1", &store.actor).await);
        assert!(!g.node_exists("n1").await);

        let delete = store.latest(EntityType::Node, "n1").await;
        assert_eq!(delete.action, AuditAction::Delete);
        store.tick();
        assert!(g.restore_entity(EntityType::Node, "n1", delete.id, &store.actor).await);

        let restored = g.get_node("n1").await.unwrap();
        assert_eq!(restored["role"], "db");
        assert_eq!(restored["tags"], json!(["a", "b"]));

        let restore = store.latest(EntityType::Node, "n1").await;
        assert_eq!(restore.action, AuditAction::Restore);
        assert_eq!(restore.user_id.as_deref(), Some("restorer"));

        // Recreating again collides with the live node
        assert!(!g.restore_entity(EntityType::Node, "n1", delete.id, &store.actor).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_create_and_update_entries() -> Result<()> {
        let store = TestStore::new().await?;
        let g = &store.graph;

        assert!(g.add_node("n1", data(json!({"v": 1})), &store.actor).await);
        let create = store.latest(EntityType::Node, "n1").await;
        store.tick();
        assert!(g.update_node("n1", data(json!({"v": 2})), &store.actor).await);
        let update = store.latest(EntityType::Node, "n1").await;
        store.tick();

        assert!(g.restore_entity(EntityType::Node, "n1", update.id, &store.actor).await);
        assert_eq!(g.get_node("n1").await.unwrap()["v"], 1);

        store.tick();
        assert!(g.restore_entity(EntityType::Node, "n1", create.id, &store.actor).await);
        assert!(!g.node_exists("n1").await);
        assert_eq!(
            store.latest(EntityType::Node, "n1").await.action,
            AuditAction::RestoreDelete
        );

        // Entity already gone
        assert!(!g.restore_entity(EntityType::Node, "n1", update.id, &store.actor).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_edge_scenario_needs_endpoint_first() -> Result<()> {
        let store = TestStore::new().await?;
        let g = &store.graph;

        assert!(g.add_node("n1", EntityData::new(), &store.actor).await);
        assert!(g.add_node("n2", EntityData::new(), &store.actor).await);
        assert!(g.add_edge("e1", "n1", "n2", EntityData::new(), &store.actor).await);
        store.tick();
        assert!(g.remove_node("n1", &store.actor).await);

        let edge_history = g.get_audit_history(Some(EntityType::Edge), Some("e1")).await;
        let actions: Vec<_> = edge_history.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Delete, AuditAction::Create]);
        let edge_delete = edge_history[0].id;

        let err = g
            .restore_service()
            .restore_entity(EntityType::Edge, "e1", edge_delete, &store.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphServiceError::DanglingEdge { ref node_id, .. } if node_id == "n1"));
        assert!(!g.edge_exists_by_id("e1").await);

        let node_delete = store.latest(EntityType::Node, "n1").await.id;
        store.tick();
        assert!(g.restore_entity(EntityType::Node, "n1", node_delete, &store.actor).await);
        assert!(g.restore_entity(EntityType::Edge, "e1", edge_delete, &store.actor).await);
        assert!(g.edge_exists("n1", "n2").await);
        Ok(())
    }

    #[tokio::test]
    async fn test_entity_restore_takes_backup_first() -> Result<()> {
        let store = TestStore::new().await?;
        let g = &store.graph;

        assert!(g.add_node("web/1", EntityData::new(), &store.actor).await);
        let create = store.latest(EntityType::Node, "web/1").await;
        assert_eq!(store.backup_count(), 0);

        assert!(g.restore_entity(EntityType::Node, "web/1", create.id, &store.actor).await);
        assert_eq!(store.backup_count(), 1);

        let backups = g.get_audit_history(Some(EntityType::System), None).await;
        assert_eq!(backups[0].action, AuditAction::Backup);
        let name = backups[0].new_data.as_ref().unwrap()["backup_name"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(name.starts_with("pre_restore_entity_node_web_1_"));
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_to_timestamp_rolls_back_and_is_repeatable() -> Result<()> {
        let store = TestStore::new().await?;
        let g = &store.graph;

        assert!(g.add_node("a", data(json!({"v": 1})), &store.actor).await);
        assert!(g.add_node("b", EntityData::new(), &store.actor).await);
        assert!(g.add_edge("a-b", "a", "b", EntityData::new(), &store.actor).await);
        let checkpoint = store.tick();
        let before = g.get().await;

        store.tick();
        assert!(g.update_node("a", data(json!({"v": 2})), &store.actor).await);
        assert!(g.add_node("c", EntityData::new(), &store.actor).await);
        assert!(g.add_edge("b-c", "b", "c", EntityData::new(), &store.actor).await);
        store.tick();
        assert!(g.remove_node("b", &store.actor).await);

        store.tick();
        let summary = g
            .restore_service()
            .restore_to_timestamp(checkpoint, &store.actor)
            .await?;
        assert!(summary.operations_reversed >= 6);
        assert!(summary.backup_name.starts_with("pre_restore_timestamp_"));

        let after_first = g.get().await;
        assert_eq!(after_first.node_ids(), before.node_ids());
        assert_eq!(after_first.edge_ids(), before.edge_ids());
        assert_eq!(g.get_node("a").await.unwrap()["v"], 1);

        store.tick();
        assert!(g.restore_to_timestamp(checkpoint, &store.actor).await);
        let after_second = g.get().await;
        assert_eq!(after_second.node_ids(), after_first.node_ids());
        assert_eq!(after_second.edge_ids(), after_first.edge_ids());

        let summaries = g
            .get_audit_history(Some(EntityType::System), None)
            .await
            .into_iter()
            .filter(|e| e.action == AuditAction::RestoreToTimestamp)
            .count();
        assert_eq!(summaries, 2);
        assert_eq!(store.backup_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_to_timestamp_never_revives_dangling_edges() -> Result<()> {
        let store = TestStore::new().await?;
        let g = &store.graph;

        // `gone` is deleted before the checkpoint and never restored
        assert!(g.add_node("gone", EntityData::new(), &store.actor).await);
        assert!(g.add_node("kept", EntityData::new(), &store.actor).await);
        store.tick();
        assert!(g.add_node("late", EntityData::new(), &store.actor).await);
        assert!(g.add_edge("late-gone", "late", "gone", EntityData::new(), &store.actor).await);
        assert!(g.add_edge("late-kept", "late", "kept", EntityData::new(), &store.actor).await);
        store.tick();
        assert!(g.remove_node("gone", &store.actor).await);
        let checkpoint = store.tick();

        store.tick();
        assert!(g.remove_edge("late-kept", &store.actor).await);

        store.tick();
        assert!(g.restore_to_timestamp(checkpoint, &store.actor).await);

        assert!(!g.node_exists("gone").await);
        assert!(!g.edge_exists_by_id("late-gone").await);
        assert!(g.edge_exists_by_id("late-kept").await);
        Ok(())
    }

    #[tokio::test]
    async fn test_status_and_system_entries_are_not_reversible() -> Result<()> {
        let store = TestStore::new().await?;
        let g = &store.graph;

        assert!(g.add_node("n1", EntityData::new(), &store.actor).await);
        assert!(
            g.set_node_status("n1", gdmon_core::StatusValue::Healthy, &store.actor)
                .await
        );
        let status_entry = store.latest(EntityType::NodeStatus, "n1").await;

        let err = g
            .restore_service()
            .restore_entity(EntityType::NodeStatus, "n1", status_entry.id, &store.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphServiceError::NotReversible { .. }));

        // Entry id belongs to a different entity
        let err = g
            .restore_service()
            .restore_entity(EntityType::Node, "other", status_entry.id, &store.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphServiceError::AuditEntryNotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_to_timestamp_within_one_millisecond() -> Result<()> {
        let store = TestStore::new().await?;
        let g = &store.graph;

        store
            .clock
            .set_time(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::microseconds(400));
        let cutoff = store.clock.now();
        assert!(g.add_node("at", EntityData::new(), &store.actor).await);

        store.clock.advance(Duration::microseconds(300));
        assert!(g.add_node("late", EntityData::new(), &store.actor).await);

        let summary = g
            .restore_service()
            .restore_to_timestamp(cutoff, &store.actor)
            .await?;
        assert_eq!(summary.operations_reversed, 1);
        assert!(g.node_exists("at").await);
        assert!(!g.node_exists("late").await);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_backup_aborts_restore() -> Result<()> {
        let store = TestStore::new().await?;
        let g = &store.graph;

        let checkpoint = store.clock.now();
        store.tick();
        assert!(g.add_node("n1", data(json!({"v": 1})), &store.actor).await);
        let create = store.latest(EntityType::Node, "n1").await;
        let before = g.get().await;

        // A regular file where the backup directory should be
        std::fs::write(store.temp_dir.path().join("backups"), b"not a directory")?;

        store.tick();
        let err = g
            .restore_service()
            .restore_entity(EntityType::Node, "n1", create.id, &store.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphServiceError::BackupFailed(_)));
        assert!(!g.restore_entity(EntityType::Node, "n1", create.id, &store.actor).await);
        assert!(!g.restore_to_timestamp(checkpoint, &store.actor).await);

        assert_eq!(g.get().await, before);
        let system = g.get_audit_history(Some(EntityType::System), None).await;
        assert!(system.is_empty());
        let node_history = g.get_audit_history(Some(EntityType::Node), Some("n1")).await;
        assert_eq!(node_history.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_reversal_rolls_back_but_keeps_backup() -> Result<()> {
        let store = TestStore::new().await?;
        let g = &store.graph;

        assert!(g.add_node("n1", data(json!({"v": 1})), &store.actor).await);
        store.tick();
        assert!(g.remove_node("n1", &store.actor).await);
        let delete = store.latest(EntityType::Node, "n1").await;
        store.tick();
        assert!(g.add_node("n1", data(json!({"v": 2})), &store.actor).await);
        let before = g.get().await;

        store.tick();
        let err = g
            .restore_service()
            .restore_entity(EntityType::Node, "n1", delete.id, &store.actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphServiceError::DuplicateNode { .. }));

        assert_eq!(g.get().await, before);
        assert_eq!(g.get_node("n1").await.unwrap()["v"], 2);
        let restores = g
            .get_audit_history(Some(EntityType::Node), Some("n1"))
            .await
            .into_iter()
            .filter(|e| e.action.is_reversal())
            .count();
        assert_eq!(restores, 0);
        assert_eq!(store.backup_count(), 1);
        Ok(())
    }
}
