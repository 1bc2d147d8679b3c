#[cfg(test)]
mod tests {
    use crate::backup_store::BackupStore;
    use crate::restore_engine::RestoreEngine;
    use crate::types::{BackupOutcome, BackupVersion, RestoreOutcome};
    use parking_lot::Mutex;
    use rampart_core::providers::{DurableStore, StructureProvider};
    use rampart_core::types::{
        ContainerKind, ContainerRecord, PermissionGrant, PrincipalKind, RoleRecord,
    };
    use rampart_core::{BackupConfig, RampartError, RampartResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    // ── Mock collaborators ──────────────────────────────────────────────────

    #[derive(Default)]
    struct WorkspaceState {
        containers: Vec<ContainerRecord>,
        roles: Vec<RoleRecord>,
    }

    #[derive(Default)]
    struct MemPlatform {
        state: Mutex<HashMap<String, WorkspaceState>>,
        next_id: AtomicU64,
        list_delay_ms: u64,
        ops: Mutex<Vec<String>>,
    }

    impl MemPlatform {
        fn with_state(ws: &str, containers: Vec<ContainerRecord>, roles: Vec<RoleRecord>) -> Self {
            let platform = MemPlatform::default();
            platform
                .state
                .lock()
                .insert(ws.into(), WorkspaceState { containers, roles });
            platform
        }

        fn fresh_id(&self, prefix: &str) -> String {
            format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed))
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().clone()
        }
    }

    impl StructureProvider for MemPlatform {
        fn list_containers(&self, workspace: &str) -> RampartResult<Vec<ContainerRecord>> {
            if self.list_delay_ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(self.list_delay_ms));
            }
            Ok(self
                .state
                .lock()
                .get(workspace)
                .map(|s| s.containers.clone())
                .unwrap_or_default())
        }

        fn list_roles(&self, workspace: &str) -> RampartResult<Vec<RoleRecord>> {
            Ok(self
                .state
                .lock()
                .get(workspace)
                .map(|s| s.roles.clone())
                .unwrap_or_default())
        }

        fn create_container(&self, workspace: &str, spec: &ContainerRecord) -> RampartResult<String> {
            let id = self.fresh_id("c");
            self.ops.lock().push(format!("create_container:{}", spec.name));
            let mut state = self.state.lock();
            let ws = state.entry(workspace.into()).or_default();
            let mut record = spec.clone();
            record.id = id.clone();
            ws.containers.push(record);
            Ok(id)
        }

        fn delete_container(&self, workspace: &str, container_id: &str) -> RampartResult<()> {
            let mut state = self.state.lock();
            let ws = state.entry(workspace.into()).or_default();
            let name = ws
                .containers
                .iter()
                .find(|c| c.id == container_id)
                .map(|c| c.name.clone())
                .unwrap_or_default();
            self.ops.lock().push(format!("delete_container:{}", name));
            ws.containers.retain(|c| c.id != container_id);
            Ok(())
        }

        fn create_role(&self, workspace: &str, spec: &RoleRecord) -> RampartResult<String> {
            let id = self.fresh_id("r");
            self.ops.lock().push(format!("create_role:{}", spec.name));
            let mut state = self.state.lock();
            let ws = state.entry(workspace.into()).or_default();
            let mut record = spec.clone();
            record.id = id.clone();
            ws.roles.push(record);
            Ok(id)
        }

        fn delete_role(&self, workspace: &str, role_id: &str) -> RampartResult<()> {
            let mut state = self.state.lock();
            let ws = state.entry(workspace.into()).or_default();
            let name = ws
                .roles
                .iter()
                .find(|r| r.id == role_id)
                .map(|r| r.name.clone())
                .unwrap_or_default();
            self.ops.lock().push(format!("delete_role:{}", name));
            ws.roles.retain(|r| r.id != role_id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemStore {
        histories: Mutex<HashMap<String, Vec<u8>>>,
        fail_reads: std::sync::atomic::AtomicBool,
    }

    impl DurableStore for MemStore {
        fn load_settings(&self, _: &str) -> RampartResult<Option<Vec<u8>>> {
            Ok(None)
        }
        fn store_settings(&self, _: &str, _: &[u8]) -> RampartResult<()> {
            Ok(())
        }
        fn load_backup_history(&self, workspace: &str) -> RampartResult<Option<Vec<u8>>> {
            if self.fail_reads.load(Ordering::Relaxed) {
                return Err(RampartError::Storage("row store unavailable".into()));
            }
            Ok(self.histories.lock().get(workspace).cloned())
        }
        fn store_backup_history(&self, workspace: &str, blob: &[u8]) -> RampartResult<()> {
            self.histories.lock().insert(workspace.into(), blob.to_vec());
            Ok(())
        }
        fn is_allow_listed(&self, _: &str, _: &str) -> RampartResult<bool> {
            Ok(false)
        }
    }

    // ── Fixtures ────────────────────────────────────────────────────────────

    fn text_container(id: &str, name: &str, parent: Option<&str>) -> ContainerRecord {
        ContainerRecord {
            id: id.into(),
            name: name.into(),
            kind: ContainerKind::Text,
            parent_id: None,
            parent_name: parent.map(Into::into),
            position: 0,
            grants: Vec::new(),
        }
    }

    fn category(id: &str, name: &str) -> ContainerRecord {
        ContainerRecord {
            id: id.into(),
            name: name.into(),
            kind: ContainerKind::Category,
            parent_id: None,
            parent_name: None,
            position: 0,
            grants: Vec::new(),
        }
    }

    fn role(id: &str, name: &str, position: i32) -> RoleRecord {
        RoleRecord {
            id: id.into(),
            name: name.into(),
            color: 0,
            hoisted: false,
            permission_mask: 0,
            position,
            managed: false,
            everyone: false,
        }
    }

    fn everyone_role(id: &str) -> RoleRecord {
        RoleRecord {
            id: id.into(),
            name: "@everyone".into(),
            color: 0,
            hoisted: false,
            permission_mask: 0,
            position: 0,
            managed: false,
            everyone: true,
        }
    }

    fn fast_config() -> BackupConfig {
        BackupConfig { create_pace_ms: 0, ..Default::default() }
    }

    fn stored_history(store: &MemStore, ws: &str) -> Vec<BackupVersion> {
        let blob = store.histories.lock().get(ws).cloned().unwrap();
        serde_json::from_slice(&blob).unwrap()
    }

    // ── Backup store ────────────────────────────────────────────────────────

    #[test]
    fn test_history_bounded_to_three_newest_first() {
        let platform = Arc::new(MemPlatform::with_state(
            "ws",
            vec![text_container("c1", "general", None)],
            vec![role("r1", "mods", 1), everyone_role("ev")],
        ));
        let durable = Arc::new(MemStore::default());
        let store = BackupStore::new(platform, durable.clone(), fast_config());

        for i in 0..4 {
            let out = store.create_backup("ws", "My Workspace", 1000 + i).unwrap();
            assert!(matches!(out, BackupOutcome::Completed(_)));
        }
        let history = stored_history(&durable, "ws");
        assert_eq!(history.len(), 3);
        // Newest first; the original capture at t=1000 fell off.
        assert_eq!(history[0].taken_at, 1003);
        assert_eq!(history[1].taken_at, 1002);
        assert_eq!(history[2].taken_at, 1001);
    }

    #[test]
    fn test_managed_and_everyone_roles_excluded_from_capture() {
        let mut managed = role("r2", "integration-bot", 5);
        managed.managed = true;
        let platform = Arc::new(MemPlatform::with_state(
            "ws",
            vec![text_container("c1", "general", None)],
            vec![role("r1", "mods", 1), managed, everyone_role("ev")],
        ));
        let durable = Arc::new(MemStore::default());
        let store = BackupStore::new(platform, durable.clone(), fast_config());

        store.create_backup("ws", "My Workspace", 1000).unwrap();
        let history = stored_history(&durable, "ws");
        assert_eq!(history[0].roles.len(), 1);
        assert_eq!(history[0].roles[0].name, "mods");
    }

    #[test]
    fn test_validation_failure_leaves_history_unchanged() {
        let platform = Arc::new(MemPlatform::with_state(
            "ws",
            vec![text_container("c1", "general", None)],
            vec![role("r1", "mods", 1)],
        ));
        let durable = Arc::new(MemStore::default());
        let store = BackupStore::new(platform.clone(), durable.clone(), fast_config());
        store.create_backup("ws", "My Workspace", 1000).unwrap();

        // An emptied workspace produces an invalid candidate.
        platform.state.lock().get_mut("ws").unwrap().containers.clear();
        platform.state.lock().get_mut("ws").unwrap().roles.clear();
        let err = store.create_backup("ws", "My Workspace", 2000).unwrap_err();
        assert!(matches!(err, RampartError::Validation(_)));

        let history = stored_history(&durable, "ws");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].taken_at, 1000);
        assert_eq!(store.rejected(), 1);
    }

    #[test]
    fn test_no_postable_container_rejected() {
        let mut voice = text_container("c1", "lounge", None);
        voice.kind = ContainerKind::Voice;
        let platform =
            Arc::new(MemPlatform::with_state("ws", vec![voice], vec![role("r1", "mods", 1)]));
        let store = BackupStore::new(platform, Arc::new(MemStore::default()), fast_config());
        assert!(matches!(
            store.create_backup("ws", "My Workspace", 1000),
            Err(RampartError::Validation(_))
        ));
    }

    #[test]
    fn test_concurrent_backup_single_flight() {
        let platform = Arc::new(MemPlatform {
            list_delay_ms: 300,
            ..Default::default()
        });
        for ws in ["ws", "ws2"] {
            platform.state.lock().insert(
                ws.into(),
                WorkspaceState {
                    containers: vec![text_container("c1", "general", None)],
                    roles: vec![role("r1", "mods", 1)],
                },
            );
        }
        let store =
            Arc::new(BackupStore::new(platform, Arc::new(MemStore::default()), fast_config()));

        let slow = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.create_backup("ws", "My Workspace", 1000).unwrap())
        };
        std::thread::sleep(std::time::Duration::from_millis(100));
        // Same workspace: rejected while the first capture runs.
        assert_eq!(
            store.create_backup("ws", "My Workspace", 1001).unwrap(),
            BackupOutcome::InProgress
        );
        // A different workspace proceeds independently of the held flight.
        assert!(matches!(
            store.create_backup("ws2", "Other Workspace", 1001).unwrap(),
            BackupOutcome::Completed(_)
        ));
        assert!(matches!(slow.join().unwrap(), BackupOutcome::Completed(_)));
    }

    #[test]
    fn test_storage_read_failure_is_an_error_not_empty() {
        let platform = Arc::new(MemPlatform::with_state(
            "ws",
            vec![text_container("c1", "general", None)],
            vec![role("r1", "mods", 1)],
        ));
        let durable = Arc::new(MemStore::default());
        let store = BackupStore::new(platform, durable.clone(), fast_config());
        durable.fail_reads.store(true, Ordering::Relaxed);
        assert!(matches!(
            store.create_backup("ws", "My Workspace", 1000),
            Err(RampartError::Storage(_))
        ));
    }

    // ── Restore engine ──────────────────────────────────────────────────────

    fn engine_pair(
        platform: Arc<MemPlatform>,
        durable: Arc<MemStore>,
    ) -> (Arc<BackupStore>, RestoreEngine) {
        let store = Arc::new(BackupStore::new(platform.clone(), durable, fast_config()));
        let engine = RestoreEngine::new(platform, Arc::clone(&store), fast_config());
        (store, engine)
    }

    #[test]
    fn test_restore_empty_history_is_no_data() {
        let platform = Arc::new(MemPlatform::default());
        let (_, engine) = engine_pair(platform, Arc::new(MemStore::default()));
        assert_eq!(engine.restore("ws", 5000).unwrap(), RestoreOutcome::NoData);
    }

    #[test]
    fn test_restore_reconciles_attack_damage() {
        // Healthy structure captured at t=1000.
        let platform = Arc::new(MemPlatform::with_state(
            "ws",
            vec![
                category("cat1", "info"),
                text_container("c1", "rules", Some("info")),
                text_container("c2", "general", None),
            ],
            vec![role("r1", "mods", 3), everyone_role("ev")],
        ));
        let durable = Arc::new(MemStore::default());
        let (store, engine) = engine_pair(platform.clone(), durable);
        store.create_backup("ws", "My Workspace", 1000).unwrap();

        // Attack: delete everything, plant a role and a container.
        {
            let mut state = platform.state.lock();
            let ws = state.get_mut("ws").unwrap();
            ws.containers.retain(|c| c.name == "general");
            ws.roles.retain(|r| r.everyone);
            ws.roles.push(role("rx", "hax", 9));
            ws.containers.push(text_container("cx", "pwned", None));
        }

        let out = engine.restore("ws", 2000).unwrap();
        let stats = match out {
            RestoreOutcome::Completed(s) => s,
            other => panic!("expected Completed, got {:?}", other),
        };
        assert_eq!(stats.roles_deleted, 1);
        assert_eq!(stats.containers_deleted, 1);
        assert_eq!(stats.roles_created, 1);
        assert_eq!(stats.containers_created, 2);
        assert_eq!(stats.object_failures, 0);

        let state = platform.state.lock();
        let ws = state.get("ws").unwrap();
        let names: Vec<&str> = ws.containers.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"info"));
        assert!(names.contains(&"rules"));
        assert!(names.contains(&"general"));
        assert!(!names.contains(&"pwned"));
        assert!(ws.roles.iter().any(|r| r.name == "mods"));
        assert!(!ws.roles.iter().any(|r| r.name == "hax"));

        // Recreated child resolves its parent to the recreated category id.
        let info_id = ws.containers.iter().find(|c| c.name == "info").unwrap().id.clone();
        let rules = ws.containers.iter().find(|c| c.name == "rules").unwrap();
        assert_eq!(rules.parent_id.as_deref(), Some(info_id.as_str()));
    }

    #[test]
    fn test_apply_order_roles_then_containers() {
        let platform = Arc::new(MemPlatform::with_state(
            "ws",
            vec![text_container("c1", "general", None)],
            vec![role("r1", "mods", 1), everyone_role("ev")],
        ));
        let durable = Arc::new(MemStore::default());
        let (store, engine) = engine_pair(platform.clone(), durable);
        store.create_backup("ws", "My Workspace", 1000).unwrap();

        {
            let mut state = platform.state.lock();
            let ws = state.get_mut("ws").unwrap();
            ws.roles.push(role("rx", "hax", 9));
            ws.containers.clear();
        }
        platform.ops.lock().clear();

        engine.restore("ws", 2000).unwrap();
        let ops = platform.ops();
        let del_role = ops.iter().position(|o| o == "delete_role:hax").unwrap();
        let create_container = ops.iter().position(|o| o == "create_container:general").unwrap();
        assert!(del_role < create_container, "extraneous roles deleted before recreation: {:?}", ops);
    }

    #[test]
    fn test_restore_falls_back_to_oldest_valid_version() {
        let platform = Arc::new(MemPlatform::with_state(
            "ws",
            vec![text_container("c9", "survivor", None)],
            vec![everyone_role("ev")],
        ));
        let durable = Arc::new(MemStore::default());

        let valid = BackupVersion {
            containers: vec![text_container("c1", "general", None)],
            roles: vec![role("r1", "mods", 1)],
            taken_at: 1000,
            workspace_name: "My Workspace".into(),
            container_count: 1,
            role_count: 1,
        };
        // Both newer versions fail re-validation: one empty, one without a
        // postable container.
        let empty = BackupVersion {
            containers: vec![],
            roles: vec![],
            taken_at: 3000,
            workspace_name: "My Workspace".into(),
            container_count: 0,
            role_count: 0,
        };
        let mut voice_only = valid.clone();
        voice_only.taken_at = 2000;
        voice_only.containers[0].kind = ContainerKind::Voice;

        let history = vec![empty, voice_only, valid];
        durable
            .store_backup_history("ws", &serde_json::to_vec(&history).unwrap())
            .unwrap();

        let (_, engine) = engine_pair(platform, durable);
        let out = engine.restore("ws", 5000).unwrap();
        match out {
            RestoreOutcome::Completed(stats) => assert_eq!(stats.version_taken_at, 1000),
            other => panic!("expected Completed from oldest version, got {:?}", other),
        }
        assert_eq!(engine.versions_skipped(), 2);
    }

    #[test]
    fn test_restore_all_versions_invalid_is_exhaustion() {
        let durable = Arc::new(MemStore::default());
        let empty = BackupVersion {
            containers: vec![],
            roles: vec![],
            taken_at: 1000,
            workspace_name: "My Workspace".into(),
            container_count: 0,
            role_count: 0,
        };
        durable
            .store_backup_history("ws", &serde_json::to_vec(&vec![empty.clone(), empty]).unwrap())
            .unwrap();
        let (_, engine) = engine_pair(Arc::new(MemPlatform::default()), durable);
        assert_eq!(engine.restore("ws", 5000).unwrap(), RestoreOutcome::FailedAllBackups);
        assert_eq!(engine.restores_exhausted(), 1);
    }

    #[test]
    fn test_concurrent_restore_single_flight() {
        let platform = Arc::new(MemPlatform {
            list_delay_ms: 300,
            ..Default::default()
        });
        platform.state.lock().insert(
            "ws".into(),
            WorkspaceState {
                containers: vec![text_container("c1", "general", None)],
                roles: vec![role("r1", "mods", 1), everyone_role("ev")],
            },
        );
        let durable = Arc::new(MemStore::default());
        let store = Arc::new(BackupStore::new(platform.clone(), durable.clone(), fast_config()));
        store.create_backup("ws", "My Workspace", 1000).unwrap();
        let engine =
            Arc::new(RestoreEngine::new(platform, Arc::clone(&store), fast_config()));

        let slow = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.restore("ws", 2000).unwrap())
        };
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(engine.restore("ws", 2001).unwrap(), RestoreOutcome::InProgress);
        assert!(matches!(slow.join().unwrap(), RestoreOutcome::Completed(_)));
    }
}
