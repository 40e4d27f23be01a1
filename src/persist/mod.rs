//! Persistence manager: durable session snapshots
//!
//! One JSON document per session holding `session_vars`, `session_meta`
//! and the namespace minus reserved machinery. The manager owns the
//! storage location exclusively. `save` is best-effort: individual
//! bindings that refuse serialization (native helper routines) are skipped
//! and logged, and any IO problem is logged rather than raised. `restore`
//! is a no-op without a snapshot and leaves the store untouched-empty when
//! the snapshot is unreadable.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::Shell;
use crate::error::SlateError;
use crate::namespace::NamespaceStore;
use crate::runtime::Value;

const SNAPSHOT_FILE: &str = "session_state.json";

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    saved_at: String,
    session_vars: BTreeMap<String, serde_json::Value>,
    session_meta: BTreeMap<String, serde_json::Value>,
    namespace: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug)]
pub struct PersistenceManager {
    dir: PathBuf,
}

impl PersistenceManager {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Serialize one map of values, skipping entries that refuse.
    fn encode_map(
        entries: impl Iterator<Item = (String, Value)>,
        section: &str,
    ) -> BTreeMap<String, serde_json::Value> {
        let mut out = BTreeMap::new();
        for (name, value) in entries {
            match serde_json::to_value(&value) {
                Ok(encoded) => {
                    out.insert(name, encoded);
                }
                Err(error) => {
                    log::warn!(
                        "skipping non-serializable {} binding '{}': {}",
                        section,
                        name,
                        error
                    );
                }
            }
        }
        out
    }

    /// Snapshot the shell. Logs and returns on any failure; never panics,
    /// never raises.
    pub fn save(&self, shell: &Shell) {
        let store = shell.store();

        let namespace = Self::encode_map(
            store
                .bindings()
                .filter(|(name, _)| {
                    !name.starts_with('_') && !NamespaceStore::is_reserved(name)
                })
                .map(|(name, value)| (name.clone(), value.clone())),
            "namespace",
        );
        let session_vars = Self::encode_map(
            store
                .session_vars()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
            "session_vars",
        );
        let session_meta = Self::encode_map(
            store
                .session_meta()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
            "session_meta",
        );

        let snapshot = Snapshot {
            saved_at: chrono::Utc::now().to_rfc3339(),
            session_vars,
            session_meta,
            namespace,
        };

        if let Err(error) = self.write_snapshot(&snapshot) {
            log::error!("session save failed: {}", error);
            return;
        }
        log::info!("session saved to {}", self.snapshot_path().display());
    }

    /// Write-then-rename so a crash mid-write never leaves a torn snapshot.
    fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), SlateError> {
        let failure = |e: &dyn std::fmt::Display| SlateError::PersistenceFailure(e.to_string());
        fs::create_dir_all(&self.dir).map_err(|e| failure(&e))?;
        let encoded = serde_json::to_string_pretty(snapshot).map_err(|e| failure(&e))?;
        let tmp = self.dir.join(format!("{}.tmp", SNAPSHOT_FILE));
        fs::write(&tmp, encoded).map_err(|e| failure(&e))?;
        fs::rename(&tmp, self.snapshot_path()).map_err(|e| failure(&e))
    }

    /// Restore a prior snapshot into the shell: metadata maps are replaced
    /// wholesale, namespace bindings are merged (overwriting collisions).
    pub fn restore(&self, shell: &mut Shell) {
        let path = self.snapshot_path();
        if !path.exists() {
            return;
        }

        let snapshot = match Self::read_snapshot(&path) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                log::error!("session restore failed: {}", error);
                return;
            }
        };

        let store = shell.store_mut();
        store.replace_session_vars(Self::decode_map(snapshot.session_vars, "session_vars"));
        store.replace_session_meta(Self::decode_map(snapshot.session_meta, "session_meta"));
        store.merge_bindings(Self::decode_map(snapshot.namespace, "namespace"));
        log::info!("session restored from {}", path.display());
    }

    fn read_snapshot(path: &Path) -> Result<Snapshot, SlateError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| SlateError::PersistenceFailure(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| SlateError::PersistenceFailure(e.to_string()))
    }

    fn decode_map(
        entries: BTreeMap<String, serde_json::Value>,
        section: &str,
    ) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        for (name, encoded) in entries {
            match serde_json::from_value::<Value>(encoded) {
                Ok(value) => {
                    out.insert(name, value);
                }
                Err(error) => {
                    log::warn!(
                        "dropping unreadable {} binding '{}': {}",
                        section,
                        name,
                        error
                    );
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::run_fragment;
    use crate::runtime::NativeFn;

    fn manager() -> (tempfile::TempDir, PersistenceManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = PersistenceManager::new(dir.path().to_path_buf());
        (dir, manager)
    }

    #[test]
    fn test_save_restore_round_trip() {
        let (_dir, manager) = manager();

        let mut shell = Shell::new();
        run_fragment(&mut shell, "x = 41\nwords = [\"a\", \"b\"]\nratio = 0.5");
        shell
            .store_mut()
            .set_session_var("t", Value::Int(7));
        shell
            .store_mut()
            .set_session_meta("t", Value::Str("test artifact".to_string()));
        manager.save(&shell);

        let mut fresh = Shell::new();
        manager.restore(&mut fresh);

        assert_eq!(fresh.store().get("x"), Some(&Value::Int(41)));
        assert_eq!(fresh.store().get("ratio"), Some(&Value::Float(0.5)));
        assert_eq!(
            fresh.store().get("words"),
            Some(&Value::List(vec![
                Value::Str("a".to_string()),
                Value::Str("b".to_string())
            ]))
        );
        assert_eq!(fresh.store().session_vars().get("t"), Some(&Value::Int(7)));
        assert_eq!(
            fresh.store().session_meta().get("t"),
            Some(&Value::Str("test artifact".to_string()))
        );
    }

    #[test]
    fn test_functions_survive_the_round_trip() {
        let (_dir, manager) = manager();

        let mut shell = Shell::new();
        run_fragment(&mut shell, "fn double(n) { return n * 2 }");
        manager.save(&shell);

        let mut fresh = Shell::new();
        manager.restore(&mut fresh);
        let outcome = run_fragment(&mut fresh, "double(4)");
        assert_eq!(outcome.result, Some(Value::Int(8)));
    }

    #[test]
    fn test_native_binding_skipped_not_fatal() {
        let (_dir, manager) = manager();

        let mut shell = Shell::new();
        run_fragment(&mut shell, "kept = 1");
        shell.store_mut().set(
            "helper",
            Value::Native(NativeFn::new("helper", "helper()", "", |_| Ok(Value::Null))),
        );
        manager.save(&shell);

        let mut fresh = Shell::new();
        manager.restore(&mut fresh);
        assert_eq!(fresh.store().get("kept"), Some(&Value::Int(1)));
        assert!(fresh.store().get("helper").is_none());
    }

    #[test]
    fn test_reserved_and_private_excluded_from_snapshot() {
        let (_dir, manager) = manager();

        let mut shell = Shell::new();
        run_fragment(&mut shell, "1 + 1");
        manager.save(&shell);

        let raw = fs::read_to_string(manager.snapshot_path()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let namespace = doc["namespace"].as_object().unwrap();
        assert!(!namespace.contains_key("In"));
        assert!(!namespace.contains_key("Out"));
        assert!(!namespace.contains_key("_"));
    }

    #[test]
    fn test_restore_without_snapshot_is_noop() {
        let (_dir, manager) = manager();
        let mut shell = Shell::new();
        manager.restore(&mut shell);
        assert!(shell.store().list_names(None).is_empty());
    }

    #[test]
    fn test_corrupt_snapshot_leaves_store_empty() {
        let (_dir, manager) = manager();
        fs::create_dir_all(manager.snapshot_path().parent().unwrap()).unwrap();
        fs::write(manager.snapshot_path(), "{ not json").unwrap();

        let mut shell = Shell::new();
        manager.restore(&mut shell);
        assert!(shell.store().list_names(None).is_empty());
        assert!(shell.store().session_vars().is_empty());
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_tmp() {
        let (_dir, manager) = manager();

        let mut shell = Shell::new();
        run_fragment(&mut shell, "v = 1");
        manager.save(&shell);
        run_fragment(&mut shell, "v = 2");
        manager.save(&shell);

        let tmp = manager
            .snapshot_path()
            .with_file_name(format!("{}.tmp", SNAPSHOT_FILE));
        assert!(!tmp.exists());

        let mut fresh = Shell::new();
        manager.restore(&mut fresh);
        assert_eq!(fresh.store().get("v"), Some(&Value::Int(2)));
    }
}
