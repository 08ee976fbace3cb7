use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use super::error::StorageError;
use super::state::RawTask;
use super::state::Task;

pub const DEFAULT_KEY_PREFIX: &str = "taskmgr.";
pub const LEGACY_TASKS_KEY: &str = "tasks";
pub const LEGACY_DARK_MODE_KEY: &str = "darkMode";
const CORRUPT_SUFFIX: &str = ".corrupt";

/// A synchronous string key-value store in the shape of browser local
/// storage. Implementations report every failure as a `StorageError`.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the total bytes of keys plus values, like a browser quota.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable {
            Err(StorageError::Unavailable("storage is disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        if let Some(limit) = self.quota {
            let others: usize = self
                .entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.entries.remove(key);
        Ok(())
    }
}

/// One file per key under a data directory. Writes go through a temp file
/// in the same directory and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|err| StorageError::Io(err.error))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub tasks: String,
    pub dark_mode: String,
    pub legacy_tasks: Option<String>,
    pub legacy_dark_mode: Option<String>,
}

impl StorageKeys {
    pub fn with_prefix(prefix: &str, migrate_legacy: bool) -> Self {
        let tasks = format!("{prefix}{LEGACY_TASKS_KEY}");
        let dark_mode = format!("{prefix}{LEGACY_DARK_MODE_KEY}");
        let legacy = |primary: &str, legacy: &str| {
            (migrate_legacy && primary != legacy).then(|| legacy.to_string())
        };
        Self {
            legacy_tasks: legacy(&tasks, LEGACY_TASKS_KEY),
            legacy_dark_mode: legacy(&dark_mode, LEGACY_DARK_MODE_KEY),
            tasks,
            dark_mode,
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_KEY_PREFIX, true)
    }
}

/// The task list and theme flag on top of a [`KeyValueStore`].
///
/// Legacy keys are migrated on first read: when the primary key is absent
/// the legacy value is copied to it and the legacy key removed. Once the
/// primary key exists the legacy key is never consulted again.
#[derive(Debug)]
pub struct TaskStorage<S> {
    store: S,
    keys: StorageKeys,
}

impl<S: KeyValueStore> TaskStorage<S> {
    pub fn new(store: S, keys: StorageKeys) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn save(&mut self, tasks: &[Task]) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(tasks)?;
        self.store.set(&self.keys.tasks, &encoded)
    }

    /// Returns the stored records, or an empty list when nothing is stored.
    pub fn load(&mut self) -> Result<Vec<RawTask>, StorageError> {
        let primary = self.keys.tasks.clone();
        let legacy = self.keys.legacy_tasks.clone();
        let Some(text) = self.read_migrating(&primary, legacy.as_deref())? else {
            return Ok(Vec::new());
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records = serde_json::from_str::<Option<Vec<serde_json::Value>>>(&text)
            .map_err(|source| StorageError::Corrupt {
                key: primary.clone(),
                source,
            })?
            .unwrap_or_default();

        let mut tasks = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<RawTask>(record) {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    tracing::warn!(key = %primary, index, %err, "skipping unreadable task record");
                }
            }
        }
        Ok(tasks)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.store.remove(&self.keys.tasks)?;
        if let Some(legacy) = &self.keys.legacy_tasks {
            self.store.remove(legacy)?;
        }
        Ok(())
    }

    /// Moves an unreadable task list aside to `<key>.corrupt` so the next
    /// save cannot overwrite the only copy. Earlier backups are kept; later
    /// ones get `.1`, `.2`, ... appended. Returns the backup key.
    pub fn quarantine_corrupt(&mut self) -> Result<Option<String>, StorageError> {
        let Some(raw) = self.store.get(&self.keys.tasks)? else {
            return Ok(None);
        };
        let base = format!("{}{CORRUPT_SUFFIX}", self.keys.tasks);
        let mut backup = base.clone();
        let mut n = 0u32;
        while self.store.get(&backup)?.is_some() {
            n += 1;
            backup = format!("{base}.{n}");
        }
        self.store.set(&backup, &raw)?;
        self.store.remove(&self.keys.tasks)?;
        tracing::warn!(key = %self.keys.tasks, backup = %backup, "quarantined corrupt task list");
        Ok(Some(backup))
    }

    pub fn load_dark_mode(&mut self) -> Result<Option<bool>, StorageError> {
        let primary = self.keys.dark_mode.clone();
        let legacy = self.keys.legacy_dark_mode.clone();
        let value = self.read_migrating(&primary, legacy.as_deref())?;
        Ok(value.and_then(|raw| match raw.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }))
    }

    pub fn save_dark_mode(&mut self, dark_mode: bool) -> Result<(), StorageError> {
        let value = if dark_mode { "true" } else { "false" };
        self.store.set(&self.keys.dark_mode, value)
    }

    fn read_migrating(
        &mut self,
        primary: &str,
        legacy: Option<&str>,
    ) -> Result<Option<String>, StorageError> {
        if let Some(value) = self.store.get(primary)? {
            return Ok(Some(value));
        }
        let Some(legacy) = legacy else {
            return Ok(None);
        };
        let Some(value) = self.store.get(legacy)? else {
            return Ok(None);
        };
        match self.store.set(primary, &value) {
            Ok(()) => {
                self.store.remove(legacy)?;
                tracing::info!(from = legacy, to = primary, "migrated legacy storage key");
            }
            Err(err) => {
                tracing::warn!(from = legacy, to = primary, error = %err, "legacy key migration failed; reading in place");
            }
        }
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::FileStore;
    use super::KeyValueStore;
    use super::MemoryStore;
    use super::StorageKeys;
    use super::TaskStorage;
    use crate::error::StorageError;
    use crate::ids::SequentialIds;
    use crate::state::normalize_all;
    use crate::state::Task;
    use crate::state::DEFAULT_BACKGROUND_COLOR;

    fn task(id: &str, title: &str) -> Task {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).single().expect("ts");
        Task {
            id: id.to_string(),
            title: title.to_string(),
            completed: false,
            created_at: ts,
            updated_at: ts,
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            is_secret: false,
            is_expanded: false,
            priority: None,
            sub_tasks: Vec::new(),
        }
    }

    #[test]
    fn load_of_empty_store_is_empty_not_error() {
        let mut storage = TaskStorage::new(MemoryStore::new(), StorageKeys::default());
        assert!(storage.load().expect("load").is_empty());
        assert_eq!(storage.load_dark_mode().expect("theme"), None);
    }

    #[test]
    fn save_then_load_round_trips_through_normalization() {
        let mut storage = TaskStorage::new(MemoryStore::new(), StorageKeys::default());
        let tasks = vec![task("1", "a"), task("2", "b\nbody")];
        storage.save(&tasks).expect("save");

        let raw = storage.load().expect("load");
        let mut ids = SequentialIds::new("x");
        assert_eq!(normalize_all(raw, Utc::now(), &mut ids), tasks);
        assert!(storage.store().raw("taskmgr.tasks").is_some());
    }

    #[test]
    fn legacy_key_is_migrated_once() {
        let mut store = MemoryStore::new();
        store
            .set("tasks", r#"[{"id": 1714554000000, "title": "old"}]"#)
            .expect("seed");
        store.set("darkMode", "true").expect("seed");
        let mut storage = TaskStorage::new(store, StorageKeys::default());

        let raw = storage.load().expect("load");
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].id, "1714554000000");
        assert_eq!(storage.load_dark_mode().expect("theme"), Some(true));

        let keys = storage.store().keys();
        assert_eq!(keys, vec!["taskmgr.darkMode", "taskmgr.tasks"]);

        storage
            .store_mut()
            .set("tasks", r#"[{"id": "stale", "title": "ignored"}]"#)
            .expect("seed");
        let raw = storage.load().expect("load");
        assert_eq!(raw[0].id, "1714554000000");
    }

    #[test]
    fn migration_disabled_ignores_legacy_keys() {
        let mut store = MemoryStore::new();
        store.set("tasks", "[]").expect("seed");
        let mut storage = TaskStorage::new(store, StorageKeys::with_prefix("taskmgr.", false));
        assert!(storage.load().expect("load").is_empty());
        assert!(storage.store().raw("tasks").is_some());
    }

    #[test]
    fn empty_prefix_reads_legacy_keys_directly() {
        let keys = StorageKeys::with_prefix("", true);
        assert_eq!(keys.tasks, "tasks");
        assert_eq!(keys.legacy_tasks, None);
    }

    #[test]
    fn corrupt_json_is_reported_and_can_be_quarantined() {
        let mut store = MemoryStore::new();
        store.set("taskmgr.tasks", "{not json").expect("seed");
        let mut storage = TaskStorage::new(store, StorageKeys::default());

        let err = storage.load().expect_err("corrupt");
        assert!(matches!(err, StorageError::Corrupt { ref key, .. } if key == "taskmgr.tasks"));

        let backup = storage.quarantine_corrupt().expect("quarantine");
        assert_eq!(backup.as_deref(), Some("taskmgr.tasks.corrupt"));
        assert_eq!(storage.store().raw("taskmgr.tasks.corrupt"), Some("{not json"));
        assert!(storage.load().expect("load").is_empty());
    }

    #[test]
    fn later_corruption_keeps_earlier_backups() {
        let mut storage = TaskStorage::new(MemoryStore::new(), StorageKeys::default());
        for (raw, expected) in [
            ("{first", "taskmgr.tasks.corrupt"),
            ("{second", "taskmgr.tasks.corrupt.1"),
            ("{third", "taskmgr.tasks.corrupt.2"),
        ] {
            storage.store_mut().set("taskmgr.tasks", raw).expect("seed");
            let backup = storage.quarantine_corrupt().expect("quarantine");
            assert_eq!(backup.as_deref(), Some(expected));
        }
        assert_eq!(storage.store().raw("taskmgr.tasks.corrupt"), Some("{first"));
        assert_eq!(storage.store().raw("taskmgr.tasks.corrupt.1"), Some("{second"));
        assert_eq!(storage.store().raw("taskmgr.tasks.corrupt.2"), Some("{third"));
        assert!(storage.store().raw("taskmgr.tasks").is_none());
    }

    #[test]
    fn bad_fields_and_records_do_not_drop_the_list() {
        let mut store = MemoryStore::new();
        store
            .set(
                "taskmgr.tasks",
                r#"[
                    {"id": "1", "title": "Report", "completed": "yes", "isSecret": 1},
                    {"id": "2", "title": "Call", "createdAt": 1714554000000, "isExpanded": "no"},
                    "not a task",
                    {"id": "3", "title": "Trip", "subTasks": [{"id": "s1", "completed": "done"}, 7]}
                ]"#,
            )
            .expect("seed");
        let mut storage = TaskStorage::new(store, StorageKeys::default());

        let raw = storage.load().expect("load");
        let ids: Vec<&str> = raw.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(raw[0].completed, None);
        assert_eq!(raw[0].is_secret, None);
        assert_eq!(raw[1].created_at.as_deref(), Some("2024-05-01T09:00:00Z"));
        assert_eq!(raw[1].is_expanded, None);

        let tasks = normalize_all(raw, Utc::now(), &mut SequentialIds::new("x"));
        assert!(!tasks[0].completed);
        assert_eq!(
            tasks[1].created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).single().expect("ts")
        );
        assert_eq!(tasks[2].sub_tasks.len(), 1);
        assert!(!tasks[2].sub_tasks[0].completed);
    }

    #[test]
    fn null_payload_loads_as_empty() {
        let mut store = MemoryStore::new();
        store.set("taskmgr.tasks", "null").expect("seed");
        let mut storage = TaskStorage::new(store, StorageKeys::default());
        assert!(storage.load().expect("load").is_empty());
    }

    #[test]
    fn quota_failure_is_an_error_not_a_panic() {
        let mut storage = TaskStorage::new(MemoryStore::with_quota(32), StorageKeys::default());
        let err = storage
            .save(&[task("1", "a title long enough to blow the quota")])
            .expect_err("quota");
        assert!(matches!(err, StorageError::QuotaExceeded { limit: 32, .. }));
        assert!(storage.store().raw("taskmgr.tasks").is_none());
    }

    #[test]
    fn disabled_store_fails_every_operation() {
        let mut store = MemoryStore::new();
        store.set_unavailable(true);
        let mut storage = TaskStorage::new(store, StorageKeys::default());
        assert!(matches!(storage.load(), Err(StorageError::Unavailable(_))));
        assert!(matches!(storage.save(&[]), Err(StorageError::Unavailable(_))));
        assert!(matches!(storage.clear(), Err(StorageError::Unavailable(_))));
    }

    #[test]
    fn clear_removes_primary_and_legacy() {
        let mut store = MemoryStore::new();
        store.set("tasks", "[]").expect("seed");
        store.set("taskmgr.tasks", "[]").expect("seed");
        let mut storage = TaskStorage::new(store, StorageKeys::default());
        storage.clear().expect("clear");
        assert!(storage.store().keys().is_empty());
    }

    #[test]
    fn file_store_round_trips_and_overwrites() {
        let dir = tempdir().expect("tmpdir");
        let mut store = FileStore::open(dir.path().join("data")).expect("open");

        assert_eq!(store.get("taskmgr.tasks").expect("get"), None);
        store.set("taskmgr.tasks", "[1]").expect("set");
        store.set("taskmgr.tasks", "[2]").expect("set");
        assert_eq!(store.get("taskmgr.tasks").expect("get").as_deref(), Some("[2]"));

        store.remove("taskmgr.tasks").expect("remove");
        store.remove("taskmgr.tasks").expect("remove twice");
        assert_eq!(store.get("taskmgr.tasks").expect("get"), None);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempdir().expect("tmpdir");
        let mut store = FileStore::open(dir.path()).expect("open");
        for key in ["", "../escape", ".hidden", "a/b"] {
            assert!(matches!(store.set(key, "x"), Err(StorageError::InvalidKey(_))), "{key}");
        }
    }

    #[test]
    fn file_backed_task_storage_persists_across_instances() {
        let dir = tempdir().expect("tmpdir");
        let tasks = vec![task("1", "persisted")];
        {
            let store = FileStore::open(dir.path()).expect("open");
            let mut storage = TaskStorage::new(store, StorageKeys::default());
            storage.save(&tasks).expect("save");
            storage.save_dark_mode(true).expect("theme");
        }
        let store = FileStore::open(dir.path()).expect("open");
        let mut storage = TaskStorage::new(store, StorageKeys::default());
        let mut ids = SequentialIds::new("x");
        let loaded = normalize_all(storage.load().expect("load"), Utc::now(), &mut ids);
        assert_eq!(loaded, tasks);
        assert_eq!(storage.load_dark_mode().expect("theme"), Some(true));
    }
}
