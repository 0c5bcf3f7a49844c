//! Backup Manager
//!
//! Byte-level copies of the storage file into `<storage_dir>/<backup_dir>/<name>.db`.
//! The store's connection is checkpointed and dropped first, so the copied
//! file carries every committed write. Existing backups are never overwritten.

use crate::db::database::DatabaseService;
use crate::db::error::BackupError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};

/// Default backup directory name, next to the storage file
pub const DEFAULT_BACKUP_DIR: &str = "backups";

const BACKUP_EXTENSION: &str = "db";

/// Metadata of a backup that was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub file: PathBuf,
    pub backup_name: String,
    pub file_size: u64,
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
}

impl BackupManager {
    /// Backups of `storage_path` go to `<parent of storage_path>/<dir_name>`
    pub fn new(storage_path: &Path, dir_name: &str) -> Self {
        let parent = storage_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        Self {
            backup_dir: parent.join(dir_name),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Target path for a backup name
    pub fn backup_path(&self, name: &str) -> PathBuf {
        self.backup_dir
            .join(format!("{}.{}", name, BACKUP_EXTENSION))
    }

    /// `backup_<YYYY-MM-DD_HH-MM-SS>_<8 hex chars>`
    pub fn default_name(now: DateTime<Utc>) -> String {
        format!(
            "backup_{}_{}",
            now.format("%Y-%m-%d_%H-%M-%S"),
            random_suffix()
        )
    }

    /// Names must stay inside the backup directory
    pub fn validate_name(name: &str) -> Result<(), BackupError> {
        let invalid = name.trim().is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
            || name.contains('\0');

        if invalid {
            return Err(BackupError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Copy the storage file of `db` to a named backup
    ///
    /// Fails without touching anything on disk if the name is invalid or a
    /// backup with that name already exists, including one created by another
    /// process between the check and the copy. Fails as well when the WAL
    /// could not be fully checkpointed, since the copy would miss commits.
    pub async fn create_backup(
        &self,
        db: &DatabaseService,
        name: Option<&str>,
    ) -> Result<BackupInfo, BackupError> {
        let backup_name = match name {
            Some(name) => name.to_string(),
            None => Self::default_name(db.now()),
        };
        Self::validate_name(&backup_name)?;

        let file = self.backup_path(&backup_name);
        if tokio::fs::metadata(&file).await.is_ok() {
            return Err(BackupError::AlreadyExists { file });
        }

        let storage = db.path().to_path_buf();
        if tokio::fs::metadata(&storage).await.is_err() {
            return Err(BackupError::StorageMissing { path: storage });
        }

        if !db.close().await? {
            return Err(BackupError::CheckpointIncomplete { path: storage });
        }

        tokio::fs::create_dir_all(&self.backup_dir)
            .await
            .map_err(|e| BackupError::io(self.backup_dir.clone(), e))?;

        // create_new makes the existence check and the create one step
        let mut target = match OpenOptions::new().write(true).create_new(true).open(&file).await {
            Ok(target) => target,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(BackupError::AlreadyExists { file });
            }
            Err(e) => return Err(BackupError::io(file, e)),
        };

        let file_size = match copy_into(&storage, &mut target).await {
            Ok(size) => size,
            Err(e) => {
                drop(target);
                if let Err(cleanup) = tokio::fs::remove_file(&file).await {
                    tracing::warn!(file = %file.display(), error = %cleanup, "failed to remove partial backup");
                }
                return Err(BackupError::io(file, e));
            }
        };

        tracing::info!(
            backup_name = %backup_name,
            file = %file.display(),
            file_size,
            "backup written"
        );

        Ok(BackupInfo {
            file,
            backup_name,
            file_size,
        })
    }
}

async fn copy_into(storage: &Path, target: &mut File) -> std::io::Result<u64> {
    let mut source = File::open(storage).await?;
    let size = tokio::io::copy(&mut source, target).await?;
    target.sync_all().await?;
    Ok(size)
}

/// Random suffix that keeps generated names unique within one second
pub fn random_suffix() -> String {
    let mut hex = uuid::Uuid::new_v4().simple().to_string();
    hex.truncate(8);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, DatabaseService, BackupManager) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("graph.db");
        let db = DatabaseService::new(db_path.clone()).await.unwrap();
        let manager = BackupManager::new(&db_path, DEFAULT_BACKUP_DIR);
        (temp_dir, db, manager)
    }

    #[tokio::test]
    async fn test_backup_written_next_to_storage() {
        let (temp_dir, db, manager) = setup().await;

        let info = manager.create_backup(&db, Some("nightly")).await.unwrap();

        assert_eq!(info.backup_name, "nightly");
        assert_eq!(info.file, temp_dir.path().join("backups").join("nightly.db"));
        assert!(info.file.exists());
        assert_eq!(info.file_size, std::fs::metadata(&info.file).unwrap().len());
        assert!(info.file_size > 0);
    }

    #[tokio::test]
    async fn test_duplicate_name_leaves_original_untouched() {
        let (_tmp, db, manager) = setup().await;

        let first = manager.create_backup(&db, Some("x")).await.unwrap();
        let before = std::fs::read(&first.file).unwrap();

        let conn = db.connection().await.unwrap();
        conn.execute("INSERT INTO nodes (id, data) VALUES ('n1', '{\"id\":\"n1\"}')", ())
            .await
            .unwrap();

        let err = manager.create_backup(&db, Some("x")).await.unwrap_err();
        assert_eq!(err.existing_file(), Some(&first.file));
        assert_eq!(std::fs::read(&first.file).unwrap(), before);
    }

    #[tokio::test]
    async fn test_store_usable_after_backup() {
        let (_tmp, db, manager) = setup().await;
        manager.create_backup(&db, None).await.unwrap();

        let conn = db.connection().await.unwrap();
        conn.execute("INSERT INTO nodes (id, data) VALUES ('n1', '{}')", ())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_backup_contains_committed_rows() {
        let (_tmp, db, manager) = setup().await;
        let conn = db.connection().await.unwrap();
        conn.execute("INSERT INTO nodes (id, data) VALUES ('n1', '{}')", ())
            .await
            .unwrap();
        drop(conn);

        let info = manager.create_backup(&db, Some("with_row")).await.unwrap();

        let copy = DatabaseService::new(info.file).await.unwrap();
        let conn = copy.connection().await.unwrap();
        let mut rows = conn.query("SELECT COUNT(*) FROM nodes", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_same_name_writes_once() {
        let temp_dir = TempDir::new().unwrap();
        let first_path = temp_dir.path().join("first.db");
        let second_path = temp_dir.path().join("second.db");
        let first = DatabaseService::new(first_path.clone()).await.unwrap();
        let second = DatabaseService::new(second_path.clone()).await.unwrap();
        let first_manager = BackupManager::new(&first_path, DEFAULT_BACKUP_DIR);
        let second_manager = BackupManager::new(&second_path, DEFAULT_BACKUP_DIR);

        let (a, b) = tokio::join!(
            first_manager.create_backup(&first, Some("shared")),
            second_manager.create_backup(&second, Some("shared")),
        );

        let (written, rejected) = match (a, b) {
            (Ok(info), Err(err)) | (Err(err), Ok(info)) => (info, err),
            other => panic!("expected exactly one backup, got {:?}", other),
        };
        assert!(matches!(rejected, BackupError::AlreadyExists { .. }));
        assert_eq!(rejected.existing_file(), Some(&written.file));
        assert_eq!(
            std::fs::metadata(&written.file).unwrap().len(),
            written.file_size
        );
    }

    #[tokio::test]
    async fn test_blocked_checkpoint_fails_backup() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("graph.db");
        let db = DatabaseService::with_options(
            db_path.clone(),
            50,
            std::sync::Arc::new(crate::models::time::SystemTimeProvider),
        )
        .await
        .unwrap();
        let manager = BackupManager::new(&db_path, DEFAULT_BACKUP_DIR);

        let conn = db.connection().await.unwrap();
        conn.execute("INSERT INTO nodes (id, data) VALUES ('n1', '{}')", ())
            .await
            .unwrap();
        drop(conn);

        let other = libsql::Builder::new_local(&db_path).build().await.unwrap();
        let reader = other.connect().unwrap();
        reader.execute("BEGIN", ()).await.unwrap();
        let mut rows = reader.query("SELECT COUNT(*) FROM nodes", ()).await.unwrap();
        assert!(rows.next().await.unwrap().is_some());
        drop(rows);

        let err = manager.create_backup(&db, Some("stale")).await.unwrap_err();
        assert!(matches!(err, BackupError::CheckpointIncomplete { .. }));
        assert!(!manager.backup_path("stale").exists());

        reader.execute("COMMIT", ()).await.unwrap();
        drop(reader);
        assert!(manager.create_backup(&db, Some("stale")).await.is_ok());
    }

    #[test]
    fn test_name_validation() {
        assert!(BackupManager::validate_name("backup_2024").is_ok());
        for bad in ["", "  ", "../escape", "a/b", "a\\b", "x..y"] {
            assert!(
                matches!(
                    BackupManager::validate_name(bad),
                    Err(BackupError::InvalidName { .. })
                ),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_default_name_shape() {
        let now = DateTime::parse_from_rfc3339("2024-06-01T08:09:10Z")
            .unwrap()
            .with_timezone(&Utc);
        let name = BackupManager::default_name(now);
        assert!(name.starts_with("backup_2024-06-01_08-09-10_"));
        assert_eq!(name.len(), "backup_2024-06-01_08-09-10_".len() + 8);
        assert_ne!(name, BackupManager::default_name(now));
    }
}
