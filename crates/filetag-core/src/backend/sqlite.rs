//! SQLite-backed tag store.
//!
//! Tags live in a single `file_tags` table keyed by (namespace, file, field).
//! The namespace is the configured tag prefix, so several deployments can share
//! one database without seeing each other's fields.

use super::traits::{empty_tag_map, ensure_source_exists, FileRef, TagBackend, TagMap};
use crate::config::{BackendConfig, TagConfig};
use crate::metadata::Metadata;
use crate::{FiletagError, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// SQLite tag backend.
///
/// The connection is created by `open` and dropped by `close`; access is
/// serialized through a mutex.
pub struct SqliteBackend {
    db_path: PathBuf,
    namespace: String,
    conn: Mutex<Option<Connection>>,
}

impl SqliteBackend {
    /// Create a backend over the database at `db_path`.
    pub fn new(db_path: impl AsRef<Path>, namespace: impl Into<String>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            namespace: namespace.into(),
            conn: Mutex::new(None),
        }
    }

    /// Create a backend from configuration.
    ///
    /// Without a configured database path the store is created in the working
    /// directory.
    pub fn from_config(config: &BackendConfig) -> Self {
        let db_path = config
            .database_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(TagConfig::SQLITE_FILE_NAME));
        Self::new(db_path, config.namespace())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn.lock().map_err(|e| FiletagError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        match guard.as_mut() {
            Some(conn) => f(conn),
            None => Err(FiletagError::BackendClosed {
                backend: self.name(),
            }),
        }
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS file_tags (
                namespace TEXT NOT NULL,
                file TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, file, field)
            );

            CREATE INDEX IF NOT EXISTS idx_file_tags_file
                ON file_tags(namespace, file);
            "#,
        )
        .map_err(|e| FiletagError::Database {
            message: format!("Failed to initialize tag schema: {}", e),
            source: Some(e),
        })
    }

    fn read_tags(&self, conn: &Connection, files: &[FileRef]) -> Result<TagMap> {
        let mut stmt = conn.prepare_cached(
            "SELECT field, value FROM file_tags WHERE namespace = ?1 AND file = ?2",
        )?;

        let mut result = TagMap::new();
        for file in files {
            let metadata = stmt
                .query_map(params![self.namespace, file.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Metadata, _>>()?;
            result.insert(file.clone(), metadata);
        }
        Ok(result)
    }

    fn replace_tags(
        &self,
        conn: &mut Connection,
        src: &FileRef,
        dest: &FileRef,
        clear_src: bool,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM file_tags WHERE namespace = ?1 AND file = ?2",
            params![self.namespace, dest.as_str()],
        )?;
        let copied = tx.execute(
            r#"
            INSERT INTO file_tags (namespace, file, field, value, updated_at)
            SELECT namespace, ?3, field, value, ?4
            FROM file_tags
            WHERE namespace = ?1 AND file = ?2
            "#,
            params![self.namespace, src.as_str(), dest.as_str(), now],
        )?;
        if clear_src {
            tx.execute(
                "DELETE FROM file_tags WHERE namespace = ?1 AND file = ?2",
                params![self.namespace, src.as_str()],
            )?;
        }

        tx.commit()?;
        debug!(
            "{} {} tags {} -> {}",
            if clear_src { "Moved" } else { "Copied" },
            copied,
            src,
            dest
        );
        Ok(())
    }
}

impl TagBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn open(&self) -> Result<()> {
        let mut guard = self.lock()?;
        if guard.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| FiletagError::Io {
                    message: format!("Failed to create database directory: {}", e),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(&self.db_path).map_err(|e| FiletagError::Database {
            message: format!("Failed to open tag database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| FiletagError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        Self::init_schema(&conn)?;
        debug!("Opened tag database {}", self.db_path.display());
        *guard = Some(conn);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let conn = self.lock()?.take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| FiletagError::Database {
                message: format!("Failed to close tag database: {}", e),
                source: Some(e),
            })?;
            debug!("Closed tag database {}", self.db_path.display());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn get_tags(&self, files: &[FileRef]) -> Result<TagMap> {
        self.with_conn(|conn| match self.read_tags(conn, files) {
            Ok(tags) => Ok(tags),
            Err(e) => {
                warn!("Tag database unreadable, reporting empty tags: {}", e);
                Ok(empty_tag_map(files))
            }
        })
    }

    fn set_tags(&self, files: &[FileRef], metadata: &Metadata) -> Result<()> {
        self.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    r#"
                    INSERT INTO file_tags (namespace, file, field, value, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(namespace, file, field) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at
                    "#,
                )?;
                for file in files {
                    for (field, value) in metadata {
                        stmt.execute(params![self.namespace, file.as_str(), field, value, now])?;
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn copy_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
        self.with_conn(|conn| {
            ensure_source_exists(src)?;
            if src == dest {
                return Ok(());
            }
            self.replace_tags(conn, src, dest, false)
        })
    }

    fn move_tags(&self, src: &FileRef, dest: &FileRef) -> Result<()> {
        self.with_conn(|conn| {
            ensure_source_exists(src)?;
            if src == dest {
                return Ok(());
            }
            self.replace_tags(conn, src, dest, true)
        })
    }

    fn remove_tags(&self, files: &[FileRef]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            for file in files {
                removed += tx.execute(
                    "DELETE FROM file_tags WHERE namespace = ?1 AND file = ?2",
                    params![self.namespace, file.as_str()],
                )?;
            }
            tx.commit()?;
            debug!("Removed {} tags from {} files", removed, files.len());
            Ok(())
        })
    }
}
