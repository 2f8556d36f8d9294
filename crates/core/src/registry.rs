//! Connection registry: one shared SQLite handle per database file, opened
//! lazily and reused for the process lifetime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{info, warn};

use sqlyard_error::{Error, Result};

use crate::extensions::{discover_extensions, native_library_suffix, DiscoveredExtension};

/// A database name is a path component; restrict it so it cannot escape the
/// databases directory.
pub fn validate_db_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation(
            sqlyard_error::ErrorCode::InvalidDatabaseName,
            "Database name must not be empty",
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::validation(
            sqlyard_error::ErrorCode::InvalidDatabaseName,
            format!("Invalid database name '{name}'"),
        )
        .with_hint("Use only letters and digits"));
    }
    Ok(())
}

/// Shared handle to one database file. All statements on a database serialize
/// through this mutex.
pub type DbHandle = Arc<Mutex<Connection>>;

/// Lazily-opened pool of named SQLite databases under a single directory.
pub struct ConnectionRegistry {
    db_dir: PathBuf,
    extensions_dir: PathBuf,
    handles: Mutex<HashMap<String, DbHandle>>,
    /// Extension names loaded per database, for reporting.
    loaded: Mutex<HashMap<String, Vec<String>>>,
}

impl ConnectionRegistry {
    pub fn new(db_dir: impl Into<PathBuf>, extensions_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_dir: db_dir.into(),
            extensions_dir: extensions_dir.into(),
            handles: Mutex::new(HashMap::new()),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    pub fn extensions_dir(&self) -> &Path {
        &self.extensions_dir
    }

    fn db_path(&self, name: &str) -> PathBuf {
        self.db_dir.join(format!("{name}.db"))
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<String, DbHandle>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn loaded(&self) -> MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.loaded.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Names of databases with files on disk, sorted.
    pub fn database_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&self.db_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().map(|e| e == "db").unwrap_or(false) {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        names
    }

    pub fn database_exists(&self, name: &str) -> bool {
        self.db_path(name).is_file()
    }

    /// Get the shared handle for `name`, opening the file on first use.
    /// Opening creates the file if absent, switches it to WAL and loads every
    /// discovered extension library on a best-effort basis.
    pub fn handle(&self, name: &str) -> Result<DbHandle> {
        validate_db_name(name)?;

        let mut handles = self.handles();
        if let Some(handle) = handles.get(name) {
            return Ok(handle.clone());
        }

        std::fs::create_dir_all(&self.db_dir).map_err(|e| {
            Error::internal(format!("Cannot create databases directory: {e}"))
        })?;

        let path = self.db_path(name);
        let conn = Connection::open(&path).map_err(|e| {
            Error::new(
                sqlyard_error::ErrorCode::ConnectionFailed,
                format!("Cannot open database '{name}': {e}"),
            )
        })?;

        conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))
            .map_err(|e| {
                Error::new(
                    sqlyard_error::ErrorCode::ConnectionFailed,
                    format!("Cannot enable WAL on '{name}': {e}"),
                )
            })?;

        let mut loaded_names = Vec::new();
        for ext in discover_extensions(&self.extensions_dir) {
            match load_into(&conn, &ext.path, None) {
                Ok(()) => loaded_names.push(ext.name),
                Err(e) => {
                    warn!(db = name, extension = %ext.name, error = %e, "Skipping extension that failed to load");
                }
            }
        }

        info!(db = name, path = %path.display(), extensions = loaded_names.len(), "Opened database");

        let handle: DbHandle = Arc::new(Mutex::new(conn));
        handles.insert(name.to_string(), handle.clone());
        self.loaded().insert(name.to_string(), loaded_names);
        Ok(handle)
    }

    /// Create a database file with a starter table. Idempotent on the table,
    /// but refuses nothing if the file already exists: re-creation is a no-op
    /// beyond opening the handle.
    pub fn create_database(&self, name: &str) -> Result<()> {
        validate_db_name(name)?;
        let handle = self.handle(name)?;
        let conn = handle.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "CREATE TABLE IF NOT EXISTS example (
                id INTEGER PRIMARY KEY,
                name TEXT,
                value REAL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .map_err(|e| Error::execution(format!("Cannot initialize database '{name}': {e}")))?;
        Ok(())
    }

    /// Load a named extension into one database. The extension must exist as
    /// a library file in the extensions directory and the database file must
    /// already exist.
    pub fn load_extension(
        &self,
        db_name: &str,
        extension_name: &str,
        entry_point: Option<&str>,
    ) -> Result<()> {
        validate_db_name(db_name)?;
        if !self.database_exists(db_name) {
            return Err(Error::not_found(
                sqlyard_error::ErrorCode::DatabaseNotFound,
                format!("Database '{db_name}' not found"),
            ));
        }

        let path = self.extension_path(extension_name)?;
        let handle = self.handle(db_name)?;
        let conn = handle.lock().unwrap_or_else(|e| e.into_inner());
        load_into(&conn, &path, entry_point).map_err(|e| {
            Error::new(
                sqlyard_error::ErrorCode::ExtensionLoadFailed,
                format!("Cannot load extension '{extension_name}' into '{db_name}': {e}"),
            )
        })?;

        let mut loaded = self.loaded();
        let names = loaded.entry(db_name.to_string()).or_default();
        if !names.iter().any(|n| n == extension_name) {
            names.push(extension_name.to_string());
        }
        info!(db = db_name, extension = extension_name, "Loaded extension");
        Ok(())
    }

    fn extension_path(&self, extension_name: &str) -> Result<PathBuf> {
        let path = self
            .extensions_dir
            .join(format!("{extension_name}.{}", native_library_suffix()));
        if !path.is_file() {
            return Err(Error::not_found(
                sqlyard_error::ErrorCode::ExtensionNotFound,
                format!("Extension '{extension_name}' not found"),
            )
            .with_hint(format!(
                "Expected a library file at {}",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Extension libraries available on disk.
    pub fn available_extensions(&self) -> Vec<DiscoveredExtension> {
        discover_extensions(&self.extensions_dir)
    }

    /// Databases into which `extension_name` has been loaded this process.
    pub fn databases_with_extension(&self, extension_name: &str) -> Vec<String> {
        let loaded = self.loaded();
        let mut dbs: Vec<String> = loaded
            .iter()
            .filter(|(_, exts)| exts.iter().any(|e| e == extension_name))
            .map(|(db, _)| db.clone())
            .collect();
        dbs.sort();
        dbs
    }

    /// Extensions loaded into `db_name` this process.
    pub fn extensions_in_database(&self, db_name: &str) -> Vec<String> {
        self.loaded().get(db_name).cloned().unwrap_or_default()
    }
}

fn load_into(
    conn: &Connection,
    path: &Path,
    entry_point: Option<&str>,
) -> rusqlite::Result<()> {
    // Loading stays enabled only for the duration of the guard.
    unsafe {
        let _guard = rusqlite::LoadExtensionGuard::new(conn)?;
        conn.load_extension(path, entry_point)
    }
}
