//! Data source selection with a time-bounded handle cache.

use crate::config::Encoding;
use crate::data::handle::DataHandle;
use crate::data::table::TableData;
use crate::error::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// An uploaded tabular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableUpload {
    name: String,
    bytes: Vec<u8>,
}

impl TableUpload {
    /// Wrap the bytes of an uploaded file.
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read an upload from disk, named after the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self { name, bytes })
    }

    /// Upload name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw file contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Name plus content fingerprint.
    #[must_use]
    pub fn identity(&self) -> TableIdentity {
        TableIdentity {
            name: self.name.clone(),
            digest: hex::encode(Sha256::digest(&self.bytes)),
        }
    }
}

/// Identity of an upload: same name and same bytes mean the same upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentity {
    /// Upload name.
    pub name: String,
    /// SHA-256 of the upload bytes, hex encoded.
    pub digest: String,
}

/// What the user chose to chat with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The fixed database file.
    Fixed,
    /// An uploaded table.
    Upload(TableUpload),
}

/// Cache key: one entry per selection mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKey {
    /// The fixed database file.
    Fixed,
    /// An upload, by identity.
    Table(TableIdentity),
}

#[derive(Debug)]
struct CacheEntry {
    handle: Rc<DataHandle>,
    expires_at: Instant,
}

/// Resolves selections into handles and caches them for a bounded time.
#[derive(Debug)]
pub struct DataSourceResolver {
    fixed_path: PathBuf,
    table_name: String,
    ttl: Duration,
    entries: HashMap<SourceKey, CacheEntry>,
}

impl DataSourceResolver {
    /// Create a resolver.
    ///
    /// `fixed_path` is used as given; see [`resolve_app_path`] for relative paths.
    #[must_use]
    pub fn new(fixed_path: PathBuf, table_name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            fixed_path,
            table_name: table_name.into(),
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Path of the fixed database.
    #[must_use]
    pub fn fixed_path(&self) -> &Path {
        &self.fixed_path
    }

    /// Table name used for uploads.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Number of live cache entries.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.entries.len()
    }

    /// Resolve any selection.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_fixed`] and [`Self::resolve_from_table`].
    pub fn resolve(&mut self, selection: &Selection) -> Result<Rc<DataHandle>> {
        self.resolve_at(selection, Instant::now())
    }

    /// Resolve any selection as of `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_fixed`] and [`Self::resolve_from_table`].
    pub fn resolve_at(&mut self, selection: &Selection, now: Instant) -> Result<Rc<DataHandle>> {
        match selection {
            Selection::Fixed => self.resolve_fixed_at(now),
            Selection::Upload(upload) => self.resolve_from_table_at(upload, now),
        }
    }

    /// Read-only handle to the fixed database.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the file is missing or unreadable.
    pub fn resolve_fixed(&mut self) -> Result<Rc<DataHandle>> {
        self.resolve_fixed_at(Instant::now())
    }

    /// Read-only handle to the fixed database as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the file is missing or unreadable.
    pub fn resolve_fixed_at(&mut self, now: Instant) -> Result<Rc<DataHandle>> {
        let path = self.fixed_path.clone();
        self.get_or_build(SourceKey::Fixed, now, || DataHandle::open_fixed(&path))
    }

    /// In-memory handle holding `upload` as the upload table.
    ///
    /// # Errors
    ///
    /// Returns `Error::Load` if the upload is not valid tabular data.
    pub fn resolve_from_table(&mut self, upload: &TableUpload) -> Result<Rc<DataHandle>> {
        self.resolve_from_table_at(upload, Instant::now())
    }

    /// In-memory handle holding `upload` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Load` if the upload is not valid tabular data.
    pub fn resolve_from_table_at(
        &mut self,
        upload: &TableUpload,
        now: Instant,
    ) -> Result<Rc<DataHandle>> {
        let table = self.table_name.clone();
        self.get_or_build(SourceKey::Table(upload.identity()), now, || {
            let data = TableData::parse(upload.bytes(), Encoding::Utf8)?;
            DataHandle::from_table(&table, &data, upload.name())
        })
    }

    /// Drop every cached handle.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    fn get_or_build(
        &mut self,
        key: SourceKey,
        now: Instant,
        build: impl FnOnce() -> Result<DataHandle>,
    ) -> Result<Rc<DataHandle>> {
        self.purge_expired(now);

        if let Some(entry) = self.entries.get(&key) {
            debug!(?key, "handle cache hit");
            return Ok(Rc::clone(&entry.handle));
        }

        let handle = Rc::new(build()?);
        info!(
            provenance = %handle.provenance(),
            source = handle.label(),
            "resolved data source"
        );
        self.entries.insert(
            key,
            CacheEntry {
                handle: Rc::clone(&handle),
                expires_at: now + self.ttl,
            },
        );
        Ok(handle)
    }

    fn purge_expired(&mut self, now: Instant) {
        self.entries.retain(|key, entry| {
            let live = entry.expires_at > now;
            if !live {
                debug!(?key, "handle expired");
            }
            live
        });
    }
}

/// Resolve a relative path against the running executable's directory.
///
/// Absolute paths are returned unchanged. Falls back to the path as given if
/// the executable location is unknown.
#[must_use]
pub fn resolve_app_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(path)))
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::handle::load_table;
    use crate::error::Error;
    use rusqlite::Connection;
    use tempfile::TempDir;

    const TTL: Duration = Duration::from_secs(2 * 60 * 60);

    fn fixture_db(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("analytics_db");
        let data = TableData::parse(b"id,region\n1,north\n2,south\n", Encoding::Utf8).unwrap();
        let mut conn = Connection::open(&path).unwrap();
        load_table(&mut conn, "test", &data).unwrap();
        path
    }

    fn upload(name: &str) -> TableUpload {
        TableUpload::new(name, b"id,qty\n1,5\n2,7\n".to_vec())
    }

    fn row_count(handle: &DataHandle, table: &str) -> i64 {
        handle
            .connection()
            .query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn fixed_is_cached_within_ttl() {
        let temp_dir = TempDir::new().unwrap();
        let mut resolver = DataSourceResolver::new(fixture_db(&temp_dir), "csv_table", TTL);
        let start = Instant::now();

        let first = resolver.resolve_fixed_at(start).unwrap();
        let second = resolver
            .resolve_fixed_at(start + Duration::from_secs(60))
            .unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn fixed_is_rebuilt_after_ttl() {
        let temp_dir = TempDir::new().unwrap();
        let mut resolver = DataSourceResolver::new(fixture_db(&temp_dir), "csv_table", TTL);
        let start = Instant::now();

        let first = resolver.resolve_fixed_at(start).unwrap();
        let later = resolver.resolve_fixed_at(start + TTL).unwrap();

        assert!(!Rc::ptr_eq(&first, &later));
        assert_eq!(row_count(&later, "test"), 2);
    }

    #[test]
    fn missing_fixed_file_is_connection_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut resolver =
            DataSourceResolver::new(temp_dir.path().join("missing_db"), "csv_table", TTL);

        let err = resolver.resolve_fixed().unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(resolver.cached(), 0);
    }

    #[test]
    fn same_upload_reuses_handle() {
        let mut resolver = DataSourceResolver::new(PathBuf::from("unused"), "csv_table", TTL);
        let first = resolver.resolve_from_table(&upload("sales.csv")).unwrap();
        let second = resolver.resolve_from_table(&upload("sales.csv")).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn identical_content_different_identity_is_isolated() {
        let mut resolver = DataSourceResolver::new(PathBuf::from("unused"), "csv_table", TTL);
        let a = resolver.resolve_from_table(&upload("a.csv")).unwrap();
        let b = resolver.resolve_from_table(&upload("b.csv")).unwrap();

        assert!(!Rc::ptr_eq(&a, &b));
        a.connection().execute("DELETE FROM csv_table", []).unwrap();

        assert_eq!(row_count(&a, "csv_table"), 0);
        assert_eq!(row_count(&b, "csv_table"), 2);
    }

    #[test]
    fn malformed_upload_is_load_error() {
        let mut resolver = DataSourceResolver::new(PathBuf::from("unused"), "csv_table", TTL);
        let bad = TableUpload::new("bad.csv", b"a,b\n1,2,3\n".to_vec());

        let err = resolver.resolve_from_table(&bad).unwrap_err();
        assert!(matches!(err, Error::Load(_)));
        assert_eq!(resolver.cached(), 0);
    }

    #[test]
    fn expired_entries_are_purged_on_access() {
        let mut resolver = DataSourceResolver::new(PathBuf::from("unused"), "csv_table", TTL);
        let start = Instant::now();
        resolver
            .resolve_from_table_at(&upload("a.csv"), start)
            .unwrap();
        resolver
            .resolve_from_table_at(&upload("b.csv"), start + TTL)
            .unwrap();

        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn identity_depends_on_name_and_bytes() {
        let a = upload("a.csv").identity();
        assert_eq!(a, upload("a.csv").identity());
        assert_ne!(a, upload("b.csv").identity());
        assert_ne!(
            a,
            TableUpload::new("a.csv", b"id,qty\n1,6\n".to_vec()).identity()
        );
        assert_eq!(a.digest.len(), 64);
    }

    #[test]
    fn resolve_app_path_keeps_absolute() {
        let abs = std::env::temp_dir().join("analytics_db");
        assert_eq!(resolve_app_path(&abs), abs);
    }
}
