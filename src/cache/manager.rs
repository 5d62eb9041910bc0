//! TTL file cache for persisting upstream responses to disk
//!
//! Provides a `TtlFileCache` that stores one response body in one file and
//! judges freshness purely from the file's modification time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

use super::{CachableResponse, CacheError, CacheKey, SaveError};

/// Mode for freshly created cache files, readable by other users of the cache dir
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

#[cfg(unix)]
fn set_new_file_mode(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(NEW_FILE_MODE))
}

#[cfg(not(unix))]
fn set_new_file_mode(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

/// Result of reading from cache, including metadata about cache freshness
#[derive(Debug)]
pub struct CachedBody {
    /// The cached bytes
    pub body: Vec<u8>,
    /// Modification time of the cache file, if the platform reports one
    pub last_modified: Option<DateTime<Utc>>,
    /// Whether the entry is older than the revalidate time
    pub is_expired: bool,
}

/// Outcome of a successful `save` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No response was given, nothing was touched
    Skipped,
    /// The cache file now holds `bytes` bytes
    Written { bytes: usize },
}

/// Snapshot of a cache slot, suitable for printing
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    /// Full path of the cache file
    pub path: PathBuf,
    /// Whether the cache file is present
    pub exists: bool,
    /// Modification time of the cache file, if known
    pub last_modified: Option<DateTime<Utc>>,
    /// Whether the entry is fresh at the time of the snapshot
    pub is_valid: bool,
    /// Revalidate time in milliseconds, saturating at `u64::MAX`
    pub revalidate_ms: u64,
}

/// Single-file cache with a time-to-live
///
/// The cache file lives at `cache_dir/cache_file`. An entry is valid while it
/// exists and `now - mtime < revalidate_time`; hitting the boundary exactly
/// counts as expired. Writes go to a temporary file in the same directory that
/// is then renamed over the target, so readers see either the old or the new
/// body, never a partial one.
#[derive(Debug, Clone)]
pub struct TtlFileCache {
    /// How long an entry stays fresh after it was written
    revalidate_time: Duration,
    /// Directory where the cache file is stored
    cache_dir: PathBuf,
    /// File name within `cache_dir`
    cache_file: String,
}

impl TtlFileCache {
    /// Creates a cache whose file lives in the system temp directory
    ///
    /// The temp directory may be wiped by the host at any time; the cache
    /// simply misses afterwards.
    pub fn new(revalidate_time: Duration, cache_file: impl Into<String>) -> Self {
        Self::with_dir(std::env::temp_dir(), revalidate_time, cache_file)
    }

    /// Creates a cache with a custom base directory
    ///
    /// Useful for testing or when a specific cache location is needed.
    pub fn with_dir(
        cache_dir: impl Into<PathBuf>,
        revalidate_time: Duration,
        cache_file: impl Into<String>,
    ) -> Self {
        Self {
            revalidate_time,
            cache_dir: cache_dir.into(),
            cache_file: cache_file.into(),
        }
    }

    /// Creates a cache whose file is named after `key`
    pub fn for_key(cache_dir: impl Into<PathBuf>, revalidate_time: Duration, key: &CacheKey) -> Self {
        Self::with_dir(cache_dir, revalidate_time, key.file_name())
    }

    pub fn revalidate_time(&self) -> Duration {
        self.revalidate_time
    }

    /// Returns the path to the cache file
    pub fn cache_file_path(&self) -> PathBuf {
        self.cache_dir.join(&self.cache_file)
    }

    /// Stats the cache file, mapping "not found" to `None`
    fn metadata(&self) -> Result<Option<fs::Metadata>, CacheError> {
        let path = self.cache_file_path();
        match fs::metadata(&path) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Platform { path, source }),
        }
    }

    /// Checks whether the cache file exists
    ///
    /// # Returns
    /// * `Ok(false)` if the file does not exist
    /// * `Err(CacheError::Platform)` for any other filesystem failure
    pub fn cache_file_exists(&self) -> Result<bool, CacheError> {
        Ok(self.metadata()?.is_some())
    }

    /// Returns the modification time of the cache file
    ///
    /// `None` if the file is absent or the platform does not record mtimes.
    pub fn cache_file_last_modified(&self) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(self
            .metadata()?
            .and_then(|meta| meta.modified().ok())
            .map(DateTime::<Utc>::from))
    }

    /// Checks whether the cache entry is fresh right now
    pub fn is_cache_valid(&self) -> Result<bool, CacheError> {
        self.is_valid_at(Utc::now())
    }

    /// Checks whether the cache entry is fresh at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> Result<bool, CacheError> {
        Ok(self
            .cache_file_last_modified()?
            .is_some_and(|modified| self.is_fresh(modified, now)))
    }

    fn is_fresh(&self, modified: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::from_std(self.revalidate_time).unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(modified) < ttl
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    /// Writes `data` to a sibling temp file and renames it over the cache file
    ///
    /// The cache file keeps its permissions across saves; a new one gets
    /// `NEW_FILE_MODE` instead of the temp file's owner-only mode.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.ensure_dir()?;
        let original_perms = fs::metadata(path).ok().map(|meta| meta.permissions());

        let mut tmp = NamedTempFile::new_in(&self.cache_dir)?;
        tmp.write_all(data)?;
        match original_perms {
            Some(perms) => tmp.as_file().set_permissions(perms)?,
            None => set_new_file_mode(tmp.as_file())?,
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Persists a response as the new cache entry
    ///
    /// Drains the body, then replaces the cache file wholesale, which resets
    /// its freshness. Passing `None` is a no-op.
    ///
    /// Failures are logged and returned, never panicked on; callers on the
    /// request path are free to ignore them.
    pub async fn save<R: CachableResponse>(
        &self,
        response: Option<R>,
    ) -> Result<SaveOutcome, SaveError> {
        let Some(response) = response else {
            return Ok(SaveOutcome::Skipped);
        };

        let path = self.cache_file_path();
        let result = async {
            let text = response.text().await?;
            let data = text.into_bytes();
            self.write_atomic(&path, &data)
                .map_err(|source| SaveError::Write {
                    path: path.clone(),
                    source,
                })?;
            Ok::<_, SaveError>(SaveOutcome::Written { bytes: data.len() })
        }
        .await;

        match &result {
            Ok(SaveOutcome::Written { bytes }) => {
                tracing::debug!(path = %path.display(), bytes, "cache entry written");
            }
            Ok(SaveOutcome::Skipped) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to save cache entry");
            }
        }
        result
    }

    /// Reads the cache entry regardless of freshness
    ///
    /// Expired entries are returned with `is_expired = true`, allowing callers
    /// to fall back on stale data when the upstream is unavailable.
    ///
    /// # Returns
    /// * `Ok(None)` if there is no cache file
    /// * `Ok(Some(CachedBody))` with the file contents otherwise
    pub fn read(&self) -> Result<Option<CachedBody>, CacheError> {
        let path = self.cache_file_path();
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Platform { path, source }),
        };

        let last_modified = self.cache_file_last_modified()?;
        let is_expired = !last_modified.is_some_and(|modified| self.is_fresh(modified, Utc::now()));

        Ok(Some(CachedBody {
            body,
            last_modified,
            is_expired,
        }))
    }

    /// Reads the cache entry only if it is still fresh
    pub fn read_if_valid(&self) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self
            .read()?
            .filter(|cached| !cached.is_expired)
            .map(|cached| cached.body))
    }

    /// Reports the current state of the cache slot
    pub fn status(&self) -> Result<CacheStatus, CacheError> {
        let last_modified = self.cache_file_last_modified()?;
        let now = Utc::now();
        Ok(CacheStatus {
            path: self.cache_file_path(),
            exists: self.cache_file_exists()?,
            is_valid: last_modified.is_some_and(|modified| self.is_fresh(modified, now)),
            last_modified,
            revalidate_ms: u64::try_from(self.revalidate_time.as_millis()).unwrap_or(u64::MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BodyError;
    use std::fs::File;
    use std::time::SystemTime;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    /// Response whose body was already taken
    struct ConsumedResponse;

    impl CachableResponse for ConsumedResponse {
        async fn text(self) -> Result<String, BodyError> {
            Err(BodyError::Consumed)
        }
    }

    fn create_test_cache(ttl: Duration) -> (TtlFileCache, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = TtlFileCache::with_dir(temp_dir.path(), ttl, "x.json");
        (cache, temp_dir)
    }

    fn set_mtime(path: &Path, mtime: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .expect("Should open cache file")
            .set_modified(mtime)
            .expect("Should set mtime");
    }

    #[test]
    fn test_cache_file_path_joins_dir_and_file() {
        let cache = TtlFileCache::with_dir("/some/dir", HOUR, "x.json");
        assert_eq!(cache.cache_file_path(), PathBuf::from("/some/dir/x.json"));
    }

    #[test]
    fn test_new_uses_system_temp_dir() {
        let cache = TtlFileCache::new(HOUR, "x.json");
        assert_eq!(cache.cache_file_path(), std::env::temp_dir().join("x.json"));
        assert_eq!(cache.revalidate_time(), HOUR);
    }

    #[test]
    fn test_for_key_names_file_after_digest() {
        let key = CacheKey::digest("abc");
        let cache = TtlFileCache::for_key("/cache", HOUR, &key);
        assert_eq!(
            cache.cache_file_path(),
            PathBuf::from("/cache").join(key.file_name())
        );
    }

    #[test]
    fn test_absent_entry_is_invalid() {
        let (cache, _temp_dir) = create_test_cache(HOUR);

        assert!(!cache.cache_file_exists().unwrap());
        assert!(cache.cache_file_last_modified().unwrap().is_none());
        assert!(!cache.is_cache_valid().unwrap());
        assert!(cache.read().unwrap().is_none());
    }

    #[test]
    fn test_platform_errors_are_not_treated_as_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        // A regular file used as the cache directory makes stat fail with ENOTDIR
        let not_a_dir = temp_dir.path().join("plain_file");
        fs::write(&not_a_dir, b"").unwrap();
        let cache = TtlFileCache::with_dir(&not_a_dir, HOUR, "x.json");

        assert!(matches!(
            cache.cache_file_exists(),
            Err(CacheError::Platform { .. })
        ));
        assert!(cache.cache_file_last_modified().is_err());
        assert!(cache.is_cache_valid().is_err());
    }

    #[tokio::test]
    async fn test_save_writes_body_and_makes_entry_valid() {
        let (cache, temp_dir) = create_test_cache(HOUR);

        let outcome = cache.save(Some("abc")).await.expect("Save should succeed");

        assert_eq!(outcome, SaveOutcome::Written { bytes: 3 });
        assert_eq!(fs::read(temp_dir.path().join("x.json")).unwrap(), b"abc");
        assert!(cache.cache_file_exists().unwrap());
        assert!(cache.is_cache_valid().unwrap());
    }

    #[tokio::test]
    async fn test_save_none_is_noop() {
        let (cache, temp_dir) = create_test_cache(HOUR);

        let outcome = cache.save(None::<String>).await.expect("Save should succeed");

        assert_eq!(outcome, SaveOutcome::Skipped);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_resave_overwrites_and_refreshes() {
        let (cache, _temp_dir) = create_test_cache(HOUR);
        cache.save(Some("first, longer body")).await.unwrap();

        // Age the first entry past its TTL
        set_mtime(&cache.cache_file_path(), SystemTime::now() - 2 * HOUR);
        assert!(!cache.is_cache_valid().unwrap());

        cache.save(Some("second")).await.unwrap();

        assert_eq!(fs::read(cache.cache_file_path()).unwrap(), b"second");
        assert!(cache.is_cache_valid().unwrap());
    }

    #[tokio::test]
    async fn test_freshness_boundary_is_strict() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_millis(1000));
        cache.save(Some("abc")).await.unwrap();
        let saved_at = cache.cache_file_last_modified().unwrap().expect("mtime");

        let just_before = saved_at + chrono::Duration::milliseconds(999);
        let at_boundary = saved_at + chrono::Duration::milliseconds(1000);
        let after = saved_at + chrono::Duration::milliseconds(5000);

        assert!(cache.is_valid_at(just_before).unwrap());
        assert!(!cache.is_valid_at(at_boundary).unwrap());
        assert!(!cache.is_valid_at(after).unwrap());
    }

    #[tokio::test]
    async fn test_body_failure_is_reported_and_leaves_no_file() {
        let (cache, _temp_dir) = create_test_cache(HOUR);

        let result = cache.save(Some(ConsumedResponse)).await;

        assert!(matches!(result, Err(SaveError::Body(BodyError::Consumed))));
        assert!(!cache.cache_file_exists().unwrap());
    }

    #[tokio::test]
    async fn test_body_failure_keeps_previous_entry() {
        let (cache, _temp_dir) = create_test_cache(HOUR);
        cache.save(Some("kept")).await.unwrap();

        let _ = cache.save(Some(ConsumedResponse)).await;

        assert_eq!(fs::read(cache.cache_file_path()).unwrap(), b"kept");
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let not_a_dir = temp_dir.path().join("plain_file");
        fs::write(&not_a_dir, b"").unwrap();
        let cache = TtlFileCache::with_dir(&not_a_dir, HOUR, "x.json");

        let result = cache.save(Some("abc")).await;

        assert!(matches!(result, Err(SaveError::Write { .. })));
    }

    #[tokio::test]
    async fn test_save_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("cache");
        let cache = TtlFileCache::with_dir(&nested_path, HOUR, "x.json");

        cache.save(Some("abc")).await.expect("Save should succeed");

        assert!(nested_path.join("x.json").exists(), "Cache file should exist");
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_files_behind() {
        let (cache, temp_dir) = create_test_cache(HOUR);
        cache.save(Some("one")).await.unwrap();
        cache.save(Some("two")).await.unwrap();

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("x.json")]);
    }

    #[tokio::test]
    async fn test_read_flags_expired_entries() {
        let (cache, _temp_dir) = create_test_cache(HOUR);
        cache.save(Some("stale body")).await.unwrap();
        set_mtime(&cache.cache_file_path(), SystemTime::now() - 2 * HOUR);

        let cached = cache.read().unwrap().expect("Entry should exist");

        assert_eq!(cached.body, b"stale body");
        assert!(cached.is_expired);
        assert!(cache.read_if_valid().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_if_valid_returns_fresh_body() {
        let (cache, _temp_dir) = create_test_cache(HOUR);
        cache.save(Some("fresh body")).await.unwrap();

        assert_eq!(cache.read_if_valid().unwrap(), Some(b"fresh body".to_vec()));
    }

    #[tokio::test]
    async fn test_status_reports_slot_state() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_millis(1500));

        let before = cache.status().unwrap();
        assert!(!before.exists);
        assert!(!before.is_valid);
        assert!(before.last_modified.is_none());
        assert_eq!(before.revalidate_ms, 1500);

        cache.save(Some("abc")).await.unwrap();

        let after = cache.status().unwrap();
        assert!(after.exists);
        assert!(after.is_valid);
        assert!(after.last_modified.is_some());

        let json = serde_json::to_value(&after).unwrap();
        assert_eq!(json["exists"], true);
        assert_eq!(json["revalidate_ms"], 1500);
    }

    #[test]
    fn test_status_saturates_huge_revalidate_time() {
        let (cache, _temp_dir) = create_test_cache(Duration::MAX);

        assert_eq!(cache.status().unwrap().revalidate_ms, u64::MAX);
    }

    #[cfg(unix)]
    fn mode_of(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_new_cache_file_is_readable_by_others() {
        let (cache, _temp_dir) = create_test_cache(HOUR);

        cache.save(Some("abc")).await.unwrap();

        assert_eq!(mode_of(&cache.cache_file_path()), 0o644);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resave_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (cache, _temp_dir) = create_test_cache(HOUR);
        let path = cache.cache_file_path();
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        cache.save(Some("abc")).await.unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"abc");
        assert_eq!(mode_of(&path), 0o640);
    }
}
