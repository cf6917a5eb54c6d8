//! On-disk cache of extraction results.
//!
//! Entries are keyed by a fingerprint of the source path, modification time
//! and size; the file content is never hashed, so an edit that preserves
//! both mtime and size is not detected. Each entry lives in its own
//! `<fingerprint>.json`; `manifest.json` maps fingerprints to their source
//! path and creation time.
//!
//! Caching is an optimization only: every I/O failure is logged at debug
//! level and treated as a miss (lookup) or a no-op (store).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Duration, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::ExtractionResult;

const MANIFEST_FILE: &str = "manifest.json";

/// Options for the outline cache.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Whether results are cached at all
    pub enabled: bool,

    /// Directory holding entries and the manifest
    pub cache_dir: PathBuf,

    /// Entries older than this many days are treated as absent
    pub retention_days: u32,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: PathBuf::from("cache"),
            retention_days: 30,
        }
    }
}

impl CacheOptions {
    /// Create new cache options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the retention window in days.
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }
}

/// A persisted extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub source_path: String,
    pub cached_at: DateTime<Utc>,
    pub result: ExtractionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ManifestRecord {
    source_path: String,
    cached_at: DateTime<Utc>,
}

type Manifest = BTreeMap<String, ManifestRecord>;

/// Size and count report for the cache directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries listed in the manifest
    pub entries: usize,
    /// Bytes used by all files in the cache directory
    pub total_bytes: u64,
    pub cache_dir: PathBuf,
}

impl CacheStats {
    /// Total size in megabytes.
    pub fn total_mb(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Fingerprint-keyed store of [`ExtractionResult`]s.
///
/// The in-memory manifest is shared by all workers of a batch and guarded
/// by a mutex; every manifest write goes through a temp file and a rename.
/// Separate processes sharing a directory are last-writer-wins.
#[derive(Debug)]
pub struct OutlineCache {
    dir: PathBuf,
    retention: Duration,
    manifest: Mutex<Manifest>,
}

impl OutlineCache {
    /// Open (creating if needed) the cache directory and load its manifest.
    ///
    /// A missing or unreadable manifest starts the cache empty.
    pub fn open(options: &CacheOptions) -> Result<Self> {
        fs::create_dir_all(&options.cache_dir)?;
        let manifest_path = options.cache_dir.join(MANIFEST_FILE);
        let manifest = match fs::read_to_string(&manifest_path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::debug!("Ignoring unreadable cache manifest: {}", e);
                Manifest::new()
            }),
            Err(_) => Manifest::new(),
        };

        Ok(Self {
            dir: options.cache_dir.clone(),
            retention: Duration::days(i64::from(options.retention_days)),
            manifest: Mutex::new(manifest),
        })
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fingerprint of a source file: md5 of `"{path}:{mtime}:{size}"`, or of
    /// the path alone when the file cannot be stat'ed.
    pub fn fingerprint(path: &Path) -> String {
        let identity = match fs::metadata(path) {
            Ok(meta) => {
                let mtime = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                format!("{}:{}:{}", path.display(), mtime, meta.len())
            }
            Err(_) => path.display().to_string(),
        };

        let mut hasher = Md5::new();
        hasher.update(identity.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up the cached result for `path`.
    ///
    /// Missing, corrupt, mismatched or expired entries are absent; corrupt
    /// and expired ones are deleted.
    pub fn lookup(&self, path: &Path) -> Option<ExtractionResult> {
        let key = Self::fingerprint(path);
        if !self.lock().contains_key(&key) {
            return None;
        }

        let entry = match self.read_entry(&key) {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Dropping cache entry {}: {}", key, e);
                self.remove_entry(&key);
                return None;
            }
        };

        if entry.key != key {
            log::debug!("Dropping mismatched cache entry {}", key);
            self.remove_entry(&key);
            return None;
        }
        if Utc::now() - entry.cached_at > self.retention {
            log::debug!("Dropping expired cache entry {}", key);
            self.remove_entry(&key);
            return None;
        }

        log::debug!("Cache hit for {}", path.display());
        Some(entry.result)
    }

    /// Store the result for `path`. Failures are logged and ignored.
    pub fn store(&self, path: &Path, result: &ExtractionResult) {
        let entry = CacheEntry {
            key: Self::fingerprint(path),
            source_path: path.display().to_string(),
            cached_at: Utc::now(),
            result: result.clone(),
        };
        if let Err(e) = self.write_entry(&entry) {
            log::debug!("Failed to cache {}: {}", path.display(), e);
        }
    }

    /// Remove every entry. Returns the number of entry files deleted.
    pub fn invalidate_all(&self) -> usize {
        let mut manifest = self.lock();
        let mut removed = 0;

        if let Ok(dir) = fs::read_dir(&self.dir) {
            for item in dir.flatten() {
                let path = item.path();
                if is_entry_file(&path) && fs::remove_file(&path).is_ok() {
                    removed += 1;
                }
            }
        }

        manifest.clear();
        if let Err(e) = self.save_manifest(&manifest) {
            log::debug!("Failed to write cache manifest: {}", e);
        }
        removed
    }

    /// Count entries and the bytes of their files; the manifest is excluded.
    pub fn stats(&self) -> CacheStats {
        let entries = self.lock().len();
        let total_bytes = fs::read_dir(&self.dir)
            .map(|dir| {
                dir.flatten()
                    .filter(|item| is_entry_file(&item.path()))
                    .filter_map(|item| item.metadata().ok())
                    .filter(|meta| meta.is_file())
                    .map(|meta| meta.len())
                    .sum()
            })
            .unwrap_or(0);

        CacheStats {
            entries,
            total_bytes,
            cache_dir: self.dir.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Manifest> {
        self.manifest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn read_entry(&self, key: &str) -> Result<CacheEntry> {
        let json = fs::read_to_string(self.entry_path(key))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write_entry(&self, entry: &CacheEntry) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.entry_path(&entry.key), serde_json::to_string_pretty(entry)?)?;

        let mut manifest = self.lock();
        manifest.insert(
            entry.key.clone(),
            ManifestRecord {
                source_path: entry.source_path.clone(),
                cached_at: entry.cached_at,
            },
        );
        self.save_manifest(&manifest)
    }

    fn remove_entry(&self, key: &str) {
        let _ = fs::remove_file(self.entry_path(key));
        let mut manifest = self.lock();
        if manifest.remove(key).is_some() {
            if let Err(e) = self.save_manifest(&manifest) {
                log::debug!("Failed to write cache manifest: {}", e);
            }
        }
    }

    /// Callers hold the manifest lock.
    fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        let tmp = self.dir.join(format!("{}.tmp", MANIFEST_FILE));
        fs::write(&tmp, serde_json::to_string_pretty(manifest)?)?;
        fs::rename(&tmp, self.dir.join(MANIFEST_FILE))?;
        Ok(())
    }
}

/// `<fingerprint>.json`, as opposed to the manifest or its temp file.
fn is_entry_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
        && path.file_name().is_some_and(|name| name != MANIFEST_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OutlineNode;
    use tempfile::TempDir;

    fn setup() -> (TempDir, OutlineCache, PathBuf) {
        let dir = TempDir::new().unwrap();
        let options = CacheOptions::new().with_cache_dir(dir.path().join("cache"));
        let cache = OutlineCache::open(&options).unwrap();
        let source = dir.path().join("doc.pdf");
        fs::write(&source, b"%PDF-1.7 test").unwrap();
        (dir, cache, source)
    }

    fn sample() -> ExtractionResult {
        ExtractionResult::new("Title", vec![OutlineNode::new(1, "Intro", 0)])
    }

    #[test]
    fn test_fingerprint_depends_on_size() {
        let (dir, _cache, source) = setup();
        let first = OutlineCache::fingerprint(&source);
        assert_eq!(first.len(), 32);
        assert_eq!(first, OutlineCache::fingerprint(&source));

        fs::write(&source, b"%PDF-1.7 a longer body").unwrap();
        assert_ne!(first, OutlineCache::fingerprint(&source));

        let missing = dir.path().join("missing.pdf");
        assert_eq!(
            OutlineCache::fingerprint(&missing),
            OutlineCache::fingerprint(&missing)
        );
    }

    #[test]
    fn test_store_then_lookup() {
        let (_dir, cache, source) = setup();
        assert!(cache.lookup(&source).is_none());
        cache.store(&source, &sample());
        assert_eq!(cache.lookup(&source), Some(sample()));
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_stats_count_entry_files_only() {
        let (_dir, cache, source) = setup();
        cache.store(&source, &sample());
        fs::write(cache.dir().join("manifest.json.tmp"), "leftover").unwrap();

        let entry = cache.dir().join(format!("{}.json", OutlineCache::fingerprint(&source)));
        let expected = fs::metadata(&entry).unwrap().len();
        assert_eq!(cache.stats().total_bytes, expected);
    }

    #[test]
    fn test_expired_entry_removed() {
        let (_dir, cache, source) = setup();
        let key = OutlineCache::fingerprint(&source);
        let entry = CacheEntry {
            key: key.clone(),
            source_path: source.display().to_string(),
            cached_at: Utc::now() - Duration::days(31),
            result: sample(),
        };
        cache.write_entry(&entry).unwrap();

        assert!(cache.lookup(&source).is_none());
        assert!(!cache.entry_path(&key).exists());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_entry_within_retention_kept() {
        let (_dir, cache, source) = setup();
        let entry = CacheEntry {
            key: OutlineCache::fingerprint(&source),
            source_path: source.display().to_string(),
            cached_at: Utc::now() - Duration::days(29),
            result: sample(),
        };
        cache.write_entry(&entry).unwrap();
        assert_eq!(cache.lookup(&source), Some(sample()));
    }

    #[test]
    fn test_corrupt_entry_removed() {
        let (_dir, cache, source) = setup();
        cache.store(&source, &sample());
        let key = OutlineCache::fingerprint(&source);
        fs::write(cache.entry_path(&key), "{not json").unwrap();

        assert!(cache.lookup(&source).is_none());
        assert!(!cache.entry_path(&key).exists());
    }

    #[test]
    fn test_manifest_survives_reopen() {
        let (dir, cache, source) = setup();
        cache.store(&source, &sample());
        drop(cache);

        let reopened =
            OutlineCache::open(&CacheOptions::new().with_cache_dir(dir.path().join("cache")))
                .unwrap();
        assert_eq!(reopened.lookup(&source), Some(sample()));
    }

    #[test]
    fn test_invalidate_all() {
        let (dir, cache, source) = setup();
        let other = dir.path().join("other.pdf");
        fs::write(&other, b"%PDF-1.4").unwrap();
        cache.store(&source, &sample());
        cache.store(&other, &sample());

        assert_eq!(cache.invalidate_all(), 2);
        assert!(cache.lookup(&source).is_none());
        assert_eq!(cache.stats().entries, 0);
        assert!(cache.dir().join(MANIFEST_FILE).exists());
    }
}
