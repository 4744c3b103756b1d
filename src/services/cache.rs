//! Hashed file cache with per-entry expiry.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const EXTENSION: &str = "cache";

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    value: Value,
    /// Unix seconds; 0 never expires.
    expires: u64,
    created: u64,
}

impl Entry {
    fn is_live(&self, now: u64) -> bool {
        self.expires == 0 || now <= self.expires
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// JSON values stored one file per key under
/// `<root>/<h[0..2]>/<h[2..4]>/<h>.cache`, where `h` is the SHA-256 of the key.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
    default_ttl: Duration,
}

impl Cache {
    /// # Errors
    ///
    /// If the cache directory cannot be created.
    pub fn new(root: impl Into<PathBuf>, default_ttl: Duration) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, default_ttl })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// TTL used by [`Cache::put`].
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// File backing `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let hash = super::hex(&Sha256::digest(key.as_bytes()));
        self.root
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(format!("{hash}.{EXTENSION}"))
    }

    fn read_entry(&self, key: &str) -> io::Result<Option<Entry>> {
        let path = self.path_for(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        match serde_json::from_slice::<Entry>(&raw) {
            Ok(entry) if entry.is_live(unix_now()) => Ok(Some(entry)),
            Ok(_) => {
                debug!(key, "Cache entry expired");
                self.delete(key)?;
                Ok(None)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding corrupt cache entry");
                self.delete(key)?;
                Ok(None)
            }
        }
    }

    /// Raw JSON value for `key`, if present and unexpired.
    ///
    /// # Errors
    ///
    /// Filesystem errors other than a missing entry.
    pub fn get_value(&self, key: &str) -> io::Result<Option<Value>> {
        Ok(self.read_entry(key)?.map(|e| e.value))
    }

    /// Typed value for `key`. A stored value of another shape is a miss.
    ///
    /// # Errors
    ///
    /// Filesystem errors other than a missing entry.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> io::Result<Option<T>> {
        Ok(self
            .get_value(key)?
            .and_then(|v| serde_json::from_value(v).ok()))
    }

    /// Store `value` for `ttl`; a zero TTL never expires.
    ///
    /// # Errors
    ///
    /// Serialization or filesystem failures.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> io::Result<()> {
        let now = unix_now();
        let entry = Entry {
            value: serde_json::to_value(value)?,
            expires: if ttl.is_zero() { 0 } else { now + ttl.as_secs().max(1) },
            created: now,
        };
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension(format!("tmp-{}", ulid::Ulid::new()));
        fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        fs::rename(&tmp, &path)
    }

    /// [`Cache::set`] with the configured default TTL.
    ///
    /// # Errors
    ///
    /// Serialization or filesystem failures.
    pub fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> io::Result<()> {
        self.set(key, value, self.default_ttl)
    }

    /// # Errors
    ///
    /// Filesystem errors other than the entry not existing.
    pub fn delete(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// # Errors
    ///
    /// Filesystem errors other than a missing entry.
    pub fn has(&self, key: &str) -> io::Result<bool> {
        Ok(self.read_entry(key)?.is_some())
    }

    /// Remove every entry, keeping the cache root.
    ///
    /// # Errors
    ///
    /// If any entry cannot be removed.
    pub fn clear(&self) -> io::Result<()> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Cached value for `key`, computing and storing it on a miss.
    ///
    /// # Errors
    ///
    /// Filesystem or serialization failures; `compute` itself cannot fail.
    pub fn remember<T, F>(&self, key: &str, ttl: Duration, compute: F) -> io::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(hit) = self.get(key)? {
            return Ok(hit);
        }
        let value = compute();
        self.set(key, &value, ttl)?;
        Ok(value)
    }

    /// Delete entry files older than `max_age`, regardless of their TTL.
    ///
    /// # Errors
    ///
    /// If the cache tree cannot be walked.
    pub fn prune(&self, max_age: Duration) -> io::Result<usize> {
        let mut removed = 0;
        for first in fs::read_dir(&self.root)? {
            let first = first?.path();
            if !first.is_dir() {
                continue;
            }
            for second in fs::read_dir(&first)? {
                let second = second?.path();
                if second.is_dir() {
                    removed += super::prune_files(&second, EXTENSION, max_age)?;
                }
            }
        }
        Ok(removed)
    }
}
