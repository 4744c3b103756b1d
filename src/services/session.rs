//! File-backed sessions.
//!
//! A [`Session`] is loaded from the session cookie before dispatch and
//! persisted by the [`SessionStore`] afterwards. Data lives in
//! `<dir>/<id>.json`; ids are 32 lowercase hex characters and any other
//! cookie value is treated as absent.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::config::Config;
use crate::server::Cookie;

const FLASH_KEY: &str = "_flash";
const ID_LEN: usize = 32;

fn new_id() -> String {
    let mut bytes = [0u8; ID_LEN / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    super::hex(&bytes)
}

fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Per-client key/value state.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: String,
    data: Map<String, Value>,
    is_new: bool,
    dirty: bool,
    destroyed: bool,
    /// Id replaced by `regenerate`, with whether its file should be removed.
    replaced: Option<(String, bool)>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh, empty session with a random id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: new_id(),
            data: Map::new(),
            is_new: true,
            dirty: false,
            destroyed: false,
            replaced: None,
        }
    }

    fn restore(id: String, data: Map<String, Value>) -> Self {
        Self {
            id,
            data,
            is_new: false,
            dirty: false,
            destroyed: false,
            replaced: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// String value of `key`, if it is one.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(key.to_string(), value.into());
        self.dirty = true;
    }

    /// Present and not null.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.data.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    #[must_use]
    pub fn all(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Clear all data and delete the stored session on save.
    pub fn destroy(&mut self) {
        self.data.clear();
        self.destroyed = true;
        self.dirty = true;
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Move the data to a new id, optionally deleting the old stored copy.
    pub fn regenerate(&mut self, delete_old: bool) {
        let old = std::mem::replace(&mut self.id, new_id());
        if !self.is_new {
            self.replaced = Some((old, delete_old));
        }
        self.is_new = true;
        self.dirty = true;
    }

    /// Store a value readable once through [`Session::take_flash`].
    pub fn flash(&mut self, key: &str, value: impl Into<Value>) {
        let flashes = self
            .data
            .entry(FLASH_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !flashes.is_object() {
            *flashes = Value::Object(Map::new());
        }
        if let Value::Object(map) = flashes {
            map.insert(key.to_string(), value.into());
        }
        self.dirty = true;
    }

    /// Read and remove a flashed value.
    pub fn take_flash(&mut self, key: &str) -> Option<Value> {
        let taken = self
            .data
            .get_mut(FLASH_KEY)
            .and_then(Value::as_object_mut)
            .and_then(|m| m.remove(key));
        if taken.is_some() {
            self.dirty = true;
        }
        taken
    }
}

/// Session persistence settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub lifetime: Duration,
    pub secure: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "minimvc_session".to_string(),
            lifetime: Duration::from_secs(7200),
            secure: false,
        }
    }
}

impl SessionSettings {
    /// Read the `session.*` section, defaulting missing keys.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            cookie_name: config.str("session.cookie", &defaults.cookie_name),
            lifetime: Duration::from_secs(
                config.u64("session.lifetime", defaults.lifetime.as_secs()),
            ),
            secure: config.bool("session.secure", defaults.secure),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    data: Map<String, Value>,
    updated: u64,
}

/// Loads and saves sessions under a directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
    settings: SessionSettings,
}

impl SessionStore {
    /// # Errors
    ///
    /// If the session directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>, settings: SessionSettings) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, settings })
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.settings.cookie_name
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Load the session named by the cookie, or start a new one.
    ///
    /// Unknown, malformed and expired ids all yield a fresh session.
    #[must_use]
    pub fn load(&self, id: Option<&str>) -> Session {
        let Some(id) = id.filter(|id| is_valid_id(id)) else {
            return Session::new();
        };
        let raw = match fs::read(self.path_for(id)) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(error = %e, "Failed to read session");
                }
                return Session::new();
            }
        };
        match serde_json::from_slice::<StoredSession>(&raw) {
            Ok(stored) if stored.updated + self.settings.lifetime.as_secs() >= unix_now() => {
                Session::restore(id.to_string(), stored.data)
            }
            Ok(_) => {
                debug!("Session expired");
                Session::new()
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session");
                Session::new()
            }
        }
    }

    /// Persist changes.
    ///
    /// Destroyed sessions are deleted; new sessions with no data are not
    /// written at all.
    ///
    /// # Errors
    ///
    /// Any filesystem error while writing or removing session files.
    pub fn save(&self, session: &Session) -> io::Result<()> {
        if let Some((old, true)) = &session.replaced {
            remove_if_exists(&self.path_for(old))?;
        }
        if session.destroyed {
            return remove_if_exists(&self.path_for(&session.id));
        }
        if session.is_new && session.data.is_empty() {
            return Ok(());
        }
        let stored = StoredSession {
            data: session.data.clone(),
            updated: unix_now(),
        };
        let path = self.path_for(&session.id);
        let tmp = path.with_extension(format!("tmp-{}", ulid::Ulid::new()));
        fs::write(&tmp, serde_json::to_vec(&stored)?)?;
        fs::rename(&tmp, &path)
    }

    /// The `Set-Cookie` the client needs after `session` was used, if any.
    #[must_use]
    pub fn cookie_for(&self, session: &Session) -> Option<Cookie> {
        if session.destroyed {
            return Some(Cookie::expired(self.cookie_name()));
        }
        if !session.is_new || session.data.is_empty() {
            return None;
        }
        let mut cookie = Cookie::new(self.cookie_name(), session.id());
        cookie.secure = self.settings.secure;
        cookie.max_age = Some(self.settings.lifetime.as_secs());
        Some(cookie)
    }

    /// Delete session files untouched for longer than the lifetime.
    ///
    /// # Errors
    ///
    /// If the session directory cannot be listed.
    pub fn gc(&self) -> io::Result<usize> {
        super::prune_files(&self.dir, "json", self.settings.lifetime)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions"), SessionSettings::default()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_new_session_id_format() {
        let s = Session::new();
        assert!(is_valid_id(s.id()));
        assert!(s.is_new());
        assert_ne!(Session::new().id(), s.id());
    }

    #[test]
    fn test_round_trip_through_store() {
        let (_dir, store) = store();
        let mut s = store.load(None);
        s.set("user_id", 7);
        store.save(&s).unwrap();
        assert!(store.cookie_for(&s).is_some());

        let loaded = store.load(Some(s.id()));
        assert!(!loaded.is_new());
        assert_eq!(loaded.get("user_id"), Some(&json!(7)));
        assert!(store.cookie_for(&loaded).is_none());
    }

    #[test]
    fn test_invalid_ids_start_fresh() {
        let (_dir, store) = store();
        assert!(store.load(Some("../../etc/passwd")).is_new());
        assert!(store.load(Some("ABCDEF")).is_new());
        assert!(store.load(Some(&"a".repeat(32))).is_new());
    }

    #[test]
    fn test_empty_new_session_not_written() {
        let (_dir, store) = store();
        let s = store.load(None);
        store.save(&s).unwrap();
        assert!(!store.path_for(s.id()).exists());
        assert!(store.cookie_for(&s).is_none());
    }

    #[test]
    fn test_flash_is_read_once() {
        let mut s = Session::new();
        s.flash("status", "saved");
        assert_eq!(s.take_flash("status"), Some(json!("saved")));
        assert_eq!(s.take_flash("status"), None);
    }

    #[test]
    fn test_destroy_removes_file() {
        let (_dir, store) = store();
        let mut s = Session::new();
        s.set("k", "v");
        store.save(&s).unwrap();
        let mut loaded = store.load(Some(s.id()));
        loaded.destroy();
        store.save(&loaded).unwrap();
        assert!(!store.path_for(s.id()).exists());
        let cookie = store.cookie_for(&loaded).unwrap();
        assert_eq!(cookie.max_age, Some(0));
    }

    #[test]
    fn test_regenerate_moves_data() {
        let (_dir, store) = store();
        let mut s = Session::new();
        s.set("k", "v");
        store.save(&s).unwrap();

        let mut loaded = store.load(Some(s.id()));
        loaded.regenerate(true);
        store.save(&loaded).unwrap();

        assert_ne!(loaded.id(), s.id());
        assert!(!store.path_for(s.id()).exists());
        assert_eq!(store.load(Some(loaded.id())).get_str("k"), Some("v"));
        assert!(store.cookie_for(&loaded).is_some());
    }

    #[test]
    fn test_gc_removes_expired_unvisited_sessions() {
        let (_dir, store) = store();
        let mut stale = Session::new();
        stale.set("k", "old");
        store.save(&stale).unwrap();
        let mut fresh = Session::new();
        fresh.set("k", "new");
        store.save(&fresh).unwrap();

        let expired = std::time::SystemTime::now() - Duration::from_secs(7201);
        fs::File::options()
            .write(true)
            .open(store.path_for(stale.id()))
            .unwrap()
            .set_modified(expired)
            .unwrap();

        assert_eq!(store.gc().unwrap(), 1);
        assert!(!store.path_for(stale.id()).exists());
        assert!(store.path_for(fresh.id()).exists());
    }
}
