//! Collaborator services shared through the application context.

mod cache;
mod logger;
mod security;
mod session;
mod view;

pub use cache::Cache;
pub use logger::{LogLevel, Logger};
pub use security::{Security, ValidationErrors, CSRF_SESSION_KEY};
pub use session::{Session, SessionSettings, SessionStore};
pub use view::{View, ViewError};

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Lowercase hex encoding.
pub(crate) fn hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(char::from(DIGITS[usize::from(b >> 4)]));
        out.push(char::from(DIGITS[usize::from(b & 0x0f)]));
    }
    out
}

/// Escape `& < > " '` for HTML text and attribute values.
pub(crate) fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Remove files in `dir` with `extension` last modified more than `max_age` ago.
pub(crate) fn prune_files(dir: &Path, extension: &str, max_age: Duration) -> io::Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) || !path.is_file() {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        if modified <= cutoff {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}
