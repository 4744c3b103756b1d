//! # Runtime Configuration
//!
//! Coroutine runtime settings read from the environment at startup.
//!
//! ### `MINIMVC_STACK_SIZE`
//!
//! Stack size for request coroutines, decimal (`32768`) or hexadecimal
//! (`0x8000`). Default: `0x8000` (32 KB). Template rendering and file I/O
//! need more headroom than a bare handler, so the default is larger than
//! `may`'s own.
//!
//! ### `MINIMVC_WORKERS`
//!
//! Number of worker threads scheduling coroutines. Default: the number of
//! available CPUs.
//!
//! ```bash
//! MINIMVC_STACK_SIZE=0x10000 MINIMVC_WORKERS=4 minimvc serve
//! ```

use std::env;

const DEFAULT_STACK_SIZE: usize = 0x8000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
    /// Scheduler worker threads
    pub workers: usize,
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        Self {
            stack_size: lookup("MINIMVC_STACK_SIZE")
                .and_then(|v| parse_size(&v))
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_STACK_SIZE),
            workers: lookup("MINIMVC_WORKERS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|w| *w > 0)
                .unwrap_or_else(default_workers),
        }
    }

    /// Apply to the global `may` scheduler. Must run before the server starts.
    pub fn apply(&self) {
        may::config()
            .set_stack_size(self.stack_size)
            .set_workers(self.workers);
        tracing::info!(
            stack_size = self.stack_size,
            workers = self.workers,
            "Coroutine runtime configured"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("0x4000"), Some(0x4000));
        assert_eq!(parse_size("16384"), Some(16384));
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn test_from_lookup() {
        let config = RuntimeConfig::from_lookup(|var| match var {
            "MINIMVC_STACK_SIZE" => Some("0x10000".to_string()),
            "MINIMVC_WORKERS" => Some("3".to_string()),
            _ => None,
        });
        assert_eq!(config, RuntimeConfig { stack_size: 0x10000, workers: 3 });

        let fallback = RuntimeConfig::from_lookup(|_| Some("0".to_string()));
        assert_eq!(fallback.stack_size, DEFAULT_STACK_SIZE);
        assert!(fallback.workers >= 1);
    }
}
