use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::AppError;
use crate::config::Config;
use crate::services::{Cache, Logger, Security, SessionSettings, SessionStore, View};

/// Services available to middleware and handlers.
///
/// Built once at startup and shared read-only by every request. Paths are
/// derived from the base path: `storage/logs`, `storage/cache`,
/// `storage/sessions` and `resources/views`.
#[derive(Debug)]
pub struct AppContext {
    base_path: PathBuf,
    config: Config,
    logger: Logger,
    cache: Cache,
    view: View,
    security: Security,
    sessions: SessionStore,
}

impl AppContext {
    /// Construct every service from `config`.
    ///
    /// # Errors
    ///
    /// [`AppError::Service`] if a storage directory cannot be created.
    pub fn init_services(base_path: impl Into<PathBuf>, config: Config) -> Result<Self, AppError> {
        let base_path = base_path.into();
        let storage = base_path.join("storage");

        let logger = Logger::from_config(storage.join("logs"), &config)
            .map_err(AppError::service("logger"))?;
        let cache = Cache::new(
            storage.join("cache"),
            Duration::from_secs(config.u64("cache.lifetime", 3600)),
        )
        .map_err(AppError::service("cache"))?;
        let view = View::new(
            base_path.join("resources").join("views"),
            config.bool("view.cache", true),
        );
        let sessions = SessionStore::new(storage.join("sessions"), SessionSettings::from_config(&config))
            .map_err(AppError::service("session"))?;

        info!(
            base_path = %base_path.display(),
            env = %config.str("app.env", "production"),
            debug = config.bool("app.debug", false),
            "Services initialized"
        );

        Ok(Self {
            base_path,
            config,
            logger,
            cache,
            view,
            security: Security::new(),
            sessions,
        })
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    #[must_use]
    pub fn view(&self) -> &View {
        &self.view
    }

    #[must_use]
    pub fn security(&self) -> &Security {
        &self.security
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// `app.debug`, accepting booleans and the strings `"true"`/`"1"`.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.config.bool("app.debug", false)
    }
}
