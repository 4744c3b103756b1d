use std::fmt;
use std::io;

/// Errors raised outside the per-request failure boundary.
#[derive(Debug)]
pub enum AppError {
    /// `run` was called before a router was installed.
    RouterNotInitialized,
    /// A service could not be initialized.
    Service {
        service: &'static str,
        source: io::Error,
    },
}

impl AppError {
    pub(crate) fn service(service: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Service { service, source }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RouterNotInitialized => f.write_str("Router not initialized"),
            Self::Service { service, source } => {
                write!(f, "failed to initialize {service} service: {source}")
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RouterNotInitialized => None,
            Self::Service { source, .. } => Some(source),
        }
    }
}
