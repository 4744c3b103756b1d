use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;

/// Failure raised by a middleware or handler.
///
/// Records where it was created and a backtrace so the failure boundary can
/// report its origin. Any `std::error::Error` converts into it through `?`,
/// and the conversion site becomes the reported location.
pub struct HandlerError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    location: &'static Location<'static>,
    backtrace: Backtrace,
}

impl HandlerError {
    /// Create an error from a plain message.
    #[track_caller]
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            location: Location::caller(),
            backtrace: Backtrace::force_capture(),
        }
    }

    /// Attach a higher-level message, keeping the original location.
    #[must_use]
    pub fn context(mut self, message: impl fmt::Display) -> Self {
        self.message = format!("{message}: {}", self.message);
        self
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source file the error was raised from.
    #[must_use]
    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.location.line()
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// The wrapped error, if this was created from one.
    #[must_use]
    pub fn source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[track_caller]
    fn from(err: E) -> Self {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
            location: Location::caller(),
            backtrace: Backtrace::force_capture(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("message", &self.message)
            .field("file", &self.location.file())
            .field("line", &self.location.line())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn read_config() -> Result<(), HandlerError> {
        let err = io::Error::new(io::ErrorKind::NotFound, "config.yaml missing");
        Err(err)?;
        Ok(())
    }

    #[test]
    fn test_from_error_records_conversion_site() {
        let err = read_config().unwrap_err();
        assert_eq!(err.message(), "config.yaml missing");
        assert!(err.file().ends_with("error.rs"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_context_prefixes_message() {
        let err = HandlerError::msg("disk full").context("Cache prune failed");
        assert_eq!(err.to_string(), "Cache prune failed: disk full");
        assert!(err.source().is_none());
    }
}
