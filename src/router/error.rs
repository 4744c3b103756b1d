use std::fmt;

/// Route registration error
///
/// Raised while the route table is being built. A misconfigured table is a
/// startup failure, never a per-request one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// A verb passed to `match_methods` is not a valid HTTP method token
    InvalidMethod {
        /// The rejected verb
        method: String,
    },
    /// The template could not be compiled into a matcher
    InvalidPattern {
        /// The route template
        path: String,
        /// Regex engine diagnostic
        reason: String,
    },
    /// A `Controller#action` reference could not be resolved
    InvalidHandler {
        /// The reference as written at registration
        reference: String,
        /// Why resolution failed
        reason: String,
    },
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::InvalidMethod { method } => {
                write!(f, "Invalid HTTP method '{method}' in route registration")
            }
            RouterError::InvalidPattern { path, reason } => {
                write!(f, "Invalid route pattern '{path}': {reason}")
            }
            RouterError::InvalidHandler { reference, reason } => {
                write!(f, "Invalid route handler '{reference}': {reason}")
            }
        }
    }
}

impl std::error::Error for RouterError {}
