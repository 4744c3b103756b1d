//! Middleware chain executor and the built-in request filters.
//!
//! Each route stores its chain as `Arc<[MiddlewareRef]>` with group
//! middleware first. [`run_chain`] walks it in order and stops at the first
//! middleware that returns `Ok(false)`.

mod auth;
mod core;
mod csrf;
mod rate_limit;

pub use auth::{AuthMiddleware, USER_ID_KEY};
pub use core::{from_fn, run_chain, ChainOutcome, FnMiddleware, Middleware, MiddlewareRef};
pub use csrf::{CsrfMiddleware, TOKEN_FIELD, TOKEN_HEADER};
pub use rate_limit::{RateLimit, RateLimitMiddleware};
