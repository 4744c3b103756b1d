//! # Router Module
//!
//! Route registration and path matching.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Holding the ordered route table (first match wins)
//! - Expanding route groups (prefix + middleware) at registration time
//! - Compiling `{name}` path templates into anchored matchers
//! - Extracting path parameters in declaration order
//!
//! ## Architecture
//!
//! Matching happens in two phases:
//!
//! 1. **Compilation**: when a route is registered its full template
//!    (e.g. `/admin/users/{id}`) is converted into a regex such as
//!    `^/admin/users/([^/]+)$` together with the ordered placeholder names.
//!
//! 2. **Matching**: for each request the table is scanned in registration
//!    order; the first route with an equal method and a matching path wins.
//!
//! ## Example
//!
//! ```rust,ignore
//! use minimvc::router::{Registrar, Router};
//!
//! let mut router = Router::new();
//! router.get("/users/{id}", show_user, &[])?;
//! router.group("/admin", &[auth.clone()], |admin| {
//!     admin.get("/dashboard", dashboard, &[])
//! })?;
//!
//! let matched = router.route(&http::Method::GET, "/users/42").unwrap();
//! assert_eq!(matched.params.get("id"), Some("42"));
//! ```

mod core;
mod error;
mod matcher;
#[cfg(test)]
mod tests;

pub use core::{RegistrationContext, Registrar, Route, RouteGroup, RouteMatch, Router};
pub use error::RouterError;
pub use matcher::{ParamVec, PathMatcher, PathParams, MAX_INLINE_PARAMS};
