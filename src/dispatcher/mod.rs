//! # Dispatcher Module
//!
//! Runs one request through the application: the router picks the first
//! matching route, the route's middleware chain runs in order, and the bound
//! handler writes the response.
//!
//! ## Handlers
//!
//! A [`Handler`] is bound when the route is registered, either from a
//! closure or from a `"Controller#action"` reference resolved by
//! [`crate::controller::ControllerRegistry`]. A handler that names no known
//! controller never reaches the table.
//!
//! ```rust,ignore
//! router.get("/users/{id}", Handler::new(|_ctx, _req, res, params| {
//!     res.json(&serde_json::json!({ "id": params.get("id") }));
//!     Ok(())
//! }), &[])?;
//! ```
//!
//! ## Error Handling
//!
//! Handlers and middleware return [`HandlerResult`]. Any error type converts
//! into [`HandlerError`] through `?`, recording the call site. The dispatcher
//! does not catch anything itself; the application's failure boundary turns
//! errors and panics into a 500 response.

mod core;
mod error;
mod handler;

pub use core::{DispatchOutcome, Dispatcher, NOT_FOUND_VIEW};
pub use error::HandlerError;
pub use handler::{Handler, HandlerResult};
