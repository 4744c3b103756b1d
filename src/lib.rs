//! # minimvc
//!
//! **minimvc** is a small MVC web framework running on the `may` coroutine
//! runtime. Applications register routes with `{name}` placeholders, group
//! them under shared prefixes and middleware, bind them to closures or
//! `"Controller#action"` references, and serve them through `may_minihttp`.
//!
//! ## Architecture
//!
//! - **[`router`]** - Ordered route table, route groups and path matching
//! - **[`middleware`]** - Middleware trait, chain executor and the built-in
//!   CSRF, rate limit and session auth filters
//! - **[`dispatcher`]** - Route lookup, chain execution, handler invocation
//!   and the 404 view
//! - **[`controller`]** - Controllers and `Controller#action` resolution
//! - **[`application`]** - Service context, per-request entry point and the
//!   failure boundary that turns errors and panics into a logged 500
//! - **[`services`]** - Logger, cache, views, security helpers and sessions
//! - **[`server`]** - Request/response types and the HTTP service
//! - **[`config`]** - Dot-path configuration from defaults, files and env
//! - **[`telemetry`]** / **[`runtime_config`]** - Process-level setup
//! - **[`cli`]** - `serve` and `routes` commands
//!
//! ## Request Flow
//!
//! ```text
//! AppService::call
//!   -> static asset? serve from public/
//!   -> Application::run
//!        load session, assign request id
//!        guard {
//!          Dispatcher::dispatch
//!            Router::route (first match wins) -> 404 view when none
//!            run_chain (stop at first middleware returning false)
//!            handler(ctx, req, res, params)
//!        }  -> on error or panic: log once, 500 JSON
//!        save session, Set-Cookie, X-Request-Id
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use minimvc::prelude::*;
//!
//! let mut router = Router::new();
//! router.get("/", Handler::new(|_ctx, _req, res, _params| {
//!     res.html("<h1>Hello</h1>");
//!     Ok(())
//! }), &[])?;
//!
//! let mut app = Application::bootstrap("./site", Config::defaults())?;
//! app.set_router(router);
//! let handle = HttpServer(AppService::new(Arc::new(app), None)).start("127.0.0.1:8080")?;
//! handle.join().ok();
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod ids;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod services;
pub mod telemetry;

/// Commonly used types for building a site.
pub mod prelude {
    pub use crate::application::{AppContext, Application};
    pub use crate::config::Config;
    pub use crate::controller::{Controller, ControllerRegistry};
    pub use crate::dispatcher::{Handler, HandlerError, HandlerResult};
    pub use crate::middleware::{from_fn, Middleware, MiddlewareRef};
    pub use crate::router::{PathParams, Registrar, Router, RouterError};
    pub use crate::server::{AppService, HttpServer, Request, Response};
    pub use std::sync::Arc;
}
