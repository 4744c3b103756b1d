//! Per-request dispatch: route lookup, middleware chain, handler.

use std::time::Instant;
use tracing::{debug, info};

use super::HandlerError;
use crate::application::AppContext;
use crate::middleware::{run_chain, ChainOutcome};
use crate::router::Router;
use crate::server::{Request, Response};

/// Template rendered for requests that match no route.
pub const NOT_FOUND_VIEW: &str = "errors/404";

/// How a dispatch ended when no failure escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The route's handler ran.
    Handled { route: usize },
    /// A middleware stopped the chain; its response stands.
    Halted { route: usize, middleware: String },
    /// No route matched; the 404 page was written.
    NotFound,
}

/// Drives a single request through the matched route.
///
/// Holds the frozen route table; failures are returned to the caller, which
/// owns the failure boundary.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    router: Router,
}

impl Dispatcher {
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Resolve and run the request.
    ///
    /// Middleware runs in the route's stored order; the handler only runs if
    /// every middleware continued.
    ///
    /// # Errors
    ///
    /// Any error raised by a middleware, the handler, or the 404 view.
    pub fn dispatch(
        &self,
        ctx: &AppContext,
        req: &Request,
        res: &mut Response,
    ) -> Result<DispatchOutcome, HandlerError> {
        let Some(matched) = self.router.route(req.method(), req.path()) else {
            return Self::not_found(ctx, req, res);
        };
        let route = matched.route;

        debug!(
            route_index = matched.index,
            middleware = ?route.middleware_names(),
            "Running middleware chain"
        );
        if let ChainOutcome::Halted { index, name } = run_chain(route.middleware(), ctx, req, res)? {
            info!(
                route_pattern = %route.path(),
                middleware = %name,
                middleware_index = index,
                status = res.status(),
                "Middleware halted request"
            );
            return Ok(DispatchOutcome::Halted {
                route: matched.index,
                middleware: name,
            });
        }

        let start = Instant::now();
        route.handler().call(ctx, req, res, &matched.params)?;
        info!(
            handler_name = %route.handler().name(),
            status = res.status(),
            execution_time_us = start.elapsed().as_micros(),
            "Handler execution complete"
        );
        Ok(DispatchOutcome::Handled {
            route: matched.index,
        })
    }

    fn not_found(
        ctx: &AppContext,
        req: &Request,
        res: &mut Response,
    ) -> Result<DispatchOutcome, HandlerError> {
        let body = ctx.view().render(
            NOT_FOUND_VIEW,
            serde_json::json!({
                "method": req.method().as_str(),
                "path": req.path(),
            }),
        )?;
        res.set_status(404).html(body);
        Ok(DispatchOutcome::NotFound)
    }
}
