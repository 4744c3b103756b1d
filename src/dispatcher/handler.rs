use std::fmt;
use std::sync::Arc;

use super::HandlerError;
use crate::application::AppContext;
use crate::router::PathParams;
use crate::server::{Request, Response};

/// Outcome of a handler or controller action.
pub type HandlerResult<T = ()> = Result<T, HandlerError>;

type HandlerFn =
    dyn Fn(&AppContext, &Request, &mut Response, &PathParams) -> HandlerResult + Send + Sync;

/// A route's request handler, bound when the route is registered.
///
/// Cheap to clone; the same handler may back several routes (see
/// `Registrar::match_methods`).
#[derive(Clone)]
pub struct Handler {
    name: Arc<str>,
    func: Arc<HandlerFn>,
}

impl Handler {
    /// Wrap a closure or function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&AppContext, &Request, &mut Response, &PathParams) -> HandlerResult
            + Send
            + Sync
            + 'static,
    {
        Self::named("closure", f)
    }

    /// Wrap a closure under a name used in logs and route listings.
    pub fn named<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&AppContext, &Request, &mut Response, &PathParams) -> HandlerResult
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(f),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the handler.
    ///
    /// # Errors
    ///
    /// Whatever the handler itself returns.
    pub fn call(
        &self,
        ctx: &AppContext,
        req: &Request,
        res: &mut Response,
        params: &PathParams,
    ) -> HandlerResult {
        (self.func)(ctx, req, res, params)
    }
}

impl<F> From<F> for Handler
where
    F: Fn(&AppContext, &Request, &mut Response, &PathParams) -> HandlerResult
        + Send
        + Sync
        + 'static,
{
    fn from(f: F) -> Self {
        Self::new(f)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.name).finish()
    }
}
