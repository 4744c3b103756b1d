use std::fmt;
use std::sync::Arc;

use crate::application::AppContext;
use crate::dispatcher::HandlerError;
use crate::server::{Request, Response};

/// A step in a route's chain.
///
/// `Ok(true)` passes control to the next middleware (or the handler);
/// `Ok(false)` halts the chain, leaving whatever the middleware wrote as the
/// final response.
pub trait Middleware: Send + Sync {
    fn handle(
        &self,
        ctx: &AppContext,
        req: &Request,
        res: &mut Response,
    ) -> Result<bool, HandlerError>;

    /// Name used in logs and route listings.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Shared middleware instance as stored on routes.
pub type MiddlewareRef = Arc<dyn Middleware>;

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

type MiddlewareFn =
    dyn Fn(&AppContext, &Request, &mut Response) -> Result<bool, HandlerError> + Send + Sync;

/// Middleware backed by a closure.
pub struct FnMiddleware {
    name: String,
    func: Box<MiddlewareFn>,
}

impl FnMiddleware {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&AppContext, &Request, &mut Response) -> Result<bool, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(f),
        }
    }
}

impl Middleware for FnMiddleware {
    fn handle(
        &self,
        ctx: &AppContext,
        req: &Request,
        res: &mut Response,
    ) -> Result<bool, HandlerError> {
        (self.func)(ctx, req, res)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FnMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnMiddleware").field(&self.name).finish()
    }
}

/// Wrap a closure as a shareable middleware.
pub fn from_fn<F>(name: impl Into<String>, f: F) -> MiddlewareRef
where
    F: Fn(&AppContext, &Request, &mut Response) -> Result<bool, HandlerError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnMiddleware::new(name, f))
}

/// How a chain run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Every middleware continued.
    Completed,
    /// The middleware at `index` halted; later ones did not run.
    Halted { index: usize, name: String },
}

/// Run `chain` in order, stopping at the first halt.
///
/// An empty chain completes immediately.
///
/// # Errors
///
/// The first error raised by a middleware; later middleware do not run.
pub fn run_chain(
    chain: &[MiddlewareRef],
    ctx: &AppContext,
    req: &Request,
    res: &mut Response,
) -> Result<ChainOutcome, HandlerError> {
    for (index, middleware) in chain.iter().enumerate() {
        if !middleware.handle(ctx, req, res)? {
            return Ok(ChainOutcome::Halted {
                index,
                name: middleware.name().to_string(),
            });
        }
    }
    Ok(ChainOutcome::Completed)
}
