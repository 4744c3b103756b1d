use http::Method;
use serde_json::json;
use tracing::warn;

use super::Middleware;
use crate::application::AppContext;
use crate::dispatcher::HandlerError;
use crate::server::{Request, Response};

/// Form field carrying the token.
pub const TOKEN_FIELD: &str = "_token";
/// Header carrying the token for scripted requests.
pub const TOKEN_HEADER: &str = "x-csrf-token";

/// Verifies the session CSRF token on state-changing requests.
///
/// `GET`, `HEAD` and `OPTIONS` pass untouched. Everything else must present
/// the token in the `_token` field or the `X-CSRF-Token` header, otherwise the
/// request ends with 419.
#[derive(Debug, Default)]
pub struct CsrfMiddleware;

impl CsrfMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn is_exempt(method: &Method) -> bool {
        matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
    }
}

impl Middleware for CsrfMiddleware {
    fn handle(
        &self,
        ctx: &AppContext,
        req: &Request,
        res: &mut Response,
    ) -> Result<bool, HandlerError> {
        if Self::is_exempt(req.method()) {
            return Ok(true);
        }

        let token = req
            .input(TOKEN_FIELD)
            .filter(|t| !t.is_empty())
            .or_else(|| req.header(TOKEN_HEADER))
            .unwrap_or_default();

        if ctx.security().verify_csrf_token(token, &req.session()) {
            return Ok(true);
        }

        warn!(method = %req.method(), path = %req.path(), "CSRF token mismatch");
        res.set_status(419)
            .json(&json!({ "error": "CSRF token mismatch" }));
        Ok(false)
    }
}
