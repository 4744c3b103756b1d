use serde_json::json;

use super::Middleware;
use crate::application::AppContext;
use crate::dispatcher::HandlerError;
use crate::server::{Request, Response};

/// Session key holding the authenticated user's id.
pub const USER_ID_KEY: &str = "user_id";

/// Rejects requests without an authenticated session.
///
/// A request passes when its session carries `user_id`, or when a static
/// bearer token is configured and the `Authorization` header presents it.
#[derive(Debug, Default)]
pub struct AuthMiddleware {
    token: Option<String>,
}

impl AuthMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also accept `Authorization: Bearer <token>`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    fn bearer_matches(&self, req: &Request) -> bool {
        let Some(expected) = self.token.as_deref() else {
            return false;
        };
        req.header("authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .is_some_and(|presented| presented.trim() == expected)
    }
}

impl Middleware for AuthMiddleware {
    fn handle(
        &self,
        _ctx: &AppContext,
        req: &Request,
        res: &mut Response,
    ) -> Result<bool, HandlerError> {
        if req.session().has(USER_ID_KEY) || self.bearer_matches(req) {
            return Ok(true);
        }
        res.set_status(401).json(&json!({ "error": "Unauthorized" }));
        Ok(false)
    }
}
