use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

use super::failure::{self, Failure};
use super::{AppContext, AppError};
use crate::config::Config;
use crate::dispatcher::{Dispatcher, HandlerError};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::router::Router;
use crate::server::{Request, Response, MAX_RESPONSE_HEADERS};

/// The application: shared services plus the frozen route table.
///
/// Wiring happens in three steps: build the context, install the router,
/// then call [`Application::run`] once per request.
#[derive(Debug)]
pub struct Application {
    context: Arc<AppContext>,
    dispatcher: Option<Dispatcher>,
}

impl Application {
    #[must_use]
    pub fn new(context: AppContext) -> Self {
        failure::install_panic_hook();
        Self {
            context: Arc::new(context),
            dispatcher: None,
        }
    }

    /// Initialize services under `base_path` and wrap them.
    ///
    /// # Errors
    ///
    /// See [`AppContext::init_services`].
    pub fn bootstrap(base_path: impl Into<PathBuf>, config: Config) -> Result<Self, AppError> {
        Ok(Self::new(AppContext::init_services(base_path, config)?))
    }

    #[must_use]
    pub fn context(&self) -> &Arc<AppContext> {
        &self.context
    }

    /// Install the route table. Replaces any previous one.
    pub fn set_router(&mut self, router: Router) {
        info!(routes = router.len(), "Router installed");
        self.dispatcher = Some(Dispatcher::new(router));
    }

    #[must_use]
    pub fn router(&self) -> Option<&Router> {
        self.dispatcher.as_ref().map(Dispatcher::router)
    }

    /// Handle one request end to end.
    ///
    /// The session is loaded before dispatch and saved afterwards. Any
    /// failure inside dispatch, error or panic, is logged once and answered
    /// with a 500; it never escapes this call. So is a response with more
    /// headers than the server can write.
    ///
    /// # Errors
    ///
    /// [`AppError::RouterNotInitialized`] if no router was installed.
    pub fn run(&self, mut request: Request) -> Result<Response, AppError> {
        let dispatcher = self
            .dispatcher
            .as_ref()
            .ok_or(AppError::RouterNotInitialized)?;
        let ctx = &*self.context;

        let request_id = RequestId::from_header_or_new(request.header(REQUEST_ID_HEADER));
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %request.method(),
            path = %request.path()
        );
        let _entered = span.enter();
        let start = Instant::now();

        let session_id = request
            .cookie(ctx.sessions().cookie_name())
            .map(str::to_string);
        request.set_session(ctx.sessions().load(session_id.as_deref()));

        let mut response = Response::new();
        match failure::guard(|| dispatcher.dispatch(ctx, &request, &mut response)) {
            Ok(outcome) => debug!(?outcome, "Dispatch finished"),
            Err(failure) => self.handle_failure(&failure, &mut response),
        }

        let session = request.take_session();
        if let Err(e) = ctx.sessions().save(&session) {
            warn!(error = %e, "Failed to persist session");
        } else if let Some(cookie) = ctx.sessions().cookie_for(&session) {
            response.with_cookie(&cookie);
        }
        response.set_header(REQUEST_ID_HEADER, request_id.to_string());

        if !response.fits_header_capacity() {
            let failure = Failure::from(HandlerError::msg(format!(
                "Response carries {} headers; at most {} fit",
                response.headers().len(),
                MAX_RESPONSE_HEADERS
            )));
            response = Response::new();
            self.handle_failure(&failure, &mut response);
            response.set_header(REQUEST_ID_HEADER, request_id.to_string());
        }

        info!(
            status = response.status(),
            duration_us = start.elapsed().as_micros(),
            "Request complete"
        );
        Ok(response)
    }

    fn handle_failure(&self, failure: &Failure, response: &mut Response) {
        let ctx = &self.context;
        ctx.logger().error(
            &format!("Application Error: {}", failure.message),
            json!({
                "file": failure.file,
                "line": failure.line,
                "trace": failure.trace,
            }),
        );

        response.discard_body();
        response.set_status(500);
        if ctx.debug() {
            response.json(&json!({
                "error": failure.message,
                "file": failure.file,
                "line": failure.line,
            }));
        } else {
            response.json(&json!({ "error": "Internal Server Error" }));
        }
    }
}
