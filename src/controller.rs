//! Controllers and `"Controller#action"` handler references.
//!
//! Controllers are registered by name together with their actions. A route
//! that names `"HomeController#index"` is resolved to a [`Handler`] when the
//! route table is built; an unknown controller or action is a startup error,
//! never a request-time one. Each dispatch constructs a fresh controller
//! value through [`Controller::new`].

use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::application::AppContext;
use crate::dispatcher::{Handler, HandlerResult};
use crate::router::{PathParams, RouterError};
use crate::server::{Request, Response};
use crate::services::ValidationErrors;

/// A controller action: a method taking the controller by `&mut self`.
pub type Action<C> = fn(&mut C, &AppContext, &Request, &mut Response, &PathParams) -> HandlerResult;

/// A group of related actions.
pub trait Controller: Sized + 'static {
    /// Build the controller for one request.
    fn new(ctx: &AppContext) -> Self;

    /// Render `view` into `res` as HTML.
    ///
    /// # Errors
    ///
    /// View lookup or rendering failures.
    fn render<S: Serialize>(&self, ctx: &AppContext, res: &mut Response, view: &str, data: S) -> HandlerResult {
        let html = ctx.view().render(view, data)?;
        res.html(html);
        Ok(())
    }

    /// Validate the request's merged input against `rules`.
    fn validate(&self, ctx: &AppContext, req: &Request, rules: &[(&str, &str)]) -> ValidationErrors {
        ctx.security().validate(&req.all(), rules)
    }
}

/// Named controllers and their actions.
#[derive(Debug, Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, HashMap<String, Handler>>,
}

impl ControllerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start registering actions for controller `C` under `name`.
    pub fn register<C: Controller>(&mut self, name: &str) -> ControllerActions<'_, C> {
        let actions = self.controllers.entry(name.to_string()).or_default();
        ControllerActions {
            controller: name.to_string(),
            actions,
            _marker: PhantomData,
        }
    }

    /// Registered controller names, sorted.
    #[must_use]
    pub fn controllers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.controllers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve `"Controller#action"` into a handler.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidHandler`] when the reference is malformed or
    /// names an unknown controller or action.
    pub fn resolve(&self, reference: &str) -> Result<Handler, RouterError> {
        let invalid = |reason: &str| RouterError::InvalidHandler {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };
        let (controller, action) = reference
            .split_once('#')
            .filter(|(c, a)| !c.is_empty() && !a.is_empty())
            .ok_or_else(|| invalid("expected Controller#action"))?;
        let actions = self
            .controllers
            .get(controller)
            .ok_or_else(|| invalid("unknown controller"))?;
        actions
            .get(action)
            .cloned()
            .ok_or_else(|| invalid("unknown action"))
    }
}

/// Builder returned by [`ControllerRegistry::register`].
pub struct ControllerActions<'r, C> {
    controller: String,
    actions: &'r mut HashMap<String, Handler>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Controller> ControllerActions<'_, C> {
    /// Bind `name` to `action`.
    pub fn action(&mut self, name: &str, action: Action<C>) -> &mut Self {
        let handler = Handler::named(
            format!("{}#{}", self.controller, name),
            move |ctx: &AppContext, req: &Request, res: &mut Response, params: &PathParams| {
                let mut controller = C::new(ctx);
                action(&mut controller, ctx, req, res, params)
            },
        );
        self.actions.insert(name.to_string(), handler);
        self
    }
}
