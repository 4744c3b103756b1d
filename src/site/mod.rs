//! Demo site: pages, a rate-limited JSON API, a CSRF-protected contact
//! form, a session-guarded admin area and token-protected maintenance jobs.

mod cron;
mod home;

use minimvc::controller::ControllerRegistry;
use minimvc::middleware::{AuthMiddleware, CsrfMiddleware, MiddlewareRef, RateLimitMiddleware};
use minimvc::router::{Registrar, Router, RouterError};
use std::sync::Arc;

pub use cron::CronController;
pub use home::HomeController;

/// Every controller the route table may reference.
pub fn controllers() -> ControllerRegistry {
    let mut registry = ControllerRegistry::new();
    registry
        .register::<HomeController>("HomeController")
        .action("index", HomeController::index)
        .action("about", HomeController::about)
        .action("dashboard", HomeController::dashboard)
        .action("users", HomeController::users)
        .action("user", HomeController::user)
        .action("contact", HomeController::contact)
        .action("submitContact", HomeController::submit_contact)
        .action("loginForm", HomeController::login_form)
        .action("login", HomeController::login)
        .action("logout", HomeController::logout)
        .action("getData", HomeController::get_data)
        .action("submitData", HomeController::submit_data);
    registry
        .register::<CronController>("CronController")
        .action("runJob", CronController::run_job)
        .action("cleanup", CronController::run_cleanup);
    registry
}

/// The site's route table.
///
/// # Errors
///
/// An unknown `Controller#action` reference or an invalid template.
pub fn routes() -> Result<Router, RouterError> {
    let c = controllers();
    let auth: MiddlewareRef = Arc::new(AuthMiddleware::new());
    let csrf: MiddlewareRef = Arc::new(CsrfMiddleware::new());
    let rate_limit: MiddlewareRef = Arc::new(RateLimitMiddleware::default());

    let mut router = Router::new();
    router.get("/", c.resolve("HomeController#index")?, &[])?;
    router.get("/about", c.resolve("HomeController#about")?, &[])?;

    router.group("/admin", &[Arc::clone(&auth)], |admin| {
        admin.get("/dashboard", c.resolve("HomeController#dashboard")?, &[])?;
        admin.get("/users", c.resolve("HomeController#users")?, &[])?;
        admin.get("/users/{id}", c.resolve("HomeController#user")?, &[])
    })?;

    router.group("/form", &[Arc::clone(&csrf)], |form| {
        form.get("/contact", c.resolve("HomeController#contact")?, &[])?;
        form.post("/contact", c.resolve("HomeController#submitContact")?, &[])
    })?;

    router.group("/auth", &[Arc::clone(&rate_limit), Arc::clone(&csrf)], |session| {
        session.get("/login", c.resolve("HomeController#loginForm")?, &[])?;
        session.post("/login", c.resolve("HomeController#login")?, &[])?;
        session.post("/logout", c.resolve("HomeController#logout")?, &[])
    })?;

    router.group("/api", &[Arc::clone(&rate_limit)], |api| {
        api.get("/data", c.resolve("HomeController#getData")?, &[])?;
        api.post("/submit", c.resolve("HomeController#submitData")?, &[])
    })?;

    router.group("/cron", &[], |cron| {
        cron.post("/run-job", c.resolve("CronController#runJob")?, &[])?;
        cron.post("/cleanup", c.resolve("CronController#cleanup")?, &[])
    })?;

    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_site_routes_resolve() {
        let router = routes().unwrap();
        let m = router.route(&Method::GET, "/admin/users/7").unwrap();
        assert_eq!(m.route.handler().name(), "HomeController#user");
        assert_eq!(m.route.middleware_names(), vec!["AuthMiddleware"]);
        assert_eq!(m.params.get("id"), Some("7"));

        let login = router.route(&Method::POST, "/auth/login").unwrap();
        assert_eq!(
            login.route.middleware_names(),
            vec!["RateLimitMiddleware", "CsrfMiddleware"]
        );
        assert!(router.route(&Method::GET, "/cron/run-job").is_none());
    }
}
