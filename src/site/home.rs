use minimvc::application::AppContext;
use minimvc::controller::Controller;
use minimvc::dispatcher::HandlerResult;
use minimvc::middleware::USER_ID_KEY;
use minimvc::router::PathParams;
use minimvc::server::{Request, Response};
use serde_json::{json, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const API_DATA_KEY: &str = "api_data";

const CONTACT_RULES: &[(&str, &str)] = &[
    ("name", "required|max:100"),
    ("email", "required|email"),
    ("message", "required|min:10|max:2000"),
];

pub struct HomeController {
    app_name: String,
    api_ttl: Duration,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

impl Controller for HomeController {
    fn new(ctx: &AppContext) -> Self {
        Self {
            app_name: ctx.config().str("app.name", "Mini Framework"),
            api_ttl: Duration::from_secs(300),
        }
    }
}

impl HomeController {
    pub fn index(&mut self, ctx: &AppContext, _: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        self.render(
            ctx,
            res,
            "home/index",
            json!({
                "title": format!("Welcome to {}", self.app_name),
                "message": "Hello from MVC Framework!",
            }),
        )
    }

    pub fn about(&mut self, ctx: &AppContext, _: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        self.render(ctx, res, "home/about", json!({ "title": "About" }))
    }

    pub fn dashboard(&mut self, ctx: &AppContext, req: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        let user = req.session().get(USER_ID_KEY).cloned().unwrap_or(Value::Null);
        let token = ctx.security().csrf_token(&mut req.session_mut());
        self.render(
            ctx,
            res,
            "admin/dashboard",
            json!({ "title": "Dashboard", "user": user, "csrf_token": token }),
        )
    }

    pub fn users(&mut self, _: &AppContext, _: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        res.json(&json!({
            "users": [
                { "id": 1, "name": "admin" },
                { "id": 2, "name": "editor" },
            ]
        }));
        Ok(())
    }

    pub fn user(&mut self, _: &AppContext, _: &Request, res: &mut Response, params: &PathParams) -> HandlerResult {
        let id: u64 = match params.get("id").map(str::parse::<u64>) {
            Some(Ok(id)) => id,
            _ => {
                res.set_status(404).json(&json!({ "error": "User not found" }));
                return Ok(());
            }
        };
        res.json(&json!({ "id": id }));
        Ok(())
    }

    fn contact_page(&self, ctx: &AppContext, req: &Request, res: &mut Response, errors: Value) -> HandlerResult {
        let token = ctx.security().csrf_token(&mut req.session_mut());
        let success = req.session_mut().take_flash("success");
        let old = json!({
            "name": req.input("name").unwrap_or_default(),
            "email": req.input("email").unwrap_or_default(),
            "message": req.input("message").unwrap_or_default(),
        });
        self.render(
            ctx,
            res,
            "home/contact",
            json!({
                "title": "Contact",
                "csrf_token": token,
                "errors": errors,
                "old": old,
                "success": success,
            }),
        )
    }

    pub fn contact(&mut self, ctx: &AppContext, req: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        self.contact_page(ctx, req, res, json!({}))
    }

    pub fn submit_contact(&mut self, ctx: &AppContext, req: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        let errors = self.validate(ctx, req, CONTACT_RULES);
        if !errors.is_empty() {
            res.set_status(422);
            return self.contact_page(ctx, req, res, serde_json::to_value(&errors)?);
        }

        let email = ctx.security().sanitize(req.input("email").unwrap_or_default());
        ctx.logger().info("Contact form submitted", json!({ "email": email }));
        req.session_mut()
            .flash("success", "Thank you! Your message has been sent.");
        res.redirect("/form/contact", Some(303));
        Ok(())
    }

    pub fn login_form(&mut self, ctx: &AppContext, req: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        let token = ctx.security().csrf_token(&mut req.session_mut());
        self.render(ctx, res, "home/login", json!({ "title": "Sign in", "csrf_token": token }))
    }

    pub fn login(&mut self, ctx: &AppContext, req: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        let errors = self.validate(ctx, req, &[("username", "required|max:50")]);
        if !errors.is_empty() {
            res.set_status(422).json(&json!({ "errors": errors }));
            return Ok(());
        }
        let username = ctx.security().sanitize(req.input("username").unwrap_or_default());

        let mut session = req.session_mut();
        session.regenerate(true);
        session.set(USER_ID_KEY, username.clone());
        drop(session);

        ctx.logger().info("User signed in", json!({ "user": username, "ip": req.ip() }));
        res.redirect("/admin/dashboard", Some(303));
        Ok(())
    }

    pub fn logout(&mut self, _: &AppContext, req: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        req.session_mut().destroy();
        res.redirect("/", Some(303));
        Ok(())
    }

    pub fn get_data(&mut self, ctx: &AppContext, _: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        let data: Value = ctx.cache().remember(API_DATA_KEY, self.api_ttl, || {
            json!({
                "timestamp": unix_now(),
                "data": ["item1", "item2", "item3"],
            })
        })?;
        res.json(&data);
        Ok(())
    }

    pub fn submit_data(&mut self, ctx: &AppContext, req: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        let security = ctx.security();
        let received: Value = match req.json() {
            Some(Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| match v {
                    Value::String(s) => (k, Value::String(security.sanitize(&s))),
                    other => (k, other),
                })
                .collect::<serde_json::Map<_, _>>()
                .into(),
            Some(_) => {
                res.set_status(400)
                    .json(&json!({ "error": "Expected a JSON object" }));
                return Ok(());
            }
            None => req
                .all()
                .into_iter()
                .map(|(k, v)| (k, Value::String(security.sanitize(&v))))
                .collect::<serde_json::Map<_, _>>()
                .into(),
        };
        res.set_status(201)
            .json(&json!({ "success": true, "received": received }));
        Ok(())
    }
}
