use minimvc::application::AppContext;
use minimvc::controller::Controller;
use minimvc::dispatcher::{HandlerError, HandlerResult};
use minimvc::router::PathParams;
use minimvc::server::{Request, Response};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

const CRON_TOKEN_HEADER: &str = "x-cron-token";
const CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
const LOG_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Maintenance jobs triggered by an external scheduler.
///
/// Every action requires `X-Cron-Token` to equal the `CRON_TOKEN`
/// environment variable; an unset variable rejects all calls.
pub struct CronController {
    token: String,
}

impl Controller for CronController {
    fn new(_ctx: &AppContext) -> Self {
        Self {
            token: env::var("CRON_TOKEN").unwrap_or_default(),
        }
    }
}

impl CronController {
    fn authorized(&self, ctx: &AppContext, req: &Request, res: &mut Response) -> bool {
        let presented = req.header(CRON_TOKEN_HEADER).unwrap_or_default();
        if !ctx.security().secrets_match(&self.token, presented) {
            ctx.logger()
                .warning("Invalid cron token attempt", json!({ "ip": req.ip() }));
            res.set_status(401).json(&json!({ "error": "Unauthorized" }));
            return false;
        }
        true
    }

    fn example_job(ctx: &AppContext) -> HandlerResult<Value> {
        let pruned = ctx
            .cache()
            .prune(CACHE_MAX_AGE)
            .map_err(|e| HandlerError::from(e).context("Cache prune failed"))?;
        Ok(json!({
            "status": "success",
            "message": "Job executed successfully",
            "timestamp": humantime::format_rfc3339_seconds(std::time::SystemTime::now()).to_string(),
            "pruned_cache_entries": pruned,
        }))
    }

    fn cleanup_logs(ctx: &AppContext) -> HandlerResult<Value> {
        let deleted = ctx
            .logger()
            .prune(LOG_MAX_AGE)
            .map_err(|e| HandlerError::from(e).context("Log cleanup failed"))?;
        Ok(json!({ "deleted_files": deleted }))
    }

    fn cleanup_sessions(ctx: &AppContext) -> HandlerResult<usize> {
        ctx.sessions()
            .gc()
            .map_err(|e| HandlerError::from(e).context("Session cleanup failed"))
    }

    fn cleanup(ctx: &AppContext) -> HandlerResult<Value> {
        let mut result = Self::cleanup_logs(ctx)?;
        result["expired_sessions"] = json!(Self::cleanup_sessions(ctx)?);
        Ok(result)
    }

    pub fn run_job(&mut self, ctx: &AppContext, req: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        if !self.authorized(ctx, req, res) {
            return Ok(());
        }
        let result = match req.input("job") {
            Some("example") => Self::example_job(ctx)?,
            Some("cleanup") => Self::cleanup(ctx)?,
            _ => {
                res.set_status(404).json(&json!({ "error": "Job not found" }));
                return Ok(());
            }
        };
        ctx.logger().info("Cron job finished", json!({ "job": req.input("job") }));
        res.json(&json!({ "success": true, "result": result }));
        Ok(())
    }

    pub fn run_cleanup(&mut self, ctx: &AppContext, req: &Request, res: &mut Response, _: &PathParams) -> HandlerResult {
        if !self.authorized(ctx, req, res) {
            return Ok(());
        }
        let result = Self::cleanup(ctx)?;
        res.json(&json!({ "success": true, "result": result }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use minimvc::config::Config;
    use minimvc::services::Session;
    use std::fs::File;
    use std::time::SystemTime;

    fn context(dir: &tempfile::TempDir) -> AppContext {
        AppContext::init_services(dir.path(), Config::defaults()).unwrap()
    }

    fn controller() -> CronController {
        CronController {
            token: "cron-secret".to_string(),
        }
    }

    fn saved_session(ctx: &AppContext) -> std::path::PathBuf {
        let mut session = Session::new();
        session.set("user_id", 7);
        ctx.sessions().save(&session).unwrap();
        ctx.sessions().dir().join(format!("{}.json", session.id()))
    }

    #[test]
    fn test_cleanup_removes_abandoned_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let abandoned = saved_session(&ctx);
        let active = saved_session(&ctx);
        let long_ago = SystemTime::now() - Duration::from_secs(3 * 24 * 60 * 60);
        File::options()
            .write(true)
            .open(&abandoned)
            .unwrap()
            .set_modified(long_ago)
            .unwrap();

        let req = Request::new(Method::POST, "/cron/cleanup").with_header(CRON_TOKEN_HEADER, "cron-secret");
        let mut res = Response::new();
        controller()
            .run_cleanup(&ctx, &req, &mut res, &PathParams::default())
            .unwrap();

        assert_eq!(res.status(), 200);
        let body = res.body_json().unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["result"]["expired_sessions"], 1);
        assert!(!abandoned.exists());
        assert!(active.exists());
    }

    #[test]
    fn test_wrong_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let req = Request::new(Method::POST, "/cron/run-job")
            .with_header(CRON_TOKEN_HEADER, "cron-secreT")
            .with_form([("job", "example")]);
        let mut res = Response::new();
        controller()
            .run_job(&ctx, &req, &mut res, &PathParams::default())
            .unwrap();
        assert_eq!(res.status(), 401);
        assert_eq!(res.body_json(), Some(json!({ "error": "Unauthorized" })));
    }

    #[test]
    fn test_unset_token_rejects_everything() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let req = Request::new(Method::POST, "/cron/cleanup").with_header(CRON_TOKEN_HEADER, "");
        let mut res = Response::new();
        CronController { token: String::new() }
            .run_cleanup(&ctx, &req, &mut res, &PathParams::default())
            .unwrap();
        assert_eq!(res.status(), 401);
    }
}
