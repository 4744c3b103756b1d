use may_minihttp::{HttpService, Request as RawRequest, Response as RawResponse};
use serde_json::json;
use std::io;
use std::sync::Arc;
use tracing::{error, warn};

use super::request::parse_request;
use super::response::{HeaderLines, Response};
use super::static_files::StaticFiles;
use crate::application::Application;

/// `may_minihttp` service driving an [`Application`].
///
/// Public assets are served before routing; every other request goes
/// through [`Application::run`]. The server clones the service for each
/// connection; a clone shares the application but owns its header lines.
#[derive(Clone)]
pub struct AppService {
    app: Arc<Application>,
    static_files: Option<StaticFiles>,
    header_lines: HeaderLines,
}

impl AppService {
    #[must_use]
    pub fn new(app: Arc<Application>, static_files: Option<StaticFiles>) -> Self {
        Self {
            app,
            static_files,
            header_lines: HeaderLines::new(),
        }
    }

    #[must_use]
    pub fn application(&self) -> &Arc<Application> {
        &self.app
    }

    fn serve_static(&self, path: &str) -> Option<Response> {
        let sf = self.static_files.as_ref()?;
        let (bytes, content_type) = sf.load(path).ok()?;
        let mut res = Response::new();
        res.bytes(content_type, bytes);
        Some(res)
    }
}

fn internal_error() -> Response {
    let mut res = Response::new();
    res.set_status(500)
        .json(&json!({ "error": "Internal Server Error" }));
    res
}

impl HttpService for AppService {
    fn call(&mut self, req: RawRequest, res: &mut RawResponse) -> io::Result<()> {
        // SAFETY: may_minihttp encodes each response before decoding the next
        // request on the same connection, and this clone serves one connection.
        #[allow(unsafe_code)]
        unsafe {
            self.header_lines.recycle();
        }

        let request = match parse_request(req) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Rejected malformed request");
                let mut bad = Response::new();
                bad.set_status(400).json(&json!({ "error": "Bad Request" }));
                bad.write_to(res, &mut self.header_lines);
                return Ok(());
            }
        };

        if request.method() == http::Method::GET {
            if let Some(asset) = self.serve_static(request.path()) {
                asset.write_to(res, &mut self.header_lines);
                return Ok(());
            }
        }

        let response = match self.app.run(request) {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "Application could not handle request");
                internal_error()
            }
        };
        response.write_to(res, &mut self.header_lines);
        Ok(())
    }
}
