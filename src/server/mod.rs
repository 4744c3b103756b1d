//! HTTP surface: request/response types and the `may_minihttp` service.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;
pub mod static_files;

pub use http_server::{HttpServer, ServerHandle, MAX_REQUEST_HEADERS};
pub use request::{parse_cookies, parse_request, Request, DEFAULT_IP};
pub use response::{status_reason, Cookie, Response, SameSite, MAX_RESPONSE_HEADERS};
pub use service::AppService;
pub use static_files::StaticFiles;
