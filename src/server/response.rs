use http::StatusCode;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, error, warn};

/// Header lines a `may_minihttp` response has room for.
pub const MAX_RESPONSE_HEADERS: usize = 16;

const JSON_CONTENT_TYPE: &str = "Content-Type: application/json";
const GENERIC_500_BODY: &[u8] = br#"{"error":"Internal Server Error"}"#;

// Lines shared by most responses; handed out without touching the buffer.
const FIXED_LINES: &[&str] = &[
    JSON_CONTENT_TYPE,
    "Content-Type: text/html; charset=UTF-8",
    "Content-Type: text/plain; charset=UTF-8",
    "Content-Type: application/octet-stream",
];

/// `SameSite` attribute of a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// A `Set-Cookie` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// `Max-Age` in seconds; `None` makes a session cookie.
    pub max_age: Option<u64>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Cookie {
    /// An `HttpOnly`, `SameSite=Strict` cookie scoped to `/`.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: SameSite::Strict,
        }
    }

    /// A cookie that tells the client to drop `name`.
    #[must_use]
    pub fn expired(name: impl Into<String>) -> Self {
        Self {
            max_age: Some(0),
            ..Self::new(name, "")
        }
    }

    #[must_use]
    pub fn header_value(&self) -> String {
        let mut out = format!("{}={}; Path={}", self.name, self.value, self.path);
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(domain) = &self.domain {
            out.push_str(&format!("; Domain={domain}"));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out.push_str("; SameSite=");
        out.push_str(self.same_site.as_str());
        out
    }
}

/// Outgoing response, built up by middleware and handlers.
///
/// Status defaults to 200. `json`, `html`, `redirect` and `download` each
/// finish the response: later body writes are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    finished: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            finished: false,
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Add a header without replacing existing ones (`Set-Cookie`).
    pub fn append_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn set_headers<'a, I>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in headers {
            self.set_header(name, value);
        }
        self
    }

    /// First header with this name, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn with_cookie(&mut self, cookie: &Cookie) -> &mut Self {
        self.append_header("Set-Cookie", cookie.header_value())
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, lossily decoded.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON, for callers that wrote one.
    #[must_use]
    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish(&mut self, content_type: &str, body: Vec<u8>) {
        if self.finished {
            debug!(status = self.status, "Response already finished; ignoring write");
            return;
        }
        self.set_header("Content-Type", content_type);
        self.body = body;
        self.finished = true;
    }

    /// Write `value` as pretty-printed JSON.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) {
        match serde_json::to_vec_pretty(value) {
            Ok(body) => self.finish("application/json", body),
            Err(e) => {
                warn!(error = %e, "Failed to serialize JSON response");
                self.status = 500;
                self.finish("application/json", br#"{"error":"Internal Server Error"}"#.to_vec());
            }
        }
    }

    pub fn html(&mut self, content: impl Into<String>) {
        self.finish("text/html; charset=UTF-8", content.into().into_bytes());
    }

    pub fn text(&mut self, content: impl Into<String>) {
        self.finish("text/plain; charset=UTF-8", content.into().into_bytes());
    }

    /// Raw body with an explicit content type.
    pub fn bytes(&mut self, content_type: &str, body: Vec<u8>) {
        self.finish(content_type, body);
    }

    /// Redirect with `status` (302 when `None`).
    pub fn redirect(&mut self, url: &str, status: Option<u16>) {
        if self.finished {
            return;
        }
        self.status = status.unwrap_or(302);
        self.set_header("Location", url);
        self.finished = true;
    }

    /// Send a file as an attachment, named `filename` or its own file name.
    ///
    /// A missing file produces a 404 JSON response instead.
    ///
    /// # Errors
    ///
    /// Any I/O error other than the file not existing.
    pub fn download(&mut self, path: &Path, filename: Option<&str>) -> io::Result<()> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.set_status(404)
                    .json(&serde_json::json!({ "error": "File not found" }));
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let name = filename
            .map(str::to_string)
            .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "download".to_string());
        self.set_header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", name.replace('"', "")),
        );
        self.finish("application/octet-stream", bytes);
        Ok(())
    }

    /// Drop any body and content type written so far, reopening the response.
    pub fn discard_body(&mut self) {
        self.body.clear();
        self.finished = false;
        self.headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));
    }

    /// Whether the headers fit in a `may_minihttp` response.
    #[must_use]
    pub fn fits_header_capacity(&self) -> bool {
        self.headers.len() <= MAX_RESPONSE_HEADERS
    }

    /// Serialize into the wire response.
    ///
    /// A response with more headers than the wire response can hold is
    /// replaced by a generic 500.
    pub(crate) fn write_to(&self, res: &mut may_minihttp::Response, lines: &mut HeaderLines) {
        if !self.fits_header_capacity() {
            error!(
                status = self.status,
                headers = self.headers.len(),
                max_headers = MAX_RESPONSE_HEADERS,
                "Response exceeds header capacity; sending 500"
            );
            res.status_code(500, status_reason(500));
            res.header(JSON_CONTENT_TYPE);
            res.body_vec(GENERIC_500_BODY.to_vec());
            return;
        }
        res.status_code(usize::from(self.status), status_reason(self.status));
        for (name, value) in &self.headers {
            res.header(lines.line(name, value));
        }
        res.body_vec(self.body.clone());
    }
}

/// Canonical reason phrase for `status`.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    if status == 419 {
        return "Page Expired";
    }
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Storage for the header lines of the response being written.
///
/// `may_minihttp` holds header lines as `&'static str` until it encodes the
/// response, which happens as soon as `HttpService::call` returns and before
/// the next request on that connection is decoded. The server clones the
/// service for every connection, so a buffer owned by the service and
/// recycled at the start of each call outlives every line it hands out.
/// A clone always starts empty.
#[derive(Debug, Default)]
pub(crate) struct HeaderLines {
    lines: Vec<Box<str>>,
}

impl Clone for HeaderLines {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl HeaderLines {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Lines currently held for the in-flight response.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    /// Release the lines handed out for the previous response.
    ///
    /// # Safety
    ///
    /// No `may_minihttp::Response` that received lines from this buffer may
    /// still be waiting to be encoded.
    #[allow(unsafe_code)]
    pub(crate) unsafe fn recycle(&mut self) {
        self.lines.clear();
    }

    fn line(&mut self, name: &str, value: &str) -> &'static str {
        let line = format!("{name}: {value}");
        if let Some(fixed) = FIXED_LINES.iter().copied().find(|l| *l == line) {
            return fixed;
        }
        let line = line.into_boxed_str();
        let ptr: *const str = &*line;
        self.lines.push(line);
        // SAFETY: the boxed string's heap allocation does not move when
        // `lines` grows and is only freed by `recycle` or drop, both of which
        // happen after the response holding it has been encoded.
        #[allow(unsafe_code)]
        unsafe {
            &*ptr
        }
    }
}
