use http::Method;
use serde_json::Value;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::io::{self, Read};
use tracing::{debug, info};

use crate::services::Session;

/// Client address used when no proxy header identifies one.
pub const DEFAULT_IP: &str = "127.0.0.1";

/// An incoming HTTP request.
///
/// Header names are stored lowercase. The path is percent-decoded and never
/// contains the query string. Form fields come from an
/// `application/x-www-form-urlencoded` body; `input` looks at form fields
/// first and falls back to the query string.
///
/// The session is attached by the application before dispatch and may be
/// modified by middleware and handlers through [`Request::session_mut`].
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: String,
    path: String,
    ip: String,
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    query: HashMap<String, String>,
    form: HashMap<String, String>,
    body: Vec<u8>,
    session: RefCell<Session>,
}

impl Request {
    /// Build a request for `uri` (path plus optional query string).
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        let (raw_path, raw_query) = match uri.split_once('?') {
            Some((p, q)) => (p, q),
            None => (uri, ""),
        };
        Self {
            method,
            uri: uri.to_string(),
            path: decode_path(raw_path),
            ip: DEFAULT_IP.to_string(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            query: parse_urlencoded(raw_query),
            form: HashMap::new(),
            body: Vec::new(),
            session: RefCell::new(Session::new()),
        }
    }

    /// Add a header. A `Cookie` header also populates the cookie map, and
    /// `X-Forwarded-For` / `X-Real-IP` set the client address.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "cookie" => self.cookies.extend(parse_cookies(value)),
            "x-forwarded-for" => {
                if let Some(first) = value.split(',').map(str::trim).find(|s| !s.is_empty()) {
                    self.ip = first.to_string();
                }
            }
            "x-real-ip" if !self.headers.contains_key("x-forwarded-for") => {
                self.ip = value.trim().to_string();
            }
            _ => {}
        }
        self.headers.insert(name, value.to_string());
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    /// Set the body as form fields, as a browser form post would.
    #[must_use]
    pub fn with_form<'a, I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self = self.with_header("content-type", "application/x-www-form-urlencoded");
        self.set_body(encoded.into_bytes());
        self
    }

    /// Set a raw body. The content type must already be set for form
    /// decoding to apply.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.set_body(body.into());
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip = ip.to_string();
        self
    }

    fn set_body(&mut self, body: Vec<u8>) {
        if self.content_type_is("application/x-www-form-urlencoded") {
            self.form = parse_urlencoded(&String::from_utf8_lossy(&body));
        }
        self.body = body;
    }

    fn content_type_is(&self, mime: &str) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with(mime))
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Decoded path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The request target exactly as received.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn post(&self, key: &str) -> Option<&str> {
        self.form.get(key).map(String::as_str)
    }

    /// Form field, falling back to the query string.
    #[must_use]
    pub fn input(&self, key: &str) -> Option<&str> {
        self.post(key).or_else(|| self.query(key))
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.input(key).is_some()
    }

    /// Query and form fields merged, form winning on conflicts.
    #[must_use]
    pub fn all(&self) -> HashMap<String, String> {
        let mut merged = self.query.clone();
        merged.extend(self.form.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether the request came from `XMLHttpRequest`.
    #[must_use]
    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
    }

    /// The body parsed as JSON, when the request declares a JSON body.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        if !self.is_json() || self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// # Panics
    ///
    /// If the session is currently mutably borrowed.
    #[must_use]
    pub fn session(&self) -> Ref<'_, Session> {
        self.session.borrow()
    }

    /// # Panics
    ///
    /// If the session is currently borrowed.
    #[must_use]
    pub fn session_mut(&self) -> RefMut<'_, Session> {
        self.session.borrow_mut()
    }

    pub fn set_session(&mut self, session: Session) {
        *self.session.get_mut() = session;
    }

    /// Detach the session, leaving a fresh empty one in its place.
    pub fn take_session(&mut self) -> Session {
        std::mem::take(self.session.get_mut())
    }
}

fn decode_path(raw: &str) -> String {
    let raw = if raw.is_empty() { "/" } else { raw };
    urlencoding::decode(raw)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(input.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Parse a `Cookie` header value into name/value pairs.
#[must_use]
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Convert a `may_minihttp` request into a [`Request`].
///
/// # Errors
///
/// Returns `InvalidInput` for an unparseable method, or the underlying error
/// if reading the body fails.
pub fn parse_request(req: may_minihttp::Request) -> io::Result<Request> {
    let method = Method::from_bytes(req.method().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut request = Request::new(method, req.path());

    for h in req.headers() {
        let value = String::from_utf8_lossy(h.value);
        request = request.with_header(h.name, &value);
    }
    debug!(
        header_count = request.headers.len(),
        cookie_count = request.cookies.len(),
        query_count = request.query.len(),
        "Headers extracted"
    );

    // Consumes the request, so it comes last.
    let mut body = Vec::new();
    req.body().read_to_end(&mut body)?;
    if !body.is_empty() {
        debug!(body_size_bytes = body.len(), "Request body read");
        request.set_body(body);
    }

    info!(
        method = %request.method,
        path = %request.path,
        ip = %request.ip,
        "HTTP request parsed"
    );
    Ok(request)
}
