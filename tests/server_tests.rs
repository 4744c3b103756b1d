//! HTTP server smoke tests on a free local port.
//!
//! Covers the wire path: request parsing, static assets ahead of routing,
//! the application's responses, the framework's headers and header limits.

use minimvc::dispatcher::Handler;
use minimvc::router::{Registrar, Router};
use minimvc::server::{AppService, HttpServer, ServerHandle, StaticFiles, MAX_RESPONSE_HEADERS};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

mod common;
use common::http::send_request;
use common::site::TestSite;
use common::test_server::{free_addr, setup_may_runtime};

/// Running server with automatic teardown
struct TestServer {
    _site: TestSite,
    handle: Option<ServerHandle>,
    addr: SocketAddr,
}

impl TestServer {
    fn new() -> Self {
        setup_may_runtime();
        let site = TestSite::new();
        site.write_public("css/app.css", b"body { color: red; }");

        let mut router = Router::new();
        router
            .get(
                "/hello/{name}",
                Handler::new(|_, _, res, params| {
                    res.json(&json!({ "hello": params.get("name") }));
                    Ok(())
                }),
                &[],
            )
            .unwrap();
        router
            .post(
                "/echo",
                Handler::new(|_, req, res, _| {
                    res.json(&json!({ "body": req.json() }));
                    Ok(())
                }),
                &[],
            )
            .unwrap();
        router
            .get(
                "/headers/{count}",
                Handler::new(|_, _, res, params| {
                    let count = params.get("count").and_then(|c| c.parse::<usize>().ok());
                    for i in 0..count.unwrap_or(0) {
                        res.set_header(&format!("X-H{i}"), i.to_string());
                    }
                    res.text("ok");
                    Ok(())
                }),
                &[],
            )
            .unwrap();
        let app = site.app(false, router);
        let service = AppService::new(
            Arc::new(app),
            Some(StaticFiles::new(site.path().join("public"))),
        );

        let addr = free_addr();
        let handle = HttpServer(service).start(addr).unwrap();
        handle.wait_ready().unwrap();
        Self {
            _site: site,
            handle: Some(handle),
            addr,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

#[test]
fn test_route_over_the_wire() {
    let server = TestServer::new();
    let res = send_request(
        &server.addr,
        "GET /hello/ada HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.header("X-Request-Id").map(str::len), Some(26));
    let body: Value = serde_json::from_str(&res.body).unwrap();
    assert_eq!(body, json!({ "hello": "ada" }));
}

#[test]
fn test_json_body_over_the_wire() {
    let server = TestServer::new();
    let payload = r#"{"a":1}"#;
    let req = format!(
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        payload.len(),
        payload
    );
    let res = send_request(&server.addr, &req);
    assert_eq!(res.status, 200);
    let body: Value = serde_json::from_str(&res.body).unwrap();
    assert_eq!(body, json!({ "body": { "a": 1 } }));
}

#[test]
fn test_static_asset_served_before_routing() {
    let server = TestServer::new();
    let res = send_request(
        &server.addr,
        "GET /css/app.css HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("text/css"));
    assert_eq!(res.body, "body { color: red; }");
}

#[test]
fn test_unknown_path_is_404_page() {
    let server = TestServer::new();
    let res = send_request(
        &server.addr,
        "GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    assert_eq!(res.status, 404);
    assert!(res.body.contains("Not Found"));
}

#[test]
fn test_many_request_headers_accepted() {
    let server = TestServer::new();
    let mut req = String::from("GET /hello/ada HTTP/1.1\r\nHost: localhost\r\n");
    for i in 0..24 {
        req.push_str(&format!("X-Proxy-{i}: hop-{i}\r\n"));
    }
    req.push_str("\r\n");
    let res = send_request(&server.addr, &req);
    assert_eq!(res.status, 200);
    let body: Value = serde_json::from_str(&res.body).unwrap();
    assert_eq!(body, json!({ "hello": "ada" }));
}

#[test]
fn test_handler_headers_up_to_capacity_are_written() {
    let server = TestServer::new();
    // Content-Type and X-Request-Id take two of the slots.
    let count = MAX_RESPONSE_HEADERS - 2;
    let res = send_request(
        &server.addr,
        &format!("GET /headers/{count} HTTP/1.1\r\nHost: localhost\r\n\r\n"),
    );
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "ok");
    let last = (count - 1).to_string();
    assert_eq!(res.header(&format!("X-H{}", count - 1)), Some(last.as_str()));
}

#[test]
fn test_too_many_response_headers_answered_with_500() {
    let server = TestServer::new();
    let res = send_request(
        &server.addr,
        &format!(
            "GET /headers/{MAX_RESPONSE_HEADERS} HTTP/1.1\r\nHost: localhost\r\n\r\n"
        ),
    );
    assert_eq!(res.status, 500);
    assert_eq!(res.header("X-H0"), None);
    let body: Value = serde_json::from_str(&res.body).unwrap();
    assert_eq!(body, json!({ "error": "Internal Server Error" }));

    // The server keeps answering afterwards.
    let ok = send_request(
        &server.addr,
        "GET /hello/bob HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    assert_eq!(ok.status, 200);
}

#[test]
fn test_request_ids_differ_per_request() {
    let server = TestServer::new();
    let ids: Vec<String> = (0..5)
        .map(|_| {
            send_request(
                &server.addr,
                "GET /hello/ada HTTP/1.1\r\nHost: localhost\r\n\r\n",
            )
            .header("X-Request-Id")
            .map(str::to_string)
            .unwrap()
        })
        .collect();
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(id.len(), 26);
        assert!(!ids[i + 1..].contains(id));
    }
}
