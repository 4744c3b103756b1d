#![allow(dead_code)]

pub mod site {
    use minimvc::application::Application;
    use minimvc::config::Config;
    use minimvc::router::Router;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const LAYOUT: &str = "<html><body>{% block content %}{% endblock %}</body></html>";
    const NOT_FOUND: &str = r#"{% extends "layouts/app.html" %}{% block content %}<h1>Not Found</h1><p>{{ method }} {{ path }}</p>{% endblock %}"#;

    /// Scratch site root with a layout and a 404 view, removed on drop.
    pub struct TestSite {
        dir: TempDir,
    }

    impl TestSite {
        pub fn new() -> Self {
            let site = Self {
                dir: tempfile::tempdir().unwrap(),
            };
            site.write_view("layouts/app", LAYOUT);
            site.write_view("errors/404", NOT_FOUND);
            site
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        pub fn write_view(&self, name: &str, content: &str) {
            let path = self
                .dir
                .path()
                .join("resources/views")
                .join(format!("{name}.html"));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        pub fn write_public(&self, rel: &str, content: &[u8]) {
            let path = self.dir.path().join("public").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        pub fn config(debug: bool) -> Config {
            let mut config = Config::defaults();
            config.set("app.debug", json!(debug));
            config.set("view.cache", json!(false));
            config
        }

        pub fn app(&self, debug: bool, router: Router) -> Application {
            let mut app = Application::bootstrap(self.path(), Self::config(debug)).unwrap();
            app.set_router(router);
            app
        }

        /// Every line of every file under `storage/logs`.
        pub fn log_lines(&self) -> Vec<String> {
            let dir = self.dir.path().join("storage/logs");
            let mut lines = Vec::new();
            for entry in fs::read_dir(dir).unwrap() {
                let text = fs::read_to_string(entry.unwrap().path()).unwrap();
                lines.extend(text.lines().map(str::to_string));
            }
            lines
        }
    }
}

pub mod test_server {
    use std::net::{SocketAddr, TcpListener};
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    pub fn free_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    pub struct RawResponse {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl RawResponse {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    pub fn send_request(addr: &SocketAddr, req: &str) -> RawResponse {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {:?}", e),
            }
        }
        parse_response(&String::from_utf8_lossy(&buf))
    }

    fn parse_response(resp: &str) -> RawResponse {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut status = 0;
        let mut headers = Vec::new();
        for line in head.lines() {
            if line.starts_with("HTTP/1.1") {
                status = line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("0")
                    .parse()
                    .unwrap();
            } else if let Some((name, val)) = line.split_once(':') {
                headers.push((name.trim().to_string(), val.trim().to_string()));
            }
        }
        RawResponse {
            status,
            headers,
            body: body.to_string(),
        }
    }
}
