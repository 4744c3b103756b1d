use http::Method;

use super::{PathMatcher, Registrar, Router, RouterError};
use crate::dispatcher::Handler;
use crate::middleware::{from_fn, MiddlewareRef};

fn noop(name: &str) -> Handler {
    Handler::named(name.to_string(), |_, _, _, _| Ok(()))
}

fn pass(name: &str) -> MiddlewareRef {
    from_fn(name, |_, _, _| Ok(true))
}

#[test]
fn test_placeholder_captures_one_segment() {
    let m = PathMatcher::compile("/users/{id}").unwrap();
    let params = m.captures("/users/42").unwrap();
    assert_eq!(params.get("id"), Some("42"));
    assert!(m.captures("/users/").is_none());
    assert!(m.captures("/users/42/extra").is_none());
    assert!(m.captures("/users").is_none());
}

#[test]
fn test_literal_text_is_escaped() {
    let m = PathMatcher::compile("/users/{id}.json").unwrap();
    assert_eq!(m.captures("/users/7.json").unwrap().get("id"), Some("7"));
    assert!(m.captures("/users/7xjson").is_none());

    let plus = PathMatcher::compile("/c++/{v}").unwrap();
    assert!(plus.is_match("/c++/17"));
    assert!(!plus.is_match("/cc/17"));
}

#[test]
fn test_params_keep_declaration_order() {
    let m = PathMatcher::compile("/a/{x}/b/{y}").unwrap();
    let params = m.captures("/a/1/b/2").unwrap();
    assert_eq!(params.names(), vec!["x", "y"]);
    assert_eq!(params.iter().collect::<Vec<_>>(), vec![("x", "1"), ("y", "2")]);
}

#[test]
fn test_static_template_matches_exactly() {
    let m = PathMatcher::compile("/about").unwrap();
    let params = m.captures("/about").unwrap();
    assert!(params.is_empty());
    assert!(m.captures("/about/").is_none());
    assert!(m.captures("/aboutus").is_none());
    assert!(m.captures("/x/about").is_none());
}

#[test]
fn test_duplicate_names_last_wins() {
    let m = PathMatcher::compile("/{id}/{id}").unwrap();
    let params = m.captures("/first/second").unwrap();
    assert_eq!(params.get("id"), Some("second"));
    assert_eq!(params.len(), 2);
}

#[test]
fn test_unbraced_text_is_literal() {
    let m = PathMatcher::compile("/files/{bad-name}").unwrap();
    assert!(m.is_match("/files/{bad-name}"));
    assert!(!m.is_match("/files/report"));
}

#[test]
fn test_first_registered_route_wins() {
    let mut router = Router::new();
    router.get("/users/{id}", noop("by_id"), &[]).unwrap();
    router.get("/users/me", noop("me"), &[]).unwrap();

    let m = router.route(&Method::GET, "/users/me").unwrap();
    assert_eq!(m.index, 0);
    assert_eq!(m.route.handler().name(), "by_id");
    assert_eq!(m.params.get("id"), Some("me"));
}

#[test]
fn test_method_must_match() {
    let mut router = Router::new();
    router.post("/submit", noop("submit"), &[]).unwrap();
    assert!(router.route(&Method::GET, "/submit").is_none());
    assert!(router.route(&Method::POST, "/submit").is_some());
}

#[test]
fn test_nested_groups_compose() {
    let mut router = Router::new();
    router
        .group("/admin", &[pass("A")], |admin| {
            admin.group("/users", &[pass("B")], |users| {
                assert_eq!(users.context().prefix(), "/admin/users");
                users.get("/list", noop("list"), &[pass("C")])
            })
        })
        .unwrap();
    router.get("/after", noop("after"), &[]).unwrap();

    let list = &router.routes()[0];
    assert_eq!(list.path(), "/admin/users/list");
    assert_eq!(list.middleware_names(), vec!["A", "B", "C"]);

    let after = &router.routes()[1];
    assert_eq!(after.path(), "/after");
    assert!(after.middleware().is_empty());
}

#[test]
fn test_group_with_empty_prefix() {
    let mut router = Router::new();
    router
        .group("", &[pass("csrf")], |g| g.post("/contact", noop("contact"), &[]))
        .unwrap();
    assert_eq!(router.routes()[0].path(), "/contact");
    assert_eq!(router.routes()[0].middleware_names(), vec!["csrf"]);
}

#[test]
fn test_match_methods_registers_each_verb() {
    let mut router = Router::new();
    router
        .match_methods(&["get", "POST"], "/form", noop("form"), &[])
        .unwrap();
    assert_eq!(router.len(), 2);
    assert_eq!(router.routes()[0].method(), &Method::GET);
    assert_eq!(router.routes()[1].method(), &Method::POST);
}

#[test]
fn test_match_methods_rejects_invalid_verb() {
    let mut router = Router::new();
    let err = router
        .match_methods(&["GET", "NOT A VERB"], "/x", noop("x"), &[])
        .unwrap_err();
    assert!(matches!(err, RouterError::InvalidMethod { ref method } if method == "NOT A VERB"));
}

#[test]
fn test_matching_is_idempotent() {
    let mut router = Router::new();
    router.get("/posts/{slug}", noop("post"), &[]).unwrap();
    let a = router.route(&Method::GET, "/posts/hello").unwrap();
    let b = router.route(&Method::GET, "/posts/hello").unwrap();
    assert_eq!(a.index, b.index);
    assert_eq!(a.params, b.params);
}

#[test]
fn test_dump_routes() {
    let mut router = Router::new();
    router.get("/", noop("home"), &[]).unwrap();
    router.delete("/items/{id}", noop("drop"), &[pass("auth")]).unwrap();
    let dump = router.dump_routes();
    assert_eq!(dump[0], "GET     / -> home");
    assert_eq!(dump[1], "DELETE  /items/{id} -> drop [auth]");
}

#[test]
fn test_no_match() {
    let router = Router::new();
    assert!(router.is_empty());
    assert!(router.route(&Method::GET, "/").is_none());
}
