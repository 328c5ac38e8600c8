//! Controllers declared in YAML manifests: loading, reloading on mtime
//! change and the echo fallback for actions without a library body.

mod common;

use common::app_root::AppRoot;
use dio::{ActionLibrary, App, Request, Response};
use http::Method;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const HOOKED: &str = r#"
routes:
  - { verb: get, pattern: "/feed", action: index }
before:
  - { hook: audit, only: index }
actions: [index]
helpers: [audit]
"#;

const UNHOOKED: &str = r#"
routes:
  - { verb: get, pattern: "/stream", action: index }
actions: [index]
helpers: [audit]
"#;

fn library(audits: &Arc<AtomicUsize>) -> ActionLibrary {
    let mut library = ActionLibrary::new();
    library.register("post#index", |c| {
        c.response.set_body(["index"]);
        Ok(())
    });
    let audits = Arc::clone(audits);
    library.register("audit", move |_c| {
        audits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    library
}

fn get(app: &App, target: &str) -> Response {
    app.call(Request::new(Method::GET, target))
}

#[test]
fn test_reload_replaces_routes_and_hooks() {
    let root = AppRoot::new();
    root.write("controllers/post.yaml", HOOKED);
    let audits = Arc::new(AtomicUsize::new(0));
    let app = App::new(root.settings()).with_manifests(library(&audits));

    let response = get(&app, "/post/feed");
    assert_eq!(response.body_string(), "index");
    assert_eq!(audits.load(Ordering::SeqCst), 1);

    root.rewrite_manifest("post", UNHOOKED, 5);

    assert_eq!(get(&app, "/post/feed").status(), 404);
    let response = get(&app, "/post/stream");
    assert_eq!(response.body_string(), "index");
    assert_eq!(audits.load(Ordering::SeqCst), 1, "hooks must not survive a reload");
}

#[test]
fn test_unchanged_manifest_is_not_rebuilt() {
    let root = AppRoot::new();
    root.write("controllers/post.yaml", HOOKED);
    let audits = Arc::new(AtomicUsize::new(0));
    let app = App::new(root.settings()).with_manifests(library(&audits));

    let first = app.controller("post").unwrap();
    let second = app.controller("post").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_broken_manifest_keeps_previous_definition() {
    let root = AppRoot::new();
    root.write("controllers/post.yaml", HOOKED);
    let audits = Arc::new(AtomicUsize::new(0));
    let app = App::new(root.settings()).with_manifests(library(&audits));
    assert_eq!(get(&app, "/post/feed").status(), 200);

    root.rewrite_manifest("post", "routes: [ { pattern: \n", 5);
    assert_eq!(get(&app, "/post/feed").body_string(), "index");
}

#[test]
fn test_broken_manifest_without_previous_is_not_found() {
    let root = AppRoot::new();
    root.write("controllers/post.yaml", "actions: [index\n");
    let app = App::new(root.settings()).with_manifests(ActionLibrary::new());
    assert_eq!(get(&app, "/post/index").status(), 404);
}

#[test]
fn test_manifest_actions_fall_back_to_echo() {
    let root = AppRoot::new();
    root.write(
        "controllers/post.yaml",
        "restful:\n  except: destroy\nactions: [index, show, edit]\n",
    );
    let app = App::new(root.settings()).with_manifests(ActionLibrary::new());

    let response = get(&app, "/post/7/edit");
    assert_eq!(response.header("Content-Type"), Some("application/json"));
    let echo: serde_json::Value = serde_json::from_str(&response.body_string()).unwrap();
    assert_eq!(echo["controller"], "post");
    assert_eq!(echo["action"], "edit");
    assert_eq!(echo["params"]["id"], "7");
    assert_eq!(echo["format"], "html");

    // no DELETE rule: falls through to the default rule, `7` is no action
    let response = app.call(Request::new(Method::DELETE, "/post/7"));
    assert_eq!(response.status(), 404);
}

#[test]
fn test_manifest_route_dump() {
    let root = AppRoot::new();
    root.write(
        "controllers/post.yaml",
        r#"
routes:
  - { verb: get, pattern: "/feed", action: index }
  - { verb: post, pattern: "/feed", action: create }
actions: [index, create]
"#,
    );
    let app = App::new(root.settings()).with_manifests(ActionLibrary::new());
    let routes = app.controller("post").unwrap().router().describe_routes();
    assert!(routes[0].starts_with("GET"), "{routes:?}");
    assert!(routes.iter().any(|r| r.starts_with("POST")));
    assert!(routes.last().unwrap().contains("/:action/?:id?.?:format?"));
}
