//! # dio
//!
//! **dio** is a small request-dispatch engine: an ordered table of pattern
//! routes per controller, before/after hooks with action filters, early
//! exit with a positional reply, and automatic rendering when an action
//! leaves the response alone.
//!
//! ## Architecture
//!
//! - **[`router`]** - route mini-language (`:name`, `*`, `?`), per-verb rule
//!   tables and the default `/:action/:id.:format` rules
//! - **[`controller`]** - controller definitions, the builder DSL, hooks,
//!   YAML manifests and the lock-free registry
//! - **[`dispatcher`]** - the per-request lifecycle: route, hooks, action,
//!   auto-render
//! - **[`response`]** - the response value, early-exit replies and error pages
//! - **[`app`]** - request entry point: static files, controller selection,
//!   failure salvage
//! - **[`server`]** - HTTP/1.1 adapter over `tiny_http`
//! - **[`hot_reload`]** - reloads controller manifests when they change
//! - **[`config`]** / **[`logging`]** - settings and `tracing` setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as HttpServer<br/>(tiny_http)
//!     participant App
//!     participant Registry as ControllerRegistry
//!     participant Dispatcher
//!     participant Router
//!     participant Action
//!
//!     Client->>Server: GET /post/show/7.json
//!     Server->>App: call(Request)
//!     App->>App: public/ file? serve it
//!     App->>Registry: "post" (reloading post.yaml if newer)
//!     App->>Dispatcher: dispatch(def, controller)
//!     Dispatcher->>Router: match "/show/7.json"
//!     Router-->>Dispatcher: "show", {id: 7, format: json}
//!     Dispatcher->>Action: before hooks, show, after hooks
//!     alt done(reply)
//!         Action-->>App: Halt::Done(reply)
//!         App->>App: apply reply
//!     else error
//!         Action-->>App: Halt::Fail(err)
//!         App->>App: salvage into error page
//!     end
//!     App-->>Server: (status, headers, body)
//!     Server-->>Client: HTTP response + X-Request-Id
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use dio::{App, ControllerBuilder, HookScope, Request, Settings};
//! use http::Method;
//!
//! let app = App::new(Settings::default());
//! app.register(
//!     ControllerBuilder::new("post")
//!         .get("/:id/comments", "comments")
//!         .before("load", HookScope::only(["comments"]))
//!         .private_action("load", |c| {
//!             c.assign("loaded", true);
//!             Ok(())
//!         })
//!         .action("comments", |c| {
//!             let id = c.params.get_str("id").unwrap_or_default().to_string();
//!             c.response.set_body([format!("comments for {id}")]);
//!             Ok(())
//!         })
//!         .build()
//!         .unwrap(),
//! );
//!
//! let response = app.call(Request::new(Method::GET, "/post/7/comments"));
//! assert_eq!(response.body_string(), "comments for 7");
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod echo;
pub mod error;
pub mod hot_reload;
pub mod ids;
pub mod logging;
pub mod params;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod static_files;
pub mod views;

pub use app::App;
pub use config::Settings;
pub use controller::{
    ActionLibrary, Controller, ControllerBuilder, ControllerDef, ControllerRegistry, HookScope,
};
pub use dispatcher::Dispatcher;
pub use error::{ActionResult, DispatchError, Fault, Halt};
pub use params::Params;
pub use request::Request;
pub use response::{done, Reply, ReplyValue, Response};
pub use router::{Router, Verb};
