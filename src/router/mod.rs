//! # Router Module
//!
//! Pattern routing for controllers. Every controller owns one [`Router`];
//! the request path is matched against it after the leading controller
//! segment has been stripped (`/post/edit/42` is matched as `/edit/42`).
//!
//! ## Route mini-language
//!
//! ```text
//! "/hello"              literal
//! "/hello/:id"          named parameter         -> params["id"]
//! "/hello/*/world/*"    wildcard parameters     -> params["wildcard"] = [..]
//! "/hello.?:format?"    optional pieces         -> params["format"] if present
//! Regex                 used as-is              -> params["captures"] only
//! ```
//!
//! ## Precedence
//!
//! Newest rule first within a verb, then the `any` rules (also newest
//! first), then the two built-in defaults:
//!
//! ```text
//! any "/"                         => index
//! any "/:action/?:id?.?:format?"  => params["action"]
//! ```
//!
//! ## Example
//!
//! ```rust
//! use dio::params::Params;
//! use dio::router::{Router, Verb};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.add(Verb::Any, "/ping/*/*/:id", "ping").unwrap();
//! router.install_defaults().unwrap();
//!
//! let mut params = Params::new();
//! let action = router
//!     .match_route(&Method::GET, "/post/ping/hello/world/42", &mut params)
//!     .unwrap();
//! assert_eq!(action, "ping");
//! assert_eq!(params.wildcard(), vec!["hello", "world"]);
//! assert_eq!(params.get_str("id"), Some("42"));
//! ```

mod core;
pub mod pattern;
pub mod table;

pub use core::{controller_name, strip_controller, Router, DEFAULT_ACTION_PATTERN};
pub use pattern::{compile, CompiledPattern, PatternError, RoutePattern};
pub use table::{Resolver, RouteTable, Rule, RuleAction, Verb};
