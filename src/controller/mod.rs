//! # Controller Module
//!
//! A controller is a named bundle of route rules, hooks and actions. The
//! bundle ([`ControllerDef`]) is built once per (re)load and shared
//! read-only between requests; every request gets its own [`Controller`]
//! instance carrying the request, the response under construction, the
//! params and the values the action exposes for rendering.
//!
//! ## Declaring a controller
//!
//! ```rust
//! use dio::controller::{ControllerBuilder, HookScope, RestfulScope};
//! use dio::response::done;
//! use dio::reply;
//!
//! let post = ControllerBuilder::new("post")
//!     .any("/ping/*/*/:id", "ping")
//!     .restful(RestfulScope::except(["destroy"]))
//!     .before("authenticate", HookScope::except(["index"]))
//!     .private_action("authenticate", |_c| Ok(()))
//!     .action("index", |c| {
//!         c.assign("posts", serde_json::json!([]));
//!         Ok(())
//!     })
//!     .action("ping", |_c| done(reply!["pong"]))
//!     .build()
//!     .unwrap();
//!
//! assert!(post.is_public("ping"));
//! assert!(!post.is_public("authenticate"));
//! ```

pub mod hooks;
pub mod manifest;
pub mod registry;

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::ActionResult;
use crate::params::Params;
use crate::request::Request;
use crate::response::Response;
use crate::router::{PatternError, Resolver, RoutePattern, Router, RuleAction, Verb};

pub use hooks::{HookFn, HookPhase, HookRegistry, HookScope, HookSpec, HookTarget};
pub use manifest::{ActionLibrary, Manifest, ManifestError, ManifestLoader};
pub use registry::ControllerRegistry;

/// Action or hook body.
pub type ActionFn = Arc<dyn Fn(&mut Controller) -> ActionResult + Send + Sync>;

/// Filter for the RESTful shortcut; same `only` / `except` rules as hooks.
pub type RestfulScope = HookScope;

/// The seven RESTful actions, in declaration order.
pub const RESTFUL_ACTIONS: [&str; 7] = ["index", "new", "create", "show", "edit", "update", "destroy"];

/// Per-request controller instance.
pub struct Controller {
    name: String,
    pub request: Request,
    pub response: Response,
    pub params: Params,
    settings: Arc<Settings>,
    assigns: Map<String, Value>,
    action: Option<String>,
}

impl Controller {
    pub fn new(
        name: impl Into<String>,
        request: Request,
        params: Params,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            name: name.into(),
            request,
            response: Response::default(),
            params,
            settings,
            assigns: Map::new(),
            action: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolved action, once routing has run.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub(crate) fn set_action(&mut self, action: &str) {
        self.action = Some(action.to_string());
    }

    /// Format detected from the request path extension.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.request.format
    }

    /// Expose a value to auto-render (JSON key or template variable).
    pub fn assign(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.assigns.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn assigns(&self) -> &Map<String, Value> {
        &self.assigns
    }

    /// Tear down into the finished response.
    #[must_use]
    pub fn into_response(self) -> Response {
        self.response
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field("action", &self.action)
            .field("params", &self.params)
            .field("status", &self.response.status())
            .finish_non_exhaustive()
    }
}

/// A registered action.
#[derive(Clone)]
pub struct ActionEntry {
    pub handler: ActionFn,
    /// Only public actions can be routed to; private ones serve as hooks.
    pub public: bool,
}

/// Loaded controller: router, hooks and action table.
pub struct ControllerDef {
    name: String,
    router: Router,
    hooks: HookRegistry,
    actions: HashMap<String, ActionEntry>,
}

impl ControllerDef {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ActionEntry> {
        self.actions.get(name)
    }

    #[must_use]
    pub fn is_public(&self, name: &str) -> bool {
        self.actions.get(name).is_some_and(|a| a.public)
    }

    /// Action names, sorted.
    #[must_use]
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ControllerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDef")
            .field("name", &self.name)
            .field("router", &self.router)
            .field("hooks", &self.hooks)
            .field("actions", &self.action_names())
            .finish()
    }
}

enum RouteDecl {
    Rule(Verb, RoutePattern, RuleAction),
    Restful(RestfulScope),
}

/// Collects route, hook and action declarations; [`build`](Self::build)
/// compiles them into a [`ControllerDef`].
pub struct ControllerBuilder {
    name: String,
    routes: Vec<RouteDecl>,
    hooks: HookRegistry,
    actions: HashMap<String, ActionEntry>,
}

impl ControllerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
            hooks: HookRegistry::new(),
            actions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn route(
        mut self,
        verb: Verb,
        pattern: impl Into<RoutePattern>,
        action: impl Into<RuleAction>,
    ) -> Self {
        self.routes
            .push(RouteDecl::Rule(verb, pattern.into(), action.into()));
        self
    }

    #[must_use]
    pub fn get(self, pattern: impl Into<RoutePattern>, action: impl Into<RuleAction>) -> Self {
        self.route(Verb::get(), pattern, action)
    }

    #[must_use]
    pub fn post(self, pattern: impl Into<RoutePattern>, action: impl Into<RuleAction>) -> Self {
        self.route(Verb::post(), pattern, action)
    }

    #[must_use]
    pub fn put(self, pattern: impl Into<RoutePattern>, action: impl Into<RuleAction>) -> Self {
        self.route(Verb::put(), pattern, action)
    }

    #[must_use]
    pub fn delete(self, pattern: impl Into<RoutePattern>, action: impl Into<RuleAction>) -> Self {
        self.route(Verb::delete(), pattern, action)
    }

    #[must_use]
    pub fn any(self, pattern: impl Into<RoutePattern>, action: impl Into<RuleAction>) -> Self {
        self.route(Verb::Any, pattern, action)
    }

    /// Rule whose action name is computed from the params at match time.
    #[must_use]
    pub fn resolve<F>(self, verb: Verb, pattern: impl Into<RoutePattern>, resolver: F) -> Self
    where
        F: Fn(&Params) -> Option<String> + Send + Sync + 'static,
    {
        let resolver: Resolver = Arc::new(resolver);
        self.route(verb, pattern, RuleAction::Resolver(resolver))
    }

    /// RESTful shortcut for the seven conventional actions.
    #[must_use]
    pub fn restful(mut self, scope: RestfulScope) -> Self {
        self.routes.push(RouteDecl::Restful(scope));
        self
    }

    #[must_use]
    pub fn before(mut self, target: impl Into<HookTarget>, scope: HookScope) -> Self {
        self.hooks.add(HookPhase::Before, target.into(), scope);
        self
    }

    #[must_use]
    pub fn after(mut self, target: impl Into<HookTarget>, scope: HookScope) -> Self {
        self.hooks.add(HookPhase::After, target.into(), scope);
        self
    }

    /// Register a routable action.
    #[must_use]
    pub fn action<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Controller) -> ActionResult + Send + Sync + 'static,
    {
        self.action_entry(name, Arc::new(handler), true)
    }

    /// Register an action that can only be used as a named hook.
    #[must_use]
    pub fn private_action<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Controller) -> ActionResult + Send + Sync + 'static,
    {
        self.action_entry(name, Arc::new(handler), false)
    }

    #[must_use]
    pub fn action_entry(mut self, name: impl Into<String>, handler: ActionFn, public: bool) -> Self {
        self.actions
            .insert(name.into(), ActionEntry { handler, public });
        self
    }

    /// Compile every declared rule (newest first) and append the defaults.
    ///
    /// # Errors
    ///
    /// The first [`PatternError`] among the declared routes.
    pub fn build(self) -> Result<ControllerDef, PatternError> {
        let mut router = Router::new();
        for decl in self.routes {
            match decl {
                RouteDecl::Rule(verb, pattern, action) => router.add(verb, pattern, action)?,
                RouteDecl::Restful(scope) => add_restful(&mut router, &scope)?,
            }
        }
        router.install_defaults()?;

        Ok(ControllerDef {
            name: self.name,
            router,
            hooks: self.hooks,
            actions: self.actions,
        })
    }
}

/// Rules are added most generic first so that, with newest-first
/// evaluation, `/new` and `/:id/edit` are tried before `/:id`.
fn add_restful(router: &mut Router, scope: &RestfulScope) -> Result<(), PatternError> {
    let rules = [
        (Verb::delete(), "/:id", "destroy"),
        (Verb::put(), "/:id", "update"),
        (Verb::get(), "/:id", "show"),
        (Verb::get(), "/:id/edit", "edit"),
        (Verb::post(), "/", "create"),
        (Verb::get(), "/new", "new"),
        (Verb::get(), "/", "index"),
    ];
    for (verb, pattern, action) in rules {
        if scope.admits(action) {
            router.add(verb, pattern, action)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn resolve(def: &ControllerDef, method: Method, path: &str) -> Option<String> {
        let mut params = Params::new();
        def.router().match_route(&method, path, &mut params).ok()
    }

    #[test]
    fn test_restful_routes() {
        let def = ControllerBuilder::new("post")
            .restful(RestfulScope::all())
            .build()
            .unwrap();
        assert_eq!(resolve(&def, Method::GET, "/post").as_deref(), Some("index"));
        assert_eq!(resolve(&def, Method::GET, "/post/new").as_deref(), Some("new"));
        assert_eq!(resolve(&def, Method::POST, "/post").as_deref(), Some("create"));
        assert_eq!(resolve(&def, Method::GET, "/post/42").as_deref(), Some("show"));
        assert_eq!(resolve(&def, Method::GET, "/post/42/edit").as_deref(), Some("edit"));
        assert_eq!(resolve(&def, Method::PUT, "/post/42").as_deref(), Some("update"));
        assert_eq!(resolve(&def, Method::DELETE, "/post/42").as_deref(), Some("destroy"));
    }

    #[test]
    fn test_restful_except_destroy() {
        let def = ControllerBuilder::new("post")
            .restful(RestfulScope::except(["destroy"]))
            .build()
            .unwrap();
        // six restful rules plus the two defaults
        assert_eq!(def.router().table().len(), 8);
        assert!(def
            .router()
            .table()
            .rules()
            .iter()
            .all(|r| r.verb != Verb::delete()));
    }

    #[test]
    fn test_restful_only() {
        let def = ControllerBuilder::new("post")
            .restful(RestfulScope::only(["index", "show"]))
            .build()
            .unwrap();
        assert_eq!(def.router().table().len(), 4);
    }

    #[test]
    fn test_bad_pattern_fails_build() {
        let err = ControllerBuilder::new("post").get("?bad", "x").build().unwrap_err();
        assert_eq!(err.pattern, "?bad");
    }

    #[test]
    fn test_assigns() {
        let mut c = Controller::new(
            "post",
            Request::new(Method::GET, "/post"),
            Params::new(),
            Arc::new(Settings::default()),
        );
        c.assign("title", "hello");
        assert_eq!(c.assigns()["title"], "hello");
        assert_eq!(c.format(), "html");
    }
}
