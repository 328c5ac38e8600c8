//! # App
//!
//! Entry point for one request: `Request` in, `(status, headers, body)`
//! out. The transport adapter calls [`App::call`] once per request from
//! any number of threads.
//!
//! 1. GET/HEAD requests for an existing file under `<root>/public` are
//!    served directly.
//! 2. The first path segment names the controller (`home` for `/`); it is
//!    stored under `params["controller"]`.
//! 3. The controller's manifest, if any, is (re)loaded when it changed on
//!    disk; the current definition is taken from the registry.
//! 4. The [`Dispatcher`] runs the lifecycle; an early reply is applied to
//!    the response, a failure is salvaged into an error page.
//!
//! ```rust
//! use dio::{App, ControllerBuilder, Request, Settings};
//! use dio::response::done;
//! use dio::reply;
//! use http::Method;
//!
//! let app = App::new(Settings::default());
//! app.register(
//!     ControllerBuilder::new("home")
//!         .action("index", |_c| done(reply![["hello", "world"]]))
//!         .build()
//!         .unwrap(),
//! );
//!
//! let response = app.call(Request::new(Method::GET, "/"));
//! assert_eq!(response.status(), 200);
//! assert_eq!(response.body_string(), "helloworld");
//! ```

use std::sync::Arc;
use tracing::{error, info, info_span, warn};

use crate::config::Settings;
use crate::controller::{ActionLibrary, Controller, ControllerDef, ControllerRegistry, ManifestLoader};
use crate::dispatcher::Dispatcher;
use crate::error::{with_fault_traces, DispatchError, Halt};
use crate::params::CONTROLLER;
use crate::request::Request;
use crate::response::{apply_reply, salvage, Response};
use crate::router::controller_name;
use crate::static_files::StaticFiles;
use crate::views::TemplateRenderer;

/// Controller used for `/`.
pub const HOME_CONTROLLER: &str = "home";

pub struct App {
    settings: Arc<Settings>,
    registry: Arc<ControllerRegistry>,
    loader: Option<Arc<ManifestLoader>>,
    dispatcher: Dispatcher,
    static_files: StaticFiles,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let static_files = StaticFiles::new(settings.public_path());
        Self {
            settings: Arc::new(settings),
            registry: Arc::new(ControllerRegistry::new()),
            loader: None,
            dispatcher: Dispatcher::default(),
            static_files,
        }
    }

    /// Replace the template renderer used by HTML auto-render.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.dispatcher = Dispatcher::new(renderer);
        self
    }

    /// Load controllers from `<root>/<controllers>/*.yaml`, binding action
    /// bodies from `library`.
    #[must_use]
    pub fn with_manifests(mut self, library: ActionLibrary) -> Self {
        let loader = ManifestLoader::new(
            self.settings.controllers_path(),
            Arc::new(library),
            Arc::clone(&self.registry),
        );
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Register (or replace) a controller built in code.
    pub fn register(&self, def: ControllerDef) -> Arc<ControllerDef> {
        self.registry.register(def)
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ControllerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn loader(&self) -> Option<&Arc<ManifestLoader>> {
        self.loader.as_ref()
    }

    /// Current definition of `name`, refreshing its manifest first.
    ///
    /// A manifest that fails to load leaves the previous definition (if
    /// any) in service.
    ///
    /// # Errors
    ///
    /// `ControllerNotFound` when nothing usable is registered under `name`.
    pub fn controller(&self, name: &str) -> Result<Arc<ControllerDef>, DispatchError> {
        if let Some(loader) = &self.loader {
            if let Err(e) = loader.refresh(name) {
                error!(controller = %name, error = %e, "Controller manifest failed to load");
            }
        }
        self.registry
            .get(name)
            .ok_or_else(|| DispatchError::ControllerNotFound {
                name: name.to_string(),
            })
    }

    /// Handle one request.
    pub fn call(&self, request: Request) -> Response {
        let request = request.with_default_format(&self.settings.default_format);
        let span = info_span!(
            "request",
            request_id = %request.id,
            method = %request.method,
            path = %request.path,
        );
        let _enter = span.enter();

        if request.is_get_or_head() {
            if let Some(response) = self.serve_static(&request) {
                return response;
            }
        }

        let name = controller_name(&request.path)
            .unwrap_or(HOME_CONTROLLER)
            .to_string();
        let path = request.path.clone();

        let def = match self.controller(&name) {
            Ok(def) => def,
            Err(e) => {
                let mut response = Response::default();
                self.fail(&mut response, &e, &path);
                return response;
            }
        };

        let mut params = request.params();
        params.insert(CONTROLLER, name.as_str());
        let mut controller = Controller::new(name, request, params, Arc::clone(&self.settings));

        let outcome = with_fault_traces(self.settings.show_backtrace, || {
            self.dispatcher.dispatch(&def, &mut controller)
        });
        match outcome {
            Ok(()) => {}
            Err(Halt::Done(reply)) => {
                if let Err(e) = apply_reply(&mut controller.response, reply) {
                    self.fail(&mut controller.response, &e, &path);
                }
            }
            Err(Halt::Fail(e)) => self.fail(&mut controller.response, &e, &path),
        }

        let response = controller.into_response();
        info!(status = response.status(), "Request complete");
        response
    }

    fn fail(&self, response: &mut Response, err: &DispatchError, path: &str) {
        if err.is_not_found() {
            warn!(error = %err, "Request not found");
        } else {
            error!(
                kind = %err.kind(),
                error = %err.message(),
                status = response.status(),
                "Request failed"
            );
        }
        salvage(response, err, path, self.settings.show_backtrace);
    }

    fn serve_static(&self, request: &Request) -> Option<Response> {
        let file = self.static_files.resolve(&request.path)?;
        match self.static_files.load(&request.path) {
            Ok((bytes, content_type)) => {
                info!(file = %file.display(), "Serving static file");
                let mut response = Response::default();
                response.set_header("Content-Type", content_type);
                response.set_header("Content-Disposition", "inline");
                if request.method != http::Method::HEAD {
                    response.set_body([bytes]);
                }
                Some(response)
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "Static file not readable");
                None
            }
        }
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("manifests", &self.loader.as_ref().map(|l| l.dir().to_path_buf()))
            .finish_non_exhaustive()
    }
}
