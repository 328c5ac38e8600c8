//! Dispatcher core - the per-request controller lifecycle.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::controller::{ActionFn, Controller, ControllerDef, HookFn, HookPhase, HookTarget};
use crate::error::{clear_panic_site, install_panic_hook, ActionResult, DispatchError, Fault, Halt};
use crate::views::{find_template, MiniJinjaRenderer, TemplateRenderer};

/// Runs routing, hooks, the action and auto-render for one request.
#[derive(Clone)]
pub struct Dispatcher {
    renderer: Arc<dyn TemplateRenderer>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(MiniJinjaRenderer))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("template_extensions", &self.renderer.extensions())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { renderer }
    }

    /// Drive `controller` through the lifecycle of `def`:
    ///
    /// 1. resolve the action from the route table,
    /// 2. run `before` hooks that admit it,
    /// 3. refuse anything that is not a public action,
    /// 4. invoke the action,
    /// 5. auto-render if enabled and the response is untouched,
    /// 6. run `after` hooks.
    ///
    /// `Err(Halt::Done)` from any step skips the rest, after hooks included.
    ///
    /// # Errors
    ///
    /// The [`Halt`] that ended the lifecycle early.
    pub fn dispatch(&self, def: &ControllerDef, controller: &mut Controller) -> ActionResult {
        let action = def.router().match_route(
            &controller.request.method,
            &controller.request.path,
            &mut controller.params,
        )?;
        controller.set_action(&action);

        self.run_hooks(def, controller, HookPhase::Before, &action)?;

        let Some(entry) = def.action(&action).filter(|a| a.public) else {
            warn!(
                request_id = %controller.request.id,
                controller = %def.name(),
                action = %action,
                "Action is not a public action"
            );
            return Err(DispatchError::ActionNotInvokable { action }.into());
        };

        info!(
            request_id = %controller.request.id,
            controller = %def.name(),
            action = %action,
            params = ?controller.params,
            "Action execution start"
        );
        let started = Instant::now();
        invoke_action(&entry.handler, controller, def.name(), &action)?;
        info!(
            request_id = %controller.request.id,
            controller = %def.name(),
            action = %action,
            status = controller.response.status(),
            execution_time_us = started.elapsed().as_micros(),
            "Action execution complete"
        );

        if controller.settings().auto_render && controller.response.is_untouched() {
            self.auto_render(def, controller, &action)?;
        }

        self.run_hooks(def, controller, HookPhase::After, &action)
    }

    fn run_hooks(
        &self,
        def: &ControllerDef,
        controller: &mut Controller,
        phase: HookPhase,
        action: &str,
    ) -> ActionResult {
        for hook in def.hooks().for_action(phase, action) {
            debug!(
                request_id = %controller.request.id,
                controller = %def.name(),
                action = %action,
                phase = %phase,
                hook = ?hook.target,
                "Invoking hook"
            );
            match &hook.target {
                HookTarget::Named(name) => {
                    let Some(entry) = def.action(name) else {
                        return Err(Fault::new(
                            "HookNotFound",
                            format!("{phase} hook '{name}' is not an action of '{}'", def.name()),
                        )
                        .into());
                    };
                    invoke_action(&entry.handler, controller, def.name(), name)?;
                }
                HookTarget::Inline(f) => invoke_hook(f, controller, def.name(), action)?,
            }
        }
        Ok(())
    }

    fn auto_render(
        &self,
        def: &ControllerDef,
        controller: &mut Controller,
        action: &str,
    ) -> ActionResult {
        let format = controller.format().to_string();
        match format.as_str() {
            "json" => {
                let body = serde_json::Value::Object(controller.assigns().clone()).to_string();
                controller
                    .response
                    .set_header("Content-Type", "application/json");
                controller.response.set_body([body]);
            }
            "html" => {
                let views = controller.settings().views_path();
                let Some(path) = find_template(
                    &views,
                    def.name(),
                    action,
                    "html",
                    self.renderer.extensions(),
                ) else {
                    return Err(DispatchError::RenderingMisconfigured {
                        controller: def.name().to_string(),
                        action: action.to_string(),
                        format: "html".to_string(),
                    }
                    .into());
                };
                debug!(template = %path.display(), "Auto-rendering template");
                let html = self.renderer.render(&path, controller)?;
                controller.response.set_body([html]);
            }
            other => {
                debug!(format = %other, "No auto-render for format");
            }
        }
        Ok(())
    }
}

fn invoke_action(
    handler: &ActionFn,
    controller: &mut Controller,
    controller_name: &str,
    name: &str,
) -> ActionResult {
    guarded(controller_name, name, || handler(controller))
}

fn invoke_hook(
    hook: &HookFn,
    controller: &mut Controller,
    controller_name: &str,
    action: &str,
) -> ActionResult {
    guarded(controller_name, action, || hook(controller))
}

/// Run `f`, turning a panic into a `Panic` fault.
fn guarded<F>(controller: &str, name: &str, f: F) -> ActionResult
where
    F: FnOnce() -> ActionResult,
{
    install_panic_hook();
    clear_panic_site();
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let fault = Fault::from_panic(payload);
            error!(
                controller = %controller,
                action = %name,
                panic_message = %fault.message,
                backtrace = fault.trace.as_deref().unwrap_or(""),
                "Action panicked"
            );
            Err(Halt::from(fault))
        }
    }
}
