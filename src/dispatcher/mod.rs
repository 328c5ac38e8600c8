//! # Dispatcher Module
//!
//! Drives one request through a loaded controller:
//!
//! ```text
//! Resolving -> BeforeHooks -> Invoking -> AutoRender? -> AfterHooks -> Done
//!     |             |             |            |              |
//!     +-------------+-------------+------------+--------------+--> Halt
//! ```
//!
//! Any step may end the lifecycle with a [`Halt`](crate::error::Halt):
//! `Done(reply)` for an explicit early reply, `Fail(err)` for a failure.
//! Both unwind straight to the caller, skipping the remaining steps.
//!
//! ## Auto-render
//!
//! When auto-render is enabled and the action left the response untouched
//! (status 200, empty body), the dispatcher synthesizes a body from the
//! request format:
//!
//! - `json`: the controller's assigns as one JSON object,
//!   `Content-Type: application/json`;
//! - `html`: `<views>/<controller>/<action>.html.<ext>` rendered through
//!   the [`TemplateRenderer`](crate::views::TemplateRenderer); a missing
//!   template is a `RenderingMisconfigured` failure (500, not 404);
//! - anything else: no body.
//!
//! ## Panics
//!
//! Panics in actions and hooks are caught and reported as faults of kind
//! `Panic`; the worker thread survives.

mod core;

pub use core::Dispatcher;
