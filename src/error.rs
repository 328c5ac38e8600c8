//! # Error Module
//!
//! Failure taxonomy for routing and dispatch, and the [`Halt`] signal that
//! actions and hooks use to leave the pipeline early.
//!
//! Two very different things travel up the call chain as `Err(Halt)`:
//!
//! - [`Halt::Done`] - an explicit "respond now" reply. Not an error: the
//!   reply is applied to the response as-is.
//! - [`Halt::Fail`] - a [`DispatchError`]. NotFound conditions become a
//!   404; everything else is salvaged into a 4xx/5xx HTML error page.
//!
//! Keeping them as separate variants means a reply can never be mistaken
//! for a fault, even though both short-circuit the remaining hooks.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Once;

use crate::response::Reply;

/// An unhandled failure raised by an action, a hook, or the loader.
///
/// `kind` names the failure (the short type name of the original error, or
/// `Panic`), `message` is its display text and `trace` is the diagnostic
/// text appended to 5xx pages when backtraces are enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: String,
    pub message: String,
    pub trace: Option<String>,
}

impl Fault {
    /// Create a fault with an explicit kind and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: captured_backtrace(),
        }
    }

    /// Build a fault from a typed error, walking its `source()` chain.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let mut trace = String::new();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push_str("caused by: ");
            trace.push_str(&cause.to_string());
            trace.push('\n');
            source = cause.source();
        }
        if let Some(bt) = captured_backtrace() {
            trace.push_str(&bt);
        }
        Self {
            kind: short_type_name::<E>().to_string(),
            message: err.to_string(),
            trace: if trace.is_empty() { None } else { Some(trace) },
        }
    }

    /// Build a fault from an `anyhow::Error`, keeping its context chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let mut trace = err
            .chain()
            .skip(1)
            .map(|c| format!("caused by: {c}\n"))
            .collect::<String>();
        if let Some(bt) = captured_backtrace() {
            trace.push_str(&bt);
        }
        Self {
            kind: "Error".to_string(),
            message: err.to_string(),
            trace: if trace.is_empty() { None } else { Some(trace) },
        }
    }

    /// Build a fault from a caught panic payload.
    ///
    /// The trace is the one recorded by the panic hook at the panic site,
    /// see [`install_panic_hook`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self {
            kind: "Panic".to_string(),
            message,
            trace: take_panic_site(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

thread_local! {
    static CAPTURE_TRACES: Cell<bool> = const { Cell::new(false) };
    static PANIC_SITE: RefCell<Option<String>> = const { RefCell::new(None) };
}

struct RestoreCapture(bool);

impl Drop for RestoreCapture {
    fn drop(&mut self) {
        let previous = self.0;
        CAPTURE_TRACES.with(|c| c.set(previous));
    }
}

/// Run `f` with fault traces captured on this thread when `enabled`.
///
/// Faults created inside `f` (and panics caught by the dispatcher) carry
/// a backtrace regardless of `RUST_BACKTRACE`; outside, they carry none.
pub fn with_fault_traces<R>(enabled: bool, f: impl FnOnce() -> R) -> R {
    let previous = CAPTURE_TRACES.with(|c| c.replace(enabled));
    let _restore = RestoreCapture(previous);
    f()
}

fn capturing() -> bool {
    CAPTURE_TRACES.try_with(Cell::get).unwrap_or(false)
}

fn captured_backtrace() -> Option<String> {
    capturing().then(|| Backtrace::force_capture().to_string())
}

/// Chain a process-wide panic hook that records the panic location and
/// backtrace while fault traces are enabled. The previous hook still runs.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if capturing() {
                let site = info
                    .location()
                    .map(|l| format!("panicked at {l}\n"))
                    .unwrap_or_default();
                let trace = format!("{site}{}", Backtrace::force_capture());
                PANIC_SITE.with(|p| *p.borrow_mut() = Some(trace));
            }
            previous(info);
        }));
    });
}

/// Forget any panic site recorded earlier on this thread.
pub(crate) fn clear_panic_site() {
    PANIC_SITE.with(|p| *p.borrow_mut() = None);
}

fn take_panic_site() -> Option<String> {
    PANIC_SITE.try_with(|p| p.borrow_mut().take()).ok().flatten()
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Everything that can go wrong between route resolution and the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No rule matched, or a deferred resolver declined the request.
    RouteNotFound { method: String, path: String },
    /// No controller is registered or declared under this name.
    ControllerNotFound { name: String },
    /// The resolved action is unknown or not public.
    ActionNotInvokable { action: String },
    /// Auto-render needed a template that does not exist.
    RenderingMisconfigured {
        controller: String,
        action: String,
        format: String,
    },
    /// A reply value did not fit its position.
    InvalidReply { position: usize, reason: String },
    /// Anything else raised while resolving or invoking.
    Unhandled(Fault),
}

impl DispatchError {
    /// True for the conditions that map to a 404 page.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DispatchError::RouteNotFound { .. }
                | DispatchError::ControllerNotFound { .. }
                | DispatchError::ActionNotInvokable { .. }
        )
    }

    /// Short name used in error pages (`<status> - <kind>: <message>`).
    pub fn kind(&self) -> &str {
        match self {
            DispatchError::RouteNotFound { .. }
            | DispatchError::ControllerNotFound { .. }
            | DispatchError::ActionNotInvokable { .. } => "NotFound",
            DispatchError::RenderingMisconfigured { .. } => "RenderingMisconfigured",
            DispatchError::InvalidReply { .. } => "InvalidReply",
            DispatchError::Unhandled(fault) => &fault.kind,
        }
    }

    /// Message text without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            DispatchError::RouteNotFound { method, path } => {
                format!("no route matches {method} {path}")
            }
            DispatchError::ControllerNotFound { name } => {
                format!("controller '{name}' is not loaded")
            }
            DispatchError::ActionNotInvokable { action } => {
                format!("action '{action}' is not a public action")
            }
            DispatchError::RenderingMisconfigured {
                controller,
                action,
                format,
            } => format!("Missing {format} template for {controller}#{action}"),
            DispatchError::InvalidReply { position, reason } => {
                format!("reply value at position {position} {reason}")
            }
            DispatchError::Unhandled(fault) => fault.message.clone(),
        }
    }

    /// Diagnostic trace, if any.
    pub fn trace(&self) -> Option<&str> {
        match self {
            DispatchError::Unhandled(fault) => fault.trace.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for DispatchError {}

/// Non-local exit out of an action or hook.
#[derive(Debug)]
pub enum Halt {
    /// Respond now with this reply; remaining hooks are skipped.
    Done(Reply),
    /// Abort with a failure.
    Fail(DispatchError),
}

impl Halt {
    /// Wrap a typed error as an unhandled fault.
    pub fn fault<E>(err: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Halt::Fail(DispatchError::Unhandled(Fault::from_error(&err)))
    }
}

impl From<DispatchError> for Halt {
    fn from(err: DispatchError) -> Self {
        Halt::Fail(err)
    }
}

impl From<Fault> for Halt {
    fn from(fault: Fault) -> Self {
        Halt::Fail(DispatchError::Unhandled(fault))
    }
}

impl From<anyhow::Error> for Halt {
    fn from(err: anyhow::Error) -> Self {
        Halt::Fail(DispatchError::Unhandled(Fault::from_anyhow(&err)))
    }
}

/// Return type of actions and hooks.
pub type ActionResult = Result<(), Halt>;

/// `?`-friendly conversion of typed errors into faults.
///
/// ```rust
/// use dio::error::{ActionResult, OrFault};
///
/// fn parse_id(raw: &str) -> ActionResult {
///     let _id: u32 = raw.parse().or_fault()?;
///     Ok(())
/// }
/// assert!(parse_id("42").is_ok());
/// assert!(parse_id("x").is_err());
/// ```
pub trait OrFault<T> {
    fn or_fault(self) -> Result<T, Halt>;
}

impl<T, E> OrFault<T> for Result<T, E>
where
    E: std::error::Error + 'static,
{
    fn or_fault(self) -> Result<T, Halt> {
        self.map_err(Halt::fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "kaboom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn test_fault_kind_is_short_type_name() {
        let fault = Fault::from_error(&Boom);
        assert_eq!(fault.kind, "Boom");
        assert_eq!(fault.message, "kaboom");
    }

    #[test]
    fn test_parse_error_kind() {
        let err = "x".parse::<u32>().unwrap_err();
        let fault = Fault::from_error(&err);
        assert_eq!(fault.kind, "ParseIntError");
    }

    #[test]
    fn test_not_found_classification() {
        let e = DispatchError::RouteNotFound {
            method: "GET".into(),
            path: "/x".into(),
        };
        assert!(e.is_not_found());
        assert_eq!(e.kind(), "NotFound");
        let e = DispatchError::RenderingMisconfigured {
            controller: "post".into(),
            action: "index".into(),
            format: "html".into(),
        };
        assert!(!e.is_not_found());
        assert_eq!(e.message(), "Missing html template for post#index");
    }

    #[test]
    fn test_panic_payloads() {
        let fault = Fault::from_panic(Box::new("static message"));
        assert_eq!(fault.kind, "Panic");
        assert_eq!(fault.message, "static message");
        let fault = Fault::from_panic(Box::new(String::from("owned")));
        assert_eq!(fault.message, "owned");
    }

    #[test]
    fn test_fault_traces_follow_the_flag() {
        let traced = with_fault_traces(true, || Fault::new("IOError", "disk full"));
        assert!(traced.trace.is_some_and(|t| !t.is_empty()));

        let plain = with_fault_traces(false, || Fault::new("IOError", "disk full"));
        assert_eq!(plain.trace, None);
        assert_eq!(Fault::new("IOError", "disk full").trace, None);
    }

    #[test]
    fn test_fault_traces_flag_is_restored() {
        with_fault_traces(true, || {
            with_fault_traces(false, || assert!(!capturing()));
            assert!(capturing());
        });
        assert!(!capturing());
    }

    #[test]
    fn test_panic_site_is_recorded() {
        install_panic_hook();
        let payload = with_fault_traces(true, || {
            clear_panic_site();
            std::panic::catch_unwind(|| panic!("kaboom")).unwrap_err()
        });
        let fault = Fault::from_panic(payload);
        let trace = fault.trace.unwrap();
        assert!(trace.starts_with("panicked at "), "{trace}");
        assert!(trace.contains("error.rs"), "{trace}");
    }

    #[test]
    fn test_done_is_not_a_fault() {
        let halt = Halt::Done(Reply::default());
        assert!(matches!(halt, Halt::Done(_)));
        let halt: Halt = DispatchError::ControllerNotFound { name: "x".into() }.into();
        assert!(matches!(halt, Halt::Fail(ref e) if e.is_not_found()));
    }
}
