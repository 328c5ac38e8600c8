//! Before/after hooks.
//!
//! Hooks run in declaration order. A hook is either the name of an action
//! in the controller's action table (public or private) or an inline
//! closure, and is scoped to a subset of actions with `only` / `except`.

use std::fmt;
use std::sync::Arc;

use super::Controller;
use crate::error::ActionResult;

/// Inline hook body.
pub type HookFn = Arc<dyn Fn(&mut Controller) -> ActionResult + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Before,
    After,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Before => f.write_str("before"),
            HookPhase::After => f.write_str("after"),
        }
    }
}

/// What a hook runs.
#[derive(Clone)]
pub enum HookTarget {
    /// An entry of the controller's action table.
    Named(String),
    Inline(HookFn),
}

impl HookTarget {
    /// Wrap a closure.
    pub fn inline<F>(f: F) -> Self
    where
        F: Fn(&mut Controller) -> ActionResult + Send + Sync + 'static,
    {
        HookTarget::Inline(Arc::new(f))
    }
}

impl fmt::Debug for HookTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookTarget::Named(name) => write!(f, "Named({name})"),
            HookTarget::Inline(_) => f.write_str("Inline(..)"),
        }
    }
}

impl From<&str> for HookTarget {
    fn from(name: &str) -> Self {
        HookTarget::Named(name.to_string())
    }
}

impl From<String> for HookTarget {
    fn from(name: String) -> Self {
        HookTarget::Named(name)
    }
}

/// `only` / `except` action filters. Both empty admits everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookScope {
    pub only: Option<Vec<String>>,
    pub except: Vec<String>,
}

impl HookScope {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn only<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: Some(actions.into_iter().map(Into::into).collect()),
            except: Vec::new(),
        }
    }

    #[must_use]
    pub fn except<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: None,
            except: actions.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a hook with this scope runs for `action`.
    #[must_use]
    pub fn admits(&self, action: &str) -> bool {
        if let Some(only) = &self.only {
            if !only.iter().any(|a| a == action) {
                return false;
            }
        }
        !self.except.iter().any(|a| a == action)
    }
}

#[derive(Debug, Clone)]
pub struct HookSpec {
    pub phase: HookPhase,
    pub target: HookTarget,
    pub scope: HookScope,
}

/// Ordered hooks of one controller definition.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    before: Vec<HookSpec>,
    after: Vec<HookSpec>,
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, phase: HookPhase, target: HookTarget, scope: HookScope) {
        let spec = HookSpec {
            phase,
            target,
            scope,
        };
        match phase {
            HookPhase::Before => self.before.push(spec),
            HookPhase::After => self.after.push(spec),
        }
    }

    /// Hooks of `phase` that apply to `action`, in declaration order.
    pub fn for_action<'a>(
        &'a self,
        phase: HookPhase,
        action: &'a str,
    ) -> impl Iterator<Item = &'a HookSpec> + 'a {
        let hooks = match phase {
            HookPhase::Before => &self.before,
            HookPhase::After => &self.after,
        };
        hooks.iter().filter(move |h| h.scope.admits(action))
    }

    #[must_use]
    pub fn len(&self, phase: HookPhase) -> usize {
        match phase {
            HookPhase::Before => self.before.len(),
            HookPhase::After => self.after.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}
