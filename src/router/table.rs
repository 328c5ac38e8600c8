//! Ordered rule storage.
//!
//! Each verb owns its own rule sequence, plus one `any` sequence consulted
//! after the verb's own. User rules are prepended so the most recently
//! declared rule wins; the built-in defaults are appended so they can never
//! shadow a user rule.

use http::Method;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::pattern::{compile, CompiledPattern, PatternError, RoutePattern};
use crate::params::Params;

/// Deferred action resolution. Returning `None` makes the route a 404.
pub type Resolver = Arc<dyn Fn(&Params) -> Option<String> + Send + Sync>;

/// The verb a rule answers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verb {
    Only(Method),
    Any,
}

impl Verb {
    #[must_use]
    pub fn get() -> Self {
        Verb::Only(Method::GET)
    }

    #[must_use]
    pub fn post() -> Self {
        Verb::Only(Method::POST)
    }

    #[must_use]
    pub fn put() -> Self {
        Verb::Only(Method::PUT)
    }

    #[must_use]
    pub fn delete() -> Self {
        Verb::Only(Method::DELETE)
    }
}

impl From<Method> for Verb {
    fn from(m: Method) -> Self {
        Verb::Only(m)
    }
}

impl FromStr for Verb {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("any") {
            return Ok(Verb::Any);
        }
        Method::from_bytes(s.to_ascii_uppercase().as_bytes())
            .map(Verb::Only)
            .map_err(|e| PatternError {
                pattern: s.to_string(),
                message: format!("unknown verb: {e}"),
            })
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Only(m) => write!(f, "{m}"),
            Verb::Any => f.write_str("ANY"),
        }
    }
}

/// What a matched rule resolves to.
#[derive(Clone)]
pub enum RuleAction {
    Handler(String),
    Resolver(Resolver),
}

impl fmt::Debug for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Handler(name) => write!(f, "Handler({name})"),
            RuleAction::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Handler(name) => f.write_str(name),
            RuleAction::Resolver(_) => f.write_str("<resolver>"),
        }
    }
}

impl From<&str> for RuleAction {
    fn from(s: &str) -> Self {
        RuleAction::Handler(s.to_string())
    }
}

impl From<String> for RuleAction {
    fn from(s: String) -> Self {
        RuleAction::Handler(s)
    }
}

/// A compiled route rule. Immutable once in a table.
#[derive(Debug, Clone)]
pub struct Rule {
    pub verb: Verb,
    pub pattern: CompiledPattern,
    pub action: RuleAction,
}

/// Per-verb ordered rules plus the `any` bucket.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    by_verb: HashMap<Method, Vec<Rule>>,
    any: Vec<Rule>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&mut self, verb: &Verb) -> &mut Vec<Rule> {
        match verb {
            Verb::Only(m) => self.by_verb.entry(m.clone()).or_default(),
            Verb::Any => &mut self.any,
        }
    }

    /// Compile and prepend a rule.
    ///
    /// # Errors
    ///
    /// Propagates [`PatternError`] from the compiler.
    pub fn add(
        &mut self,
        verb: Verb,
        pattern: impl Into<RoutePattern>,
        action: impl Into<RuleAction>,
    ) -> Result<(), PatternError> {
        let rule = Rule {
            pattern: compile(pattern)?,
            action: action.into(),
            verb,
        };
        self.bucket(&rule.verb.clone()).insert(0, rule);
        Ok(())
    }

    /// Compile and append a rule, below everything already present.
    ///
    /// # Errors
    ///
    /// Propagates [`PatternError`] from the compiler.
    pub fn add_default(
        &mut self,
        verb: Verb,
        pattern: impl Into<RoutePattern>,
        action: impl Into<RuleAction>,
    ) -> Result<(), PatternError> {
        let rule = Rule {
            pattern: compile(pattern)?,
            action: action.into(),
            verb,
        };
        self.bucket(&rule.verb.clone()).push(rule);
        Ok(())
    }

    /// Candidate rules for `method`, in evaluation order.
    pub fn lookup<'a>(&'a self, method: &Method) -> impl Iterator<Item = &'a Rule> + 'a {
        self.by_verb
            .get(method)
            .into_iter()
            .flatten()
            .chain(self.any.iter())
    }

    /// Every rule, verb buckets first (sorted by method name), then `any`.
    #[must_use]
    pub fn rules(&self) -> Vec<&Rule> {
        let mut methods: Vec<&Method> = self.by_verb.keys().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
            .into_iter()
            .flat_map(|m| self.by_verb[m].iter())
            .chain(self.any.iter())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_verb.values().map(Vec::len).sum::<usize>() + self.any.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources<'a>(table: &'a RouteTable, m: &Method) -> Vec<&'a str> {
        table.lookup(m).map(|r| r.pattern.source()).collect()
    }

    #[test]
    fn test_add_prepends() {
        let mut t = RouteTable::new();
        t.add(Verb::get(), "/a", "a").unwrap();
        t.add(Verb::get(), "/b", "b").unwrap();
        assert_eq!(sources(&t, &Method::GET), ["/b", "/a"]);
    }

    #[test]
    fn test_defaults_stay_last() {
        let mut t = RouteTable::new();
        t.add_default(Verb::Any, "/", "index").unwrap();
        t.add(Verb::Any, "/x", "x").unwrap();
        t.add(Verb::get(), "/g", "g").unwrap();
        assert_eq!(sources(&t, &Method::GET), ["/g", "/x", "/"]);
        assert_eq!(sources(&t, &Method::POST), ["/x", "/"]);
    }

    #[test]
    fn test_verb_parsing() {
        assert_eq!("any".parse::<Verb>().unwrap(), Verb::Any);
        assert_eq!("get".parse::<Verb>().unwrap(), Verb::get());
        assert_eq!(Verb::delete().to_string(), "DELETE");
        assert!("not a verb".parse::<Verb>().is_err());
    }

    #[test]
    fn test_bad_pattern_leaves_table_unchanged() {
        let mut t = RouteTable::new();
        assert!(t.add(Verb::get(), "?bad", "x").is_err());
        assert!(t.is_empty());
    }
}
