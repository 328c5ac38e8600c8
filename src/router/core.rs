//! Router core - per-request rule matching.

use http::Method;
use regex::Regex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::pattern::{PatternError, RoutePattern};
use super::table::{Resolver, RouteTable, Rule, RuleAction, Verb};
use crate::error::DispatchError;
use crate::params::{Params, ACTION, WILDCARD};

/// Pattern of the built-in catch-all rule.
pub const DEFAULT_ACTION_PATTERN: &str = "/:action/?:id?.?:format?";

/// Matches above this duration are logged as slow.
const SLOW_MATCH: Duration = Duration::from_millis(1);

#[allow(clippy::expect_used)]
fn controller_segment() -> &'static Regex {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    SEGMENT.get_or_init(|| Regex::new(r"^/\w+").expect("controller segment regex"))
}

/// Leading controller segment of `path`, if any (`/post/edit/1` -> `post`).
#[must_use]
pub fn controller_name(path: &str) -> Option<&str> {
    controller_segment().find(path).map(|m| &m.as_str()[1..])
}

/// `path` with its controller segment removed; an empty remainder is `/`.
#[must_use]
pub fn strip_controller(path: &str) -> &str {
    let rest = match controller_segment().find(path) {
        Some(m) => &path[m.end()..],
        None => path,
    };
    if rest.is_empty() {
        "/"
    } else {
        rest
    }
}

/// Per-controller router.
///
/// Wraps a [`RouteTable`] and resolves `verb + path` to an action name,
/// writing path parameters into the request's [`Params`] as it goes.
#[derive(Debug, Clone, Default)]
pub struct Router {
    table: RouteTable,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Declare a rule. Later declarations take precedence.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern does not compile.
    pub fn add(
        &mut self,
        verb: Verb,
        pattern: impl Into<RoutePattern>,
        action: impl Into<RuleAction>,
    ) -> Result<(), PatternError> {
        self.table.add(verb, pattern, action)
    }

    /// Declare a rule whose action is computed from the params at match time.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern does not compile.
    pub fn resolve(
        &mut self,
        verb: Verb,
        pattern: impl Into<RoutePattern>,
        resolver: Resolver,
    ) -> Result<(), PatternError> {
        self.table
            .add(verb, pattern, RuleAction::Resolver(resolver))
    }

    /// Append the two built-in rules: `/` runs `index`, and
    /// `/:action/?:id?.?:format?` runs whatever `:action` captured.
    ///
    /// # Errors
    ///
    /// Never in practice; both patterns are fixed.
    pub fn install_defaults(&mut self) -> Result<(), PatternError> {
        self.table.add_default(Verb::Any, "/", "index")?;
        let by_action: Resolver =
            std::sync::Arc::new(|params: &Params| params.get_str(ACTION).map(str::to_string));
        self.table
            .add_default(Verb::Any, DEFAULT_ACTION_PATTERN, RuleAction::Resolver(by_action))
    }

    /// Resolve the action for `method` and `path`.
    ///
    /// `path` is the full request path; its controller segment is stripped
    /// before matching. On a match, decoded captures are stored under
    /// `captures`, named keys overwrite, `wildcard` keys accumulate and
    /// groups that did not participate are skipped.
    ///
    /// # Errors
    ///
    /// [`DispatchError::RouteNotFound`] when no rule matches or a deferred
    /// resolver declines.
    pub fn match_route(
        &self,
        method: &Method,
        path: &str,
        params: &mut Params,
    ) -> Result<String, DispatchError> {
        let local = strip_controller(path);
        debug!(method = %method, path = %path, local_path = %local, "Route match attempt");

        let started = Instant::now();
        for rule in self.table.lookup(method) {
            let Some(caps) = rule.pattern.matcher().captures(local) else {
                continue;
            };

            let values: Vec<Option<String>> = caps
                .iter()
                .skip(1)
                .map(|c| c.map(|m| decode(m.as_str())))
                .collect();
            if !values.is_empty() {
                for (key, value) in rule.pattern.keys().iter().zip(&values) {
                    let Some(value) = value else { continue };
                    if key == WILDCARD {
                        params.push(key.as_str(), value.as_str());
                    } else {
                        params.insert(key.as_str(), value.as_str());
                    }
                }
                params.set_captures(values);
            }

            let action = match &rule.action {
                RuleAction::Handler(name) => Some(name.clone()),
                RuleAction::Resolver(resolve) => resolve(params),
            };
            let elapsed = started.elapsed();

            return match action {
                Some(action) => {
                    if elapsed > SLOW_MATCH {
                        warn!(
                            method = %method,
                            path = %path,
                            route_pattern = %rule.pattern.source(),
                            action = %action,
                            duration_us = elapsed.as_micros(),
                            "Slow route matching detected"
                        );
                    } else {
                        info!(
                            method = %method,
                            path = %path,
                            route_pattern = %rule.pattern.source(),
                            action = %action,
                            duration_us = elapsed.as_micros(),
                            "Route matched"
                        );
                    }
                    Ok(action)
                }
                None => {
                    warn!(
                        method = %method,
                        path = %path,
                        route_pattern = %rule.pattern.source(),
                        "Route resolver declined"
                    );
                    Err(not_found(method, path))
                }
            };
        }

        warn!(
            method = %method,
            path = %path,
            duration_us = started.elapsed().as_micros(),
            "No route matched"
        );
        Err(not_found(method, path))
    }

    /// One line per rule, in evaluation order per bucket.
    #[must_use]
    pub fn describe_routes(&self) -> Vec<String> {
        self.table
            .rules()
            .into_iter()
            .map(|Rule { verb, pattern, action }| {
                format!("{:<7} {:<32} -> {action}", verb.to_string(), pattern.source())
            })
            .collect()
    }

    /// Print all rules to stdout.
    pub fn dump_routes(&self) {
        println!("[routes] count={}", self.table.len());
        for line in self.describe_routes() {
            println!("[route] {line}");
        }
    }
}

fn not_found(method: &Method, path: &str) -> DispatchError {
    DispatchError::RouteNotFound {
        method: method.to_string(),
        path: path.to_string(),
    }
}

/// Percent-decode a capture, keeping the raw text if it is not UTF-8.
fn decode(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |s| s.into_owned())
}
