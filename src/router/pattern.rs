//! Route pattern compiler.
//!
//! Turns the route mini-language into an anchored regex plus the ordered
//! list of parameter keys, one per capturing group:
//!
//! | Source       | Regex           | Key        |
//! |--------------|-----------------|------------|
//! | `:name`      | `([^/?#]+)`     | `name`     |
//! | `:name` + `.`| `([^/?#.]+)`    | `name`     |
//! | `*`          | `(.+?)`         | `wildcard` |
//! | `?`          | `?` (optional)  | -          |
//! | anything else| escaped literal | -          |
//!
//! A named parameter immediately followed by a literal `.` (optionally via
//! its own `?`) stops at the dot, so `/:id.:format` splits `42.json`.
//! A pre-built [`Regex`] bypasses the mini-language and is used unchanged.

use regex::Regex;
use std::fmt;

use crate::params::WILDCARD;

const NAMED_CAPTURE: &str = "([^/?#]+)";
const NAMED_CAPTURE_BEFORE_DOT: &str = "([^/?#.]+)";
const WILDCARD_CAPTURE: &str = "(.+?)";

/// Uncompiled route pattern.
#[derive(Debug, Clone)]
pub enum RoutePattern {
    Source(String),
    Regex(Regex),
}

impl From<&str> for RoutePattern {
    fn from(s: &str) -> Self {
        RoutePattern::Source(s.to_string())
    }
}

impl From<String> for RoutePattern {
    fn from(s: String) -> Self {
        RoutePattern::Source(s)
    }
}

impl From<Regex> for RoutePattern {
    fn from(re: Regex) -> Self {
        RoutePattern::Regex(re)
    }
}

/// A compiled matcher and its ordered parameter keys.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    matcher: Regex,
    keys: Vec<String>,
}

impl CompiledPattern {
    /// The pattern as written (or the raw regex source).
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }

    /// Parameter keys in capture-group order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// A route pattern that could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid route pattern '{}': {}", self.pattern, self.message)
    }
}

impl std::error::Error for PatternError {}

/// Compile a route pattern.
///
/// # Errors
///
/// Returns [`PatternError`] when the generated regex is rejected, e.g. a
/// pattern that starts with a bare `?`.
pub fn compile(pattern: impl Into<RoutePattern>) -> Result<CompiledPattern, PatternError> {
    match pattern.into() {
        RoutePattern::Regex(matcher) => Ok(CompiledPattern {
            source: matcher.as_str().to_string(),
            matcher,
            keys: Vec::new(),
        }),
        RoutePattern::Source(source) => {
            let (regex, keys) = translate(&source);
            let matcher = Regex::new(&regex).map_err(|e| PatternError {
                pattern: source.clone(),
                message: e.to_string(),
            })?;
            Ok(CompiledPattern {
                source,
                matcher,
                keys,
            })
        }
    }
}

/// Translate the mini-language into regex source and keys.
fn translate(source: &str) -> (String, Vec<String>) {
    let chars: Vec<char> = source.chars().collect();
    let mut regex = String::with_capacity(source.len() + 16);
    let mut keys = Vec::new();
    regex.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            ':' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_word_char(chars[end]) {
                    end += 1;
                }
                if end == start {
                    // A colon with no name is just a colon.
                    push_literal(&mut regex, ':');
                    i += 1;
                    continue;
                }
                let mut lookahead = end;
                if chars.get(lookahead) == Some(&'?') {
                    lookahead += 1;
                }
                if chars.get(lookahead) == Some(&'.') {
                    regex.push_str(NAMED_CAPTURE_BEFORE_DOT);
                } else {
                    regex.push_str(NAMED_CAPTURE);
                }
                keys.push(chars[start..end].iter().collect());
                i = end;
            }
            '*' => {
                regex.push_str(WILDCARD_CAPTURE);
                keys.push(WILDCARD.to_string());
                i += 1;
            }
            '?' => {
                regex.push('?');
                i += 1;
            }
            c => {
                push_literal(&mut regex, c);
                i += 1;
            }
        }
    }

    regex.push('$');
    (regex, keys)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn push_literal(regex: &mut String, c: char) {
    let mut buf = [0u8; 4];
    regex.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern_has_no_keys() {
        let p = compile("/ping").unwrap();
        assert!(p.keys().is_empty());
        assert_eq!(p.matcher().as_str(), "^/ping$");
        assert!(p.matcher().is_match("/ping"));
        assert!(!p.matcher().is_match("/ping/1"));
    }

    #[test]
    fn test_named_and_wildcard_keys_in_order() {
        let p = compile("/ping/*/*/:id").unwrap();
        assert_eq!(p.keys(), ["wildcard", "wildcard", "id"]);
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let a = compile("/:action/?:id?.?:format?").unwrap();
        let b = compile("/:action/?:id?.?:format?").unwrap();
        assert_eq!(a.matcher().as_str(), b.matcher().as_str());
        assert_eq!(a.keys(), b.keys());
    }

    #[test]
    fn test_format_suffix_splits_on_dot() {
        let p = compile("/:action/?:id?.?:format?").unwrap();
        assert_eq!(
            p.matcher().as_str(),
            r"^/([^/?#]+)/?([^/?#.]+)?\.?([^/?#]+)?$"
        );
        let caps = p.matcher().captures("/edit/42.json").unwrap();
        assert_eq!(&caps[1], "edit");
        assert_eq!(&caps[2], "42");
        assert_eq!(&caps[3], "json");
    }

    #[test]
    fn test_dot_is_literal() {
        let p = compile("/file.txt").unwrap();
        assert!(p.matcher().is_match("/file.txt"));
        assert!(!p.matcher().is_match("/filextxt"));
    }

    #[test]
    fn test_raw_regex_passes_through() {
        let re = Regex::new(r"/hello/(\w+)").unwrap();
        let p = compile(re).unwrap();
        assert!(p.keys().is_empty());
        assert_eq!(p.matcher().as_str(), r"/hello/(\w+)");
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        let err = compile("?oops").unwrap_err();
        assert_eq!(err.pattern, "?oops");
    }

    #[test]
    fn test_lone_colon_is_literal() {
        let p = compile("/a:/b").unwrap();
        assert!(p.keys().is_empty());
        assert!(p.matcher().is_match("/a:/b"));
    }
}
