//! Transport-independent request.

use http::Method;
use std::collections::HashMap;

use crate::ids::RequestId;
use crate::params::Params;
use crate::static_files::content_type_for;

/// Format used when the path has no recognized extension.
pub const DEFAULT_FORMAT: &str = "html";

/// Incoming request as seen by the dispatch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: RequestId,
    pub method: Method,
    /// Path without the query string, as received (still percent-encoded).
    pub path: String,
    /// Raw query string without the `?`.
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// `json` for `/post/1.json`, otherwise the default format.
    pub format: String,
}

impl Request {
    /// Build from a method and a request target (`/path?query`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, q),
            None => (target, ""),
        };
        let path = if path.is_empty() { "/" } else { path };
        Self {
            id: RequestId::new(),
            method,
            path: path.to_string(),
            query: query.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            format: detect_format(path, DEFAULT_FORMAT),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: RequestId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Re-detect the format with a different fallback.
    #[must_use]
    pub fn with_default_format(mut self, default: &str) -> Self {
        self.format = detect_format(&self.path, default);
        self
    }

    /// Case-insensitive header lookup (first match).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query_params(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Urlencoded form body fields; empty for any other content type.
    #[must_use]
    pub fn form_params(&self) -> HashMap<String, String> {
        let is_form = self
            .header("content-type")
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if !is_form {
            return HashMap::new();
        }
        url::form_urlencoded::parse(&self.body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Initial params: query fields, then form fields (form wins).
    #[must_use]
    pub fn params(&self) -> Params {
        let mut params = Params::from_pairs(self.query_params());
        for (k, v) in self.form_params() {
            params.insert(k, v);
        }
        params
    }

    #[must_use]
    pub fn is_get_or_head(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }
}

/// Format from the last path segment's extension, if it is a known one.
#[must_use]
pub fn detect_format(path: &str, default: &str) -> String {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| content_type_for(ext).is_some())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_is_split() {
        let r = Request::new(Method::GET, "/post/edit/42.json?x=1&y=a%20b");
        assert_eq!(r.path, "/post/edit/42.json");
        assert_eq!(r.format, "json");
        let q = r.query_params();
        assert_eq!(q["x"], "1");
        assert_eq!(q["y"], "a b");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(detect_format("/post", "html"), "html");
        assert_eq!(detect_format("/post.JSON", "html"), "json");
        assert_eq!(detect_format("/post/1.unknownext", "html"), "html");
        assert_eq!(detect_format("/v1.2/post", "json"), "json");
        let r = Request::new(Method::GET, "/post").with_default_format("json");
        assert_eq!(r.format, "json");
    }

    #[test]
    fn test_form_params_win() {
        let r = Request::new(Method::POST, "/post?title=query")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("title=form&body=hi");
        let p = r.params();
        assert_eq!(p.get_str("title"), Some("form"));
        assert_eq!(p.get_str("body"), Some("hi"));
    }

    #[test]
    fn test_non_form_body_is_ignored() {
        let r = Request::new(Method::POST, "/post")
            .with_header("content-type", "application/json")
            .with_body("{}");
        assert!(r.form_params().is_empty());
    }
}
