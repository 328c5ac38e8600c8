//! # Response Module
//!
//! The mutable [`Response`] an action writes into, the early-exit [`Reply`]
//! it can hand back through [`done`], and the rules that fold either one
//! (or a failure) into the final `(status, headers, body)` triple.
//!
//! ## Early-exit replies
//!
//! A reply carries zero to three positional values, applied left to right:
//!
//! | Position | Accepted                                            |
//! |----------|-----------------------------------------------------|
//! | 0        | status code (100..=599), header map, or body        |
//! | 1        | header map or body                                  |
//! | 2        | body                                                |
//!
//! A body is a string or a sequence of strings (concatenated on the wire).
//! An empty header map clears every header, including the default
//! `Content-Type`. Header keys are normalized: `content_type` becomes
//! `Content-Type`.
//!
//! ```rust
//! use dio::response::{apply_reply, Response};
//! use dio::reply;
//!
//! let mut response = Response::default();
//! apply_reply(&mut response, reply![201, [("x_request_id", "abc")], "created"]).unwrap();
//! assert_eq!(response.status(), 201);
//! assert_eq!(response.header("X-Request-Id"), Some("abc"));
//! assert_eq!(response.body_string(), "created");
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::error::{ActionResult, DispatchError, Halt};

/// Default `Content-Type` of every response.
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Maximum number of positional values in a reply.
pub const MAX_REPLY_VALUES: usize = 3;

/// One positional value of an early-exit reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyValue {
    Int(i64),
    Headers(Vec<(String, String)>),
    Text(String),
    Chunks(Vec<String>),
    /// Anything that is neither status, headers nor body. Always rejected.
    Other(serde_json::Value),
}

impl ReplyValue {
    fn describe(&self) -> &'static str {
        match self {
            ReplyValue::Int(_) => "an integer",
            ReplyValue::Headers(_) => "a header map",
            ReplyValue::Text(_) | ReplyValue::Chunks(_) => "a body",
            ReplyValue::Other(_) => "an unsupported value",
        }
    }
}

impl From<u16> for ReplyValue {
    fn from(v: u16) -> Self {
        ReplyValue::Int(i64::from(v))
    }
}

impl From<i32> for ReplyValue {
    fn from(v: i32) -> Self {
        ReplyValue::Int(i64::from(v))
    }
}

impl From<i64> for ReplyValue {
    fn from(v: i64) -> Self {
        ReplyValue::Int(v)
    }
}

impl From<&str> for ReplyValue {
    fn from(v: &str) -> Self {
        ReplyValue::Text(v.to_string())
    }
}

impl From<String> for ReplyValue {
    fn from(v: String) -> Self {
        ReplyValue::Text(v)
    }
}

impl From<Vec<String>> for ReplyValue {
    fn from(v: Vec<String>) -> Self {
        ReplyValue::Chunks(v)
    }
}

impl From<Vec<&str>> for ReplyValue {
    fn from(v: Vec<&str>) -> Self {
        ReplyValue::Chunks(v.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ReplyValue {
    fn from(v: [&str; N]) -> Self {
        ReplyValue::Chunks(v.iter().map(|s| (*s).to_string()).collect())
    }
}

impl<K, V> From<Vec<(K, V)>> for ReplyValue
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(v: Vec<(K, V)>) -> Self {
        ReplyValue::Headers(v.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for ReplyValue
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(v: [(K, V); N]) -> Self {
        ReplyValue::Headers(v.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V> From<HashMap<K, V>> for ReplyValue
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(v: HashMap<K, V>) -> Self {
        ReplyValue::Headers(v.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V> From<BTreeMap<K, V>> for ReplyValue
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(v: BTreeMap<K, V>) -> Self {
        ReplyValue::Headers(v.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<serde_json::Value> for ReplyValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Number(ref n) => match n.as_i64() {
                Some(i) => ReplyValue::Int(i),
                None => ReplyValue::Other(v),
            },
            Value::String(s) => ReplyValue::Text(s),
            Value::Array(ref items) if items.iter().all(Value::is_string) => ReplyValue::Chunks(
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect(),
            ),
            Value::Object(ref map) if map.values().all(|v| !v.is_array() && !v.is_object()) => {
                ReplyValue::Headers(
                    map.iter()
                        .map(|(k, v)| {
                            let value = match v {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            };
                            (k.clone(), value)
                        })
                        .collect(),
                )
            }
            other => ReplyValue::Other(other),
        }
    }
}

/// Positional early-exit reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply(pub Vec<ReplyValue>);

impl Reply {
    #[must_use]
    pub fn from_values(values: Vec<ReplyValue>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn values(&self) -> &[ReplyValue] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Build a [`Reply`] from up to three positional values.
///
/// ```rust
/// use dio::reply;
/// use dio::response::ReplyValue;
///
/// let r = reply![404, "gone"];
/// assert_eq!(r.values()[0], ReplyValue::Int(404));
/// ```
#[macro_export]
macro_rules! reply {
    () => {
        $crate::response::Reply::default()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::response::Reply::from_values(vec![
            $($crate::response::ReplyValue::from($value)),+
        ])
    };
}

/// Leave the action (or hook) now and respond with `reply`.
///
/// Remaining hooks are skipped.
pub fn done(reply: Reply) -> ActionResult {
    Err(Halt::Done(reply))
}

/// Response under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<Vec<u8>>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string())],
            body: Vec::new(),
        }
    }
}

impl Response {
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace any header with the same (case-insensitive) name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    pub fn clear_headers(&mut self) {
        self.headers.clear();
    }

    /// Replace the body with the given chunks.
    pub fn set_body<I, S>(&mut self, chunks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        self.body = chunks.into_iter().map(Into::into).collect();
    }

    #[must_use]
    pub fn body_chunks(&self) -> &[Vec<u8>] {
        &self.body
    }

    #[must_use]
    pub fn body_bytes(&self) -> Vec<u8> {
        self.body.concat()
    }

    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes()).into_owned()
    }

    /// Still status 200 with nothing written.
    #[must_use]
    pub fn is_untouched(&self) -> bool {
        self.status == 200 && self.body.iter().all(Vec::is_empty)
    }

    #[must_use]
    pub fn into_parts(self) -> (u16, Vec<(String, String)>, Vec<u8>) {
        let body = self.body.concat();
        (self.status, self.headers, body)
    }
}

/// `content_type` -> `Content-Type`: split on `_`, capitalize each piece,
/// join with `-`. The rest of each piece is left as written.
#[must_use]
pub fn normalize_header_name(name: &str) -> String {
    name.split('_')
        .map(|piece| {
            let mut chars = piece.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn apply_headers(response: &mut Response, headers: Vec<(String, String)>) {
    if headers.is_empty() {
        response.clear_headers();
        return;
    }
    for (name, value) in headers {
        response.set_header(normalize_header_name(&name), value);
    }
}

/// Apply an early-exit reply to `response`.
///
/// Nothing is applied unless every value fits its position.
///
/// # Errors
///
/// [`DispatchError::InvalidReply`] when there are more than three values
/// or a value does not fit its position.
pub fn apply_reply(response: &mut Response, reply: Reply) -> Result<(), DispatchError> {
    if reply.len() > MAX_REPLY_VALUES {
        return Err(DispatchError::InvalidReply {
            position: MAX_REPLY_VALUES,
            reason: format!(
                "is one too many: a reply holds at most {MAX_REPLY_VALUES} values"
            ),
        });
    }

    let mut staged = response.clone();
    for (position, value) in reply.0.into_iter().enumerate() {
        match (position, value) {
            (0, ReplyValue::Int(code)) if (100..=599).contains(&code) => {
                staged.set_status(u16::try_from(code).unwrap_or(500));
            }
            (0, ReplyValue::Int(code)) => {
                return Err(DispatchError::InvalidReply {
                    position,
                    reason: format!("is {code}, not a status code in 100..=599"),
                });
            }
            (0 | 1, ReplyValue::Headers(headers)) => apply_headers(&mut staged, headers),
            (_, ReplyValue::Text(text)) => staged.set_body([text]),
            (_, ReplyValue::Chunks(chunks)) => staged.set_body(chunks),
            (_, other) => {
                return Err(DispatchError::InvalidReply {
                    position,
                    reason: format!("cannot be {}", other.describe()),
                });
            }
        }
    }
    *response = staged;
    Ok(())
}

/// Reason phrase for a status code, `"Unknown"` if it has none.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Minimal escaping for text interpolated into error pages.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Turn a failure into an HTML error page on `response`.
///
/// NotFound conditions become a 404. Anything else keeps a status the
/// action already set in 400..=599 and falls back to 500; 5xx pages carry
/// the trace when `show_backtrace` is on.
pub fn salvage(response: &mut Response, err: &DispatchError, path: &str, show_backtrace: bool) {
    response.set_header("Content-Type", DEFAULT_CONTENT_TYPE);

    if err.is_not_found() {
        response.set_status(404);
        response.set_body([format!(
            "<h1>404 - Not Found</h1><p>The requested URL {} was not found on this server.",
            escape_html(path)
        )]);
        return;
    }

    let status = if (400..=599).contains(&response.status()) {
        response.status()
    } else {
        500
    };
    response.set_status(status);

    let mut page = format!(
        "<h1>{status} - {}: {}</h1>",
        escape_html(err.kind()),
        escape_html(&err.message())
    );
    if status >= 500 && show_backtrace {
        if let Some(trace) = err.trace() {
            page.push_str("<pre>");
            page.push_str(&escape_html(trace));
            page.push_str("</pre>");
        }
    }
    response.set_body([page]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fault;
    use crate::reply;

    fn applied(reply: Reply) -> Response {
        let mut response = Response::default();
        apply_reply(&mut response, reply).unwrap();
        response
    }

    #[test]
    fn test_status_only() {
        let r = applied(reply![404]);
        assert_eq!(r.status(), 404);
        assert_eq!(r.header("content-type"), Some("text/html"));
        assert_eq!(r.body_string(), "");
    }

    #[test]
    fn test_headers_only() {
        let r = applied(reply![[("X-Dio", "rocks")]]);
        assert_eq!(r.status(), 200);
        assert_eq!(r.header("X-Dio"), Some("rocks"));
        assert_eq!(r.header("Content-Type"), Some("text/html"));
    }

    #[test]
    fn test_text_body() {
        let r = applied(reply!["index"]);
        assert_eq!(r.status(), 200);
        assert_eq!(r.body_string(), "index");
    }

    #[test]
    fn test_chunk_body_is_concatenated() {
        let r = applied(reply![["hello", "world"]]);
        assert_eq!(r.status(), 200);
        assert_eq!(r.body_string(), "helloworld");
    }

    #[test]
    fn test_three_values() {
        let r = applied(reply![201, [("content_type", "text/plain")], vec!["a", "b"]]);
        assert_eq!(r.status(), 201);
        assert_eq!(r.header("Content-Type"), Some("text/plain"));
        assert_eq!(r.headers().len(), 1);
        assert_eq!(r.body_string(), "ab");
    }

    #[test]
    fn test_empty_header_map_clears_headers() {
        let empty: HashMap<String, String> = HashMap::new();
        let r = applied(reply![204, empty]);
        assert_eq!(r.status(), 204);
        assert!(r.headers().is_empty());
    }

    #[test]
    fn test_header_name_normalization() {
        assert_eq!(normalize_header_name("content_type"), "Content-Type");
        assert_eq!(normalize_header_name("x_request_id"), "X-Request-Id");
        assert_eq!(normalize_header_name("X-Dio"), "X-Dio");
    }

    #[test]
    fn test_empty_reply_changes_nothing() {
        let r = applied(reply![]);
        assert_eq!(r, Response::default());
    }

    #[test]
    fn test_invalid_positions() {
        let mut r = Response::default();
        let err = apply_reply(&mut r, reply![200, 201]).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidReply { position: 1, .. }));

        let err = apply_reply(&mut r, reply![200, "body", [("a", "b")]]).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidReply { position: 2, .. }));

        let err = apply_reply(&mut r, reply![42]).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidReply { position: 0, .. }));

        let err = apply_reply(&mut r, reply![200, "a", "b", "c"]).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidReply { position: 3, .. }));

        let err = apply_reply(&mut r, reply![serde_json::json!(true)]).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidReply { position: 0, .. }));
    }

    #[test]
    fn test_invalid_reply_leaves_response_untouched() {
        let mut r = Response::default();
        apply_reply(&mut r, reply![[("x_secret", "1")], 42]).unwrap_err();
        assert_eq!(r, Response::default());

        apply_reply(&mut r, reply![404, 7]).unwrap_err();
        assert_eq!(r.status(), 200);
    }

    #[test]
    fn test_json_values_are_classified() {
        use serde_json::json;
        assert_eq!(ReplyValue::from(json!(418)), ReplyValue::Int(418));
        assert_eq!(ReplyValue::from(json!("x")), ReplyValue::Text("x".into()));
        assert_eq!(
            ReplyValue::from(json!(["a", "b"])),
            ReplyValue::Chunks(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            ReplyValue::from(json!({"x_id": 7})),
            ReplyValue::Headers(vec![("x_id".into(), "7".into())])
        );
    }

    #[test]
    fn test_done_carries_the_reply() {
        match done(reply!["bye"]) {
            Err(Halt::Done(r)) => assert_eq!(r, reply!["bye"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_salvage_not_found() {
        let mut r = Response::default();
        r.set_header("Content-Type", "application/json");
        let err = DispatchError::ControllerNotFound { name: "nope".into() };
        salvage(&mut r, &err, "/nope", true);
        assert_eq!(r.status(), 404);
        assert_eq!(r.header("Content-Type"), Some("text/html"));
        assert_eq!(
            r.body_string(),
            "<h1>404 - Not Found</h1><p>The requested URL /nope was not found on this server."
        );
    }

    #[test]
    fn test_salvage_keeps_client_error_status() {
        let mut r = Response::default();
        r.set_status(422);
        let err = DispatchError::Unhandled(Fault {
            kind: "Invalid".into(),
            message: "bad input".into(),
            trace: Some("frame".into()),
        });
        salvage(&mut r, &err, "/", true);
        assert_eq!(r.status(), 422);
        assert_eq!(r.body_string(), "<h1>422 - Invalid: bad input</h1>");
    }

    #[test]
    fn test_salvage_server_error_with_trace() {
        let mut r = Response::default();
        let err = DispatchError::Unhandled(Fault {
            kind: "Panic".into(),
            message: "<boom>".into(),
            trace: Some("frame 0".into()),
        });
        salvage(&mut r, &err, "/", true);
        assert_eq!(r.status(), 500);
        assert_eq!(
            r.body_string(),
            "<h1>500 - Panic: &lt;boom&gt;</h1><pre>frame 0</pre>"
        );

        let mut r = Response::default();
        salvage(&mut r, &err, "/", false);
        assert_eq!(r.body_string(), "<h1>500 - Panic: &lt;boom&gt;</h1>");
    }

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(299), "Unknown");
    }
}
