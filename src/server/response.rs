//! [`Response`] -> tiny_http response.

use std::io::Cursor;
use tiny_http::{Header, StatusCode};
use tracing::warn;

use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::response::{status_reason, Response};

// Framing headers are computed by tiny_http from the body.
const SKIPPED_HEADERS: [&str; 3] = ["content-length", "transfer-encoding", "connection"];

pub type WireResponse = tiny_http::Response<Cursor<Vec<u8>>>;

/// Convert an application response, tagging it with the request id.
#[must_use]
pub fn write_response(response: Response, id: RequestId) -> WireResponse {
    let (status, headers, body) = response.into_parts();
    let mut wire = tiny_http::Response::from_data(body).with_status_code(StatusCode(status));
    for (name, value) in headers {
        if SKIPPED_HEADERS.iter().any(|s| name.eq_ignore_ascii_case(s)) {
            continue;
        }
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(h) => wire.add_header(h),
            Err(()) => warn!(header = %name, "Dropping header that is not valid on the wire"),
        }
    }
    if let Ok(h) = Header::from_bytes(REQUEST_ID_HEADER.as_bytes(), id.to_string().as_bytes()) {
        wire.add_header(h);
    }
    wire
}

/// Plain-text response for requests that never reached the application.
#[must_use]
pub fn write_error(status: u16, message: &str) -> WireResponse {
    let body = format!("{status} {}: {message}", status_reason(status));
    let mut wire = tiny_http::Response::from_string(body).with_status_code(StatusCode(status));
    if let Ok(h) = Header::from_bytes(&b"Content-Type"[..], &b"text/plain"[..]) {
        wire.add_header(h);
    }
    wire
}
