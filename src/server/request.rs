//! tiny_http request -> [`Request`].

use http::Method;
use std::io::{self, Read};

use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::request::Request;

/// Largest request body read into memory.
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Read the head and body of an incoming request.
///
/// # Errors
///
/// `InvalidInput` for a method that is not a valid token, `InvalidData`
/// for a body over [`MAX_BODY_BYTES`], or the underlying read error.
pub fn parse_request(raw: &mut tiny_http::Request) -> io::Result<Request> {
    let method = Method::from_bytes(raw.method().as_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let headers: Vec<(String, String)> = raw
        .headers()
        .iter()
        .map(|h| (h.field.as_str().to_string(), h.value.as_str().to_string()))
        .collect();
    let id = RequestId::from_header_or_new(
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(REQUEST_ID_HEADER))
            .map(|(_, v)| v.as_str()),
    );

    let mut body = Vec::new();
    raw.as_reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut body)?;
    if body.len() as u64 > MAX_BODY_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("request body exceeds {MAX_BODY_BYTES} bytes"),
        ));
    }

    let mut request = Request::new(method, raw.url()).with_id(id).with_body(body);
    request.headers = headers;
    Ok(request)
}
