//! HTTP transport adapter.
//!
//! Turns wire requests into [`crate::Request`]s, runs them through an
//! [`crate::App`] on a fixed pool of worker threads and writes the
//! `(status, headers, body)` back.

pub mod http_server;
pub mod request;
pub mod response;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, MAX_BODY_BYTES};
pub use response::{write_error, write_response};
