use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::request::parse_request;
use super::response::{write_error, write_response};
use crate::app::App;

/// Serves an [`App`] over HTTP/1.1 with `settings.workers` threads.
pub struct HttpServer(pub Arc<App>);

/// Handle to a running HTTP server
///
/// Provides methods for waiting until the server is ready, stopping it
/// gracefully, or joining the worker threads.
pub struct ServerHandle {
    addr: SocketAddr,
    server: Arc<tiny_http::Server>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the server doesn't accept a connection within
    /// ~250ms (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting requests and wait for in-flight ones to finish.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // each unblock releases one worker stuck in recv()
        for _ in &self.workers {
            self.server.unblock();
        }
        for worker in self.workers {
            if worker.join().is_err() {
                error!("HTTP worker panicked during shutdown");
            }
        }
        info!(addr = %self.addr, "HTTP server stopped");
    }

    /// Block until every worker exits.
    ///
    /// # Errors
    ///
    /// The panic payload of the first worker that panicked.
    pub fn join(self) -> thread::Result<()> {
        let mut result = Ok(());
        for worker in self.workers {
            if let Err(e) = worker.join() {
                result = result.and(Err(e));
            }
        }
        result
    }
}

impl HttpServer {
    /// Bind `addr` and start the worker threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let server = tiny_http::Server::http(addr).map_err(io::Error::other)?;
        let addr = server.server_addr().to_ip().unwrap_or(addr);
        let server = Arc::new(server);
        let shutdown = Arc::new(AtomicBool::new(false));

        let count = self.0.settings().workers.max(1);
        let mut workers = Vec::with_capacity(count);
        for n in 0..count {
            let app = Arc::clone(&self.0);
            let server = Arc::clone(&server);
            let shutdown = Arc::clone(&shutdown);
            let worker = thread::Builder::new()
                .name(format!("dio-http-{n}"))
                .spawn(move || serve(&app, &server, &shutdown))?;
            workers.push(worker);
        }

        info!(addr = %addr, workers = count, "HTTP server listening");
        Ok(ServerHandle {
            addr,
            server,
            shutdown,
            workers,
        })
    }
}

fn serve(app: &App, server: &tiny_http::Server, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::SeqCst) {
        let mut raw = match server.recv() {
            Ok(raw) => raw,
            Err(e) => {
                if !shutdown.load(Ordering::SeqCst) {
                    warn!(error = %e, "HTTP accept failed");
                }
                continue;
            }
        };

        let reply = match parse_request(&mut raw) {
            Ok(request) => {
                let id = request.id;
                write_response(app.call(request), id)
            }
            Err(e) => {
                warn!(error = %e, url = %raw.url(), "Malformed HTTP request");
                let status = if e.kind() == io::ErrorKind::InvalidData { 413 } else { 400 };
                write_error(status, &e.to_string())
            }
        };

        if let Err(e) = raw.respond(reply) {
            debug!(error = %e, "Client went away before the response was written");
        }
    }
}
