// crates/campaign-lens-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Scripted HTTP stub server for core integration tests.
// Purpose: Record outbound requests and replay canned responses.
// Dependencies: tiny_http
// ============================================================================

//! ## Overview
//! [`StubServer`] binds an ephemeral loopback port, answers each request with
//! the next scripted response, and records what the client sent so tests can
//! assert on headers and bodies.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Stub Server
// ============================================================================

/// Request captured by the stub server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Request path and query.
    pub url: String,
    /// Header name/value pairs, names lowercased.
    pub headers: Vec<(String, String)>,
    /// Raw body text.
    pub body: String,
}

impl RecordedRequest {
    /// Returns the first header value for `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers.iter().find(|(key, _)| *key == name).map(|(_, value)| value.as_str())
    }
}

/// Loopback HTTP server replaying scripted responses.
pub struct StubServer {
    /// Base URL, e.g. `http://127.0.0.1:PORT`.
    pub base_url: String,
    /// Requests received so far.
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Serving thread.
    handle: Option<thread::JoinHandle<()>>,
}

impl StubServer {
    /// Starts a server answering with `responses` in order, then stopping.
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", server.server_addr().to_ip().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let handle = thread::spawn(move || {
            for (status, body) in responses {
                let Ok(mut request) = server.recv() else {
                    return;
                };
                let mut text = String::new();
                let _ = request.as_reader().read_to_string(&mut text);
                recorded.lock().unwrap().push(RecordedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|header| {
                            (
                                header.field.as_str().as_str().to_ascii_lowercase(),
                                header.value.as_str().to_string(),
                            )
                        })
                        .collect(),
                    body: text,
                });
                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let response = Response::from_string(body)
                    .with_status_code(status)
                    .with_header(content_type);
                let _ = request.respond(response);
            }
        });
        Self {
            base_url,
            requests,
            handle: Some(handle),
        }
    }

    /// Waits for the scripted responses to drain and returns the requests.
    pub fn finish(mut self) -> Vec<RecordedRequest> {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
        self.requests.lock().unwrap().clone()
    }
}
