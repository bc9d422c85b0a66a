//! Transport layer abstraction.
//!
//! The transport is an injected capability: this crate shapes requests
//! and interprets responses but never performs networking itself. The
//! trait is deliberately small so any HTTP library (reqwest, ureq,
//! hyper, ...) or a non-HTTP channel can sit behind it.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// Request method on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read a resource.
    Get,
    /// Create a resource.
    Post,
    /// Replace a resource.
    Put,
    /// Partially update a resource.
    Patch,
    /// Delete a resource.
    Delete,
}

impl Method {
    /// The wire form of the method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shaped request, passed opaquely to the transport.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Resolved target address.
    pub url: String,
    /// JSON body, if the verb carries one.
    pub body: Option<Value>,
    /// Extra headers forwarded untouched.
    pub headers: Vec<(String, String)>,
}

/// A successful transport response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code reported by the transport.
    pub status: u16,
    /// Decoded response payload.
    pub data: Value,
}

impl Response {
    /// A 200 response carrying `data`.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self { status: 200, data }
    }

    /// A response with an explicit status code.
    #[must_use]
    pub fn with_status(status: u16, data: Value) -> Self {
        Self { status, data }
    }
}

/// A failed transport call.
///
/// `data` carries the decoded failure payload when the server produced
/// one (for save failures this is cached verbatim on the entity).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportFailure {
    /// Human-readable description.
    pub message: String,
    /// Status code, when the failure came from a response.
    pub status: Option<u16>,
    /// Decoded failure payload, if any.
    pub data: Option<Value>,
}

impl TransportFailure {
    /// Creates a failure with only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            data: None,
        }
    }

    /// Attaches a status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the decoded failure payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A request/response transport.
///
/// Implementations must return a [`Response`] for completed exchanges
/// and a [`TransportFailure`] for everything else. No retry, timeout, or
/// cancellation is modeled here; those belong to the implementation.
pub trait Transport: Send + Sync {
    /// Performs one request/response exchange.
    fn send(&self, request: Request) -> Result<Response, TransportFailure>;
}

/// A scripted transport for tests.
///
/// Outcomes are served in FIFO order; every request is recorded for
/// later inspection.
#[derive(Default)]
pub struct MockTransport {
    outcomes: Mutex<VecDeque<Result<Response, TransportFailure>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    /// Creates a mock with no scripted outcomes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response.
    pub fn respond(&self, response: Response) {
        self.outcomes.lock().push_back(Ok(response));
    }

    /// Queues a failure.
    pub fn fail(&self, failure: TransportFailure) {
        self.outcomes.lock().push_back(Err(failure));
    }

    /// All requests seen so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: Request) -> Result<Response, TransportFailure> {
        self.requests.lock().push(request);
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportFailure::new("no mock outcome queued")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(method: Method) -> Request {
        Request {
            method,
            url: "/api/things".to_string(),
            body: None,
            headers: Vec::new(),
        }
    }

    #[test]
    fn mock_serves_outcomes_in_order() {
        let transport = MockTransport::new();
        transport.respond(Response::ok(json!({"id": 1})));
        transport.fail(TransportFailure::new("boom").with_status(500));

        let first = transport.send(request(Method::Get)).unwrap();
        assert_eq!(first.data, json!({"id": 1}));

        let second = transport.send(request(Method::Get)).unwrap_err();
        assert_eq!(second.status, Some(500));

        // Queue exhausted.
        assert!(transport.send(request(Method::Get)).is_err());
    }

    #[test]
    fn mock_records_requests() {
        let transport = MockTransport::new();
        transport.respond(Response::ok(Value::Null));
        transport.send(request(Method::Post)).unwrap();

        let recorded = transport.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].method, Method::Post);
        assert_eq!(transport.last_request().unwrap().url, "/api/things");
    }

    #[test]
    fn method_wire_forms() {
        assert_eq!(Method::Get.as_str(), "GET");
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }
}
