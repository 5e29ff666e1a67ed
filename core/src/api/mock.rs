//! Scripted transport for tests and offline smoke runs.

use super::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(HttpResponse),
    Fail(String),
}

/// Pauses a request inside the transport until the test releases it.
#[derive(Clone, Default)]
pub struct RequestGate {
    arrived: Arc<Notify>,
    released: Arc<Notify>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves once a request is parked at the gate.
    pub async fn arrived(&self) {
        self.arrived.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

/// Replays queued outcomes in order and records every request it sees.
///
/// Once the queue is drained the fallback (if any) is returned for every
/// further call; without one the transport reports a network failure.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    queue: Arc<Mutex<VecDeque<Scripted>>>,
    fallback: Arc<Mutex<Option<Scripted>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    gate: Arc<Mutex<Option<RequestGate>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: Scripted) -> &Self {
        self.queue.lock().push_back(outcome);
        self
    }

    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        self.push(Scripted::Respond(HttpResponse::json(status, &body)))
    }

    pub fn push_status(&self, status: u16) -> &Self {
        self.push(Scripted::Respond(HttpResponse::new(status, "")))
    }

    pub fn push_response(&self, response: HttpResponse) -> &Self {
        self.push(Scripted::Respond(response))
    }

    pub fn push_network_error(&self, message: &str) -> &Self {
        self.push(Scripted::Fail(message.to_string()))
    }

    pub fn set_fallback(&self, outcome: Scripted) {
        *self.fallback.lock() = Some(outcome);
    }

    /// Park the next request until [`RequestGate::release`] is called.
    pub fn gate_next(&self, gate: RequestGate) {
        *self.gate.lock() = Some(gate);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);

        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.arrived.notify_one();
            gate.released.notified().await;
        }

        let next = self.queue.lock().pop_front();
        let outcome = match next {
            Some(outcome) => outcome,
            None => match self.fallback.lock().clone() {
                Some(outcome) => outcome,
                None => return Err(TransportError("no scripted response left".to_string())),
            },
        };
        match outcome {
            Scripted::Respond(response) => Ok(response),
            Scripted::Fail(message) => Err(TransportError(message)),
        }
    }
}
