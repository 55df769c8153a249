//! Remote transport with canned answers

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use menuboard_sync::remote::{RemoteRequest, RemoteResponse, RequestMethod};
use menuboard_sync::{RemoteError, RemoteTransport};

/// Answers requests from a queue, falling back to a fixed response
///
/// Every request is recorded. An optional delay keeps requests in flight
/// long enough to overlap.
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<(Option<Duration>, Result<RemoteResponse, RemoteError>)>>,
    fallback: Result<RemoteResponse, RemoteError>,
    delay: Option<Duration>,
    requests: Mutex<Vec<RemoteRequest>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    /// Always answer 200 with `body`
    pub fn ok(body: impl Into<String>) -> Self {
        Self::with_fallback(Ok(RemoteResponse {
            status: 200,
            body: body.into(),
        }))
    }

    /// Always fail with `error`
    pub fn failing(error: RemoteError) -> Self {
        Self::with_fallback(Err(error))
    }

    fn with_fallback(fallback: Result<RemoteResponse, RemoteError>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue one answer ahead of the fallback
    pub fn then(self, status: u16, body: impl Into<String>) -> Self {
        self.enqueue(None, status, body.into())
    }

    /// Queue one answer that arrives only after `delay`
    pub fn then_after(self, delay: Duration, status: u16, body: impl Into<String>) -> Self {
        self.enqueue(Some(delay), status, body.into())
    }

    fn enqueue(self, delay: Option<Duration>, status: u16, body: String) -> Self {
        self.queue
            .lock()
            .unwrap()
            .push_back((delay, Ok(RemoteResponse { status, body })));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RemoteRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_with(&self, method: RequestMethod) -> Vec<RemoteRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method)
            .collect()
    }
}

#[async_trait]
impl RemoteTransport for ScriptedTransport {
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        // answers are assigned in request order, before any delay
        let queued = self.queue.lock().unwrap().pop_front();
        let (delay, response) = match queued {
            Some((delay, response)) => (delay.or(self.delay), response),
            None => (self.delay, self.fallback.clone()),
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }
}
