//! Scripted in-memory transport.
//!
//! Responses are queued per method and consumed in order. A method can also
//! carry a sticky fallback that answers once its queue is empty, which is how
//! "always pending" receipts are modelled. Subscriptions are fed through a
//! [`HeaderFeed`] held by the test.

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::transport::{HeaderStream, RpcTransport, TransportError, TransportResult};

#[derive(Default)]
struct MockState {
    queued: HashMap<&'static str, VecDeque<TransportResult<Value>>>,
    sticky: HashMap<&'static str, TransportResult<Value>>,
    calls: Vec<(&'static str, Value)>,
    subscriptions: VecDeque<TransportResult<mpsc::UnboundedReceiver<TransportResult<Value>>>>,
}

/// In-memory [`RpcTransport`] for tests.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Sending half of a scripted `newHeads` subscription.
///
/// Dropping it ends the stream, which the subscription observes as a broken
/// channel.
#[derive(Debug, Clone)]
pub struct HeaderFeed {
    tx: mpsc::UnboundedSender<TransportResult<Value>>,
}

impl HeaderFeed {
    /// Push one header notification. Returns false once the consumer is gone.
    pub fn push(&self, header: Value) -> bool {
        self.tx.send(Ok(header)).is_ok()
    }

    /// Push a transport failure into the stream.
    pub fn fail(&self, err: TransportError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }

    /// Whether the subscriber has released the channel.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one successful response for `method`.
    pub fn push_response(&self, method: &'static str, response: Value) -> &Self {
        self.push_result(method, Ok(response))
    }

    /// Queue one failure for `method`.
    pub fn push_error(&self, method: &'static str, err: TransportError) -> &Self {
        self.push_result(method, Err(err))
    }

    fn push_result(&self, method: &'static str, result: TransportResult<Value>) -> &Self {
        self.lock().queued.entry(method).or_default().push_back(result);
        self
    }

    /// Answer `method` with `response` whenever its queue is empty.
    pub fn set_fallback(&self, method: &'static str, response: TransportResult<Value>) -> &Self {
        self.lock().sticky.insert(method, response);
        self
    }

    /// Script the next `subscribe_new_heads` call to succeed.
    pub fn expect_subscription(&self) -> HeaderFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscriptions.push_back(Ok(rx));
        HeaderFeed { tx }
    }

    /// Script the next `subscribe_new_heads` call to fail.
    pub fn refuse_subscription(&self, err: TransportError) {
        self.lock().subscriptions.push_back(Err(err));
    }

    /// Every call issued so far, in order.
    pub fn calls(&self) -> Vec<(&'static str, Value)> {
        self.lock().calls.clone()
    }

    /// Number of calls issued for `method`.
    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|(m, _)| *m == method).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the transport from the rest.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RpcTransport for MockTransport {
    fn request(&self, method: &'static str, params: Value) -> BoxFuture<'_, TransportResult<Value>> {
        let result = {
            let mut state = self.lock();
            state.calls.push((method, params));
            match state.queued.get_mut(method).and_then(VecDeque::pop_front) {
                Some(result) => result,
                None => state.sticky.get(method).cloned().unwrap_or_else(|| {
                    Err(TransportError::Connection(format!(
                        "no scripted response for {}",
                        method
                    )))
                }),
            }
        };
        Box::pin(async move { result })
    }

    fn subscribe_new_heads(&self) -> BoxFuture<'_, TransportResult<HeaderStream>> {
        let next = self.lock().subscriptions.pop_front();
        Box::pin(async move {
            let rx = match next {
                Some(scripted) => scripted?,
                None => {
                    return Err(TransportError::Connection(
                        "no scripted subscription".to_string(),
                    ))
                }
            };
            let closed = futures_util::stream::once(async {
                Err(TransportError::Connection("subscription feed dropped".to_string()))
            });
            let stream = futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .chain(closed);
            Ok(stream.boxed())
        })
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("calls", &self.lock().calls.len())
            .finish()
    }
}
