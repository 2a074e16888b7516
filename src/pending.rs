//! Correlation of responses with in-flight requests

use crate::protocol::{RequestId, Response};
use std::collections::HashMap;
use tokio::sync::oneshot;

/// In-flight requests keyed by id, each with a single-use result slot.
#[derive(Debug, Default)]
pub struct PendingRequests {
    slots: HashMap<RequestId, oneshot::Sender<Response>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a slot for `id`. Re-registering an id replaces the old slot.
    pub fn register(&mut self, id: RequestId) -> oneshot::Receiver<Response> {
        let (tx, rx) = oneshot::channel();
        if self.slots.insert(id, tx).is_some() {
            tracing::warn!(%id, "replacing pending slot for request");
        }
        rx
    }

    /// Route `response` to its slot.
    ///
    /// Returns `false` when nothing is waiting on the response's id; the
    /// response is dropped in that case.
    pub fn complete(&mut self, response: Response) -> bool {
        let Some(id) = response.id() else {
            return false;
        };
        match self.slots.remove(&id) {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Forget a slot without fulfilling it.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        self.slots.remove(&id).is_some()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
