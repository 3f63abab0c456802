//! Transport completed by hand
//!
//! Records every native call and holds its callback until the embedder decides
//! how the exchange ends. Completions are queued on the event loop, never run
//! inline, so callers observe the same ordering as with a real network.

use super::{NativeCallback, NativeRequest, Transport};
use crate::event_loop::EventLoop;
use crate::utils::TransportError;
use log::debug;
use std::cell::RefCell;

/// A native call captured by [`ManualTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Position in call order
    pub index: usize,
    /// What the client handed to the native layer
    pub request: NativeRequest,
}

/// Transport whose exchanges are finished explicitly
pub struct ManualTransport {
    event_loop: EventLoop,
    requests: RefCell<Vec<NativeRequest>>,
    callbacks: RefCell<Vec<Option<NativeCallback>>>,
}

impl ManualTransport {
    /// Transport delivering completions through `event_loop`
    pub fn new(event_loop: EventLoop) -> Self {
        Self {
            event_loop,
            requests: RefCell::new(Vec::new()),
            callbacks: RefCell::new(Vec::new()),
        }
    }

    /// Every native call made so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .borrow()
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, request)| RecordedRequest { index, request })
            .collect()
    }

    /// Number of native calls made so far
    pub fn call_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Number of calls whose callback has not been scheduled yet
    pub fn outstanding(&self) -> usize {
        self.callbacks.borrow().iter().filter(|c| c.is_some()).count()
    }

    /// Finish call `index` successfully with `data`.
    ///
    /// Returns false when the call does not exist or was already finished.
    pub fn respond(&self, index: usize, data: impl Into<String>) -> bool {
        self.finish(index, data.into(), None)
    }

    /// Finish call `index` with a native error
    pub fn fail(&self, index: usize, error: impl Into<String>) -> bool {
        self.finish(index, String::new(), Some(TransportError::new(error)))
    }

    fn finish(&self, index: usize, data: String, error: Option<TransportError>) -> bool {
        let callback = self
            .callbacks
            .borrow_mut()
            .get_mut(index)
            .and_then(Option::take);
        match callback {
            Some(callback) => {
                self.event_loop.post(move || callback(data, error));
                true
            }
            None => false,
        }
    }
}

impl Transport for ManualTransport {
    fn send(&self, request: NativeRequest, callback: NativeCallback) {
        debug!("manual transport: {} {}", request.method, request.url);
        self.requests.borrow_mut().push(request);
        self.callbacks.borrow_mut().push(Some(callback));
    }
}
