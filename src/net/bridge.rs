//! The single point of contact with the native transport
//!
//! Both request clients go through [`TransportBridge`]. It flattens headers,
//! issues exactly one native call per logical request and converts the native
//! `(data, error)` callback into either a [`Completion`] handed to a callback
//! (event-driven clients) or a [`Deferred`] value (promise-style clients).

use crate::host::{NativeRequest, Transport};
use crate::net::Headers;
use crate::utils::TransportError;
use futures::channel::oneshot;
use log::{debug, warn};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Terminal outcome of one native call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The exchange finished and produced a body (possibly empty)
    Loaded(String),
    /// The native layer reported an error; any payload is discarded
    Failed(TransportError),
}

impl Completion {
    /// Normalize the native callback arguments
    pub fn from_native(data: String, error: Option<TransportError>) -> Self {
        match error {
            Some(error) => Self::Failed(error),
            None => Self::Loaded(data),
        }
    }

    /// As a `Result`
    pub fn into_result(self) -> Result<String, TransportError> {
        match self {
            Self::Loaded(data) => Ok(data),
            Self::Failed(error) => Err(error),
        }
    }
}

/// Describes one request before it is handed to the native layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: String,
    /// Target URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body
    pub body: String,
}

impl RequestDescriptor {
    fn into_native(self) -> NativeRequest {
        NativeRequest {
            method: self.method,
            url: self.url,
            headers: self.headers.to_map(),
            body: self.body,
        }
    }
}

/// Adapter between clients and the native transport
#[derive(Clone)]
pub struct TransportBridge {
    transport: Rc<dyn Transport>,
}

impl TransportBridge {
    /// Bridge onto `transport`
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Issue one native call; `on_complete` receives its single outcome
    pub fn dispatch(&self, request: RequestDescriptor, on_complete: impl FnOnce(Completion) + 'static) {
        debug!("native send: {} {}", request.method, request.url);
        let url = request.url.clone();
        self.transport.send(
            request.into_native(),
            Box::new(move |data, error| {
                if let Some(error) = &error {
                    warn!("native send {} failed: {}", url, error);
                }
                on_complete(Completion::from_native(data, error));
            }),
        );
    }

    /// Issue one native call and return a value that settles with its outcome
    pub fn dispatch_deferred(&self, request: RequestDescriptor) -> Deferred {
        let (sender, receiver) = oneshot::channel();
        self.dispatch(request, move |completion| {
            // The receiver may be gone if the caller stopped waiting.
            let _ = sender.send(completion.into_result());
        });
        Deferred { receiver }
    }
}

/// Outcome of a native call that settles exactly once
#[must_use = "a deferred value does nothing unless awaited"]
pub struct Deferred {
    receiver: oneshot::Receiver<Result<String, TransportError>>,
}

impl Future for Deferred {
    type Output = Result<String, TransportError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|settled| settled.unwrap_or_else(|_| Err(TransportError::dropped())))
    }
}
