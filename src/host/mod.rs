//! Host boundary
//!
//! The embedding process provides a handful of native primitives: a raw
//! request transport, a style engine keyed by element address, and base64.
//! Everything page-facing is synthesized on top of these.

pub mod base64;
mod http;
mod manual;
mod style;

pub use http::HttpTransport;
pub use manual::{ManualTransport, RecordedRequest};
pub use style::{NullStyleEngine, QueryStyleEngine};

use crate::utils::TransportError;
use std::collections::HashMap;
use std::rc::Rc;

/// Completion callback handed to the native transport.
///
/// Invoked exactly once, asynchronously, with either a payload and no error or
/// an error and no usable payload.
pub type NativeCallback = Box<dyn FnOnce(String, Option<TransportError>)>;

/// One request as seen by the native transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeRequest {
    /// HTTP method, passed through as given
    pub method: String,
    /// Request URL, possibly relative to the page origin
    pub url: String,
    /// Plain header mapping
    pub headers: HashMap<String, String>,
    /// Request body, empty when none was given
    pub body: String,
}

/// Native network primitive
pub trait Transport {
    /// Perform one exchange and eventually call `callback` exactly once
    fn send(&self, request: NativeRequest, callback: NativeCallback);
}

/// Native style primitive
pub trait StyleEngine {
    /// Computed value of `property` for the element at `address`.
    ///
    /// Returns an empty string when the address is `None` or the value is unknown.
    fn style(
        &self,
        address: Option<&str>,
        pseudo_element: Option<&str>,
        property: &str,
        extra: Option<&str>,
    ) -> String;
}

/// The set of native primitives exposed by the host
#[derive(Clone)]
pub struct HostBindings {
    /// Raw transport
    pub transport: Rc<dyn Transport>,
    /// Style computation
    pub style: Rc<dyn StyleEngine>,
}

impl HostBindings {
    /// Bundle a transport and a style engine
    pub fn new(transport: Rc<dyn Transport>, style: Rc<dyn StyleEngine>) -> Self {
        Self { transport, style }
    }

    /// Encode bytes as standard base64
    pub fn btoa(&self, bytes: &[u8]) -> String {
        self::base64::btoa(bytes)
    }

    /// Decode standard base64
    pub fn atob(&self, encoded: &str) -> crate::Result<Vec<u8>> {
        self::base64::atob(encoded)
    }
}
