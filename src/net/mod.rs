//! Network-facing page APIs
//!
//! `XMLHttpRequest` and `fetch` both sit on [`TransportBridge`], which owns the
//! single call into the host transport.

pub mod bridge;
pub mod fetch;
mod headers;
pub mod xhr;

pub use bridge::{Completion, Deferred, RequestDescriptor, TransportBridge};
pub use fetch::{FetchClient, Request, RequestInit, Resource, Response, ResponseFuture};
pub use headers::Headers;
pub use xhr::{ReadyState, XmlHttpRequest};
