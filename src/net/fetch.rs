//! Promise-style request client (`fetch`, `Request`, `Response`)

use crate::net::bridge::{Deferred, RequestDescriptor, TransportBridge};
use crate::net::Headers;
use crate::utils::{Result, ShimError, TransportError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Method used when none is given
pub const DEFAULT_METHOD: &str = "GET";

/// Options bag accepted by `fetch` and `Request::new`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestInit {
    /// HTTP method
    pub method: Option<String>,
    /// Request body
    pub body: Option<String>,
    /// Request headers
    pub headers: Option<Headers>,
    /// Any other option, carried through untouched
    pub extra: HashMap<String, Value>,
}

impl RequestInit {
    /// Empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the method
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set one header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.get_or_insert_with(Headers::new).set(name, value);
        self
    }

    /// Set any other option
    pub fn option(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Build from a JSON options object; unknown keys land in `extra`.
    ///
    /// Non-string header and body values are stringified. Headers keep the
    /// order they appear in the object.
    pub fn from_json(options: &Value) -> Self {
        let mut init = Self::new();
        let Some(map) = options.as_object() else {
            return init;
        };
        for (key, value) in map {
            match key.as_str() {
                "method" => init.method = Some(json_to_string(value)),
                "body" => init.body = Some(json_to_string(value)),
                "headers" => {
                    init.headers = value.as_object().map(|h| {
                        h.iter()
                            .map(|(name, value)| (name.clone(), json_to_string(value)))
                            .collect()
                    })
                }
                _ => {
                    init.extra.insert(key.clone(), value.clone());
                }
            }
        }
        init
    }
}

fn json_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A request object; every option it was built with stays readable
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    url: String,
    method: Option<String>,
    body: Option<String>,
    headers: Headers,
    properties: HashMap<String, Value>,
}

impl Request {
    /// Build a request from a url and optional options bag
    pub fn new(url: impl Into<String>, init: Option<RequestInit>) -> Self {
        let init = init.unwrap_or_default();
        Self {
            url: url.into(),
            method: init.method,
            body: init.body,
            headers: init.headers.unwrap_or_default(),
            properties: init.extra,
        }
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Method, defaulting to `GET`
    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or(DEFAULT_METHOD)
    }

    /// Body, empty when none was given
    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }

    /// Request headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable request headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// An option that is not otherwise modeled (e.g. `mode`, `cache`)
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// First argument of `fetch`
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    /// A bare URL
    Url(String),
    /// A prepared request
    Request(Request),
}

impl From<&str> for Resource {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for Resource {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<Request> for Resource {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

/// A settled response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    data: String,
}

impl Response {
    /// Wrap a raw body
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    /// Status of every delivered response
    pub fn status(&self) -> u16 {
        crate::net::xhr::STATUS_OK
    }

    /// Whether the status is in the 2xx range
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status())
    }

    /// Raw body
    pub fn body(&self) -> &str {
        &self.data
    }

    /// Raw body as an owned string
    pub fn text(&self) -> String {
        self.data.clone()
    }

    /// Parse the body as JSON.
    ///
    /// A malformed body is reported here, not through the fetch future, so
    /// each call must be checked on its own.
    pub fn json(&self) -> Result<Value> {
        self.json_as()
    }

    /// Parse the body as JSON into `T`
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).map_err(ShimError::MalformedBody)
    }
}

/// Pending result of `fetch`; settles exactly once
#[must_use = "fetch does nothing observable unless the response is awaited"]
pub struct ResponseFuture {
    deferred: Deferred,
}

impl Future for ResponseFuture {
    type Output = std::result::Result<Response, TransportError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.deferred)
            .poll(cx)
            .map(|settled| settled.map(Response::new))
    }
}

/// The `fetch` entry point
#[derive(Clone)]
pub struct FetchClient {
    bridge: TransportBridge,
}

impl FetchClient {
    /// Client sending through `bridge`
    pub fn new(bridge: TransportBridge) -> Self {
        Self { bridge }
    }

    /// Issue one request.
    ///
    /// For a [`Request`] resource, fields present in `init` take precedence.
    /// The future rejects with the native error verbatim.
    pub fn fetch(&self, resource: impl Into<Resource>, init: Option<RequestInit>) -> ResponseFuture {
        let descriptor = Self::describe(resource.into(), init.unwrap_or_default());
        ResponseFuture {
            deferred: self.bridge.dispatch_deferred(descriptor),
        }
    }

    fn describe(resource: Resource, init: RequestInit) -> RequestDescriptor {
        let (url, method, body, headers) = match resource {
            Resource::Url(url) => (url, None, None, Headers::new()),
            Resource::Request(request) => (request.url, request.method, request.body, request.headers),
        };
        RequestDescriptor {
            url,
            method: init
                .method
                .or(method)
                .unwrap_or_else(|| DEFAULT_METHOD.to_string()),
            body: init.body.or(body).unwrap_or_default(),
            headers: init.headers.unwrap_or(headers),
        }
    }
}
