//! Network transport backed by reqwest

use super::{NativeCallback, NativeRequest, Transport};
use crate::event_loop::{EventLoop, LoopHandle, Ticket};
use crate::utils::{Result, ShimError, TransportError};
use log::{debug, warn};
use reqwest::Method;
use tokio::runtime::Runtime;
use url::Url;

/// Real HTTP transport.
///
/// Requests run on a private tokio runtime; their outcome is posted back to the
/// page's event loop, so callbacks always run on the loop thread.
pub struct HttpTransport {
    runtime: Runtime,
    client: reqwest::Client,
    origin: Url,
    event_loop: EventLoop,
    handle: LoopHandle,
}

impl HttpTransport {
    /// Create a transport resolving relative URLs against `origin`
    pub fn new(origin: &str, user_agent: &str, event_loop: EventLoop) -> Result<Self> {
        let origin = Url::parse(origin).map_err(|e| ShimError::InvalidUrl(format!("{}: {}", origin, e)))?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ShimError::Config(format!("http client: {}", e)))?;
        let handle = event_loop.handle();

        Ok(Self {
            runtime,
            client,
            origin,
            event_loop,
            handle,
        })
    }

    /// Turn a page-supplied URL into an absolute one.
    ///
    /// A leading `.` is dropped and bare relative paths are rooted, so `./api`
    /// and `api` both address `/api` on the origin.
    pub fn normalize_url(&self, raw: &str) -> Result<Url> {
        let mut url = raw.strip_prefix('.').unwrap_or(raw).to_string();
        if !url.starts_with("http") && !url.starts_with('/') {
            url.insert(0, '/');
        }
        self.origin
            .join(&url)
            .map_err(|e| ShimError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    fn fail_later(&self, ticket: Ticket, message: String) {
        warn!("xhr: {}", message);
        self.handle
            .complete(ticket, String::new(), Some(TransportError::new(message)));
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: NativeRequest, callback: NativeCallback) {
        let ticket = self.event_loop.park(callback);

        let url = match self.normalize_url(&request.url) {
            Ok(url) => url,
            Err(e) => return self.fail_later(ticket, format!("new http req: {}", e)),
        };
        let method = match Method::from_bytes(request.method.to_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(e) => return self.fail_later(ticket, format!("new http req: {}", e)),
        };

        debug!("xhr: {} {}", method, url);
        let mut builder = self.client.request(method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let builder = builder.body(request.body);
        let handle = self.handle.clone();

        self.runtime.spawn(async move {
            let outcome = match builder.send().await {
                Ok(response) => response.text().await.map_err(|e| format!("read all: {}", e)),
                Err(e) => Err(format!("xhrq: {}", e)),
            };
            match outcome {
                Ok(body) => handle.complete(ticket, body, None),
                Err(message) => {
                    warn!("xhr: {}", message);
                    handle.complete(
                        ticket,
                        String::new(),
                        Some(TransportError::new(message)),
                    );
                }
            }
        });
    }
}
