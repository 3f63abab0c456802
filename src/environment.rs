//! Page environment
//!
//! Everything a page script reaches through globals (`location`, `navigator`,
//! storage, `fetch`, `XMLHttpRequest`, `getComputedStyle`, ...) hangs off one
//! [`Environment`], built once per page. Construction order is fixed:
//! configuration, host bindings and event loop first, then the transport
//! bridge, then the globals derived from configuration, then storage.

use crate::config::ShimConfig;
use crate::dom::{NodeId, PathResolver, SharedDocument};
use crate::encoding::TextEncoder;
use crate::event_loop::EventLoop;
use crate::host::{HostBindings, HttpTransport, StyleEngine};
use crate::net::{FetchClient, RequestInit, Resource, ResponseFuture, TransportBridge, XmlHttpRequest};
use crate::storage::Storage;
use crate::style::ComputedStyle;
use crate::utils::Result;
use futures::FutureExt;
use log::{debug, error};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use url::Url;

/// `window.location`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub href: String,
    pub protocol: String,
    pub host: String,
    pub hostname: String,
    pub port: String,
    pub pathname: String,
    pub search: String,
    pub hash: String,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            href: "https://example.com".to_string(),
            protocol: "https:".to_string(),
            host: "example.com".to_string(),
            hostname: "example.com".to_string(),
            port: "443".to_string(),
            pathname: "/".to_string(),
            search: String::new(),
            hash: String::new(),
        }
    }
}

impl Location {
    /// Location of a page served from `origin`; falls back to the defaults
    /// when `origin` does not parse
    pub fn from_origin(origin: &str) -> Self {
        let url = match Url::parse(origin) {
            Ok(url) => url,
            Err(e) => {
                error!("parse {}: {}", origin, e);
                return Self::default();
            }
        };
        let hostname = url.host_str().unwrap_or_default().to_string();
        let host = match url.port() {
            Some(port) => format!("{}:{}", hostname, port),
            None => hostname.clone(),
        };
        Self {
            href: url.to_string(),
            protocol: format!("{}:", url.scheme()),
            host,
            hostname,
            port: url
                .port_or_known_default()
                .map(|p| p.to_string())
                .unwrap_or_default(),
            pathname: url.path().to_string(),
            search: url.query().map(|q| format!("?{}", q)).unwrap_or_default(),
            hash: url.fragment().map(|f| format!("#{}", f)).unwrap_or_default(),
        }
    }

    /// `protocol//host`
    pub fn origin(&self) -> String {
        format!("{}//{}", self.protocol, self.host)
    }
}

/// `navigator`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    pub platform: String,
    pub user_agent: String,
}

/// `screen` plus the window offset on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

/// `history`; navigation is not modeled
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct History;

impl History {
    pub fn replace_state(&self, _state: &serde_json::Value, _title: &str, _url: Option<&str>) {}
}

/// The page-facing surface built on top of the host primitives
pub struct Environment {
    config: ShimConfig,
    host: HostBindings,
    event_loop: EventLoop,
    document: SharedDocument,
    resolver: PathResolver,
    bridge: TransportBridge,
    location: Location,
    navigator: Navigator,
    screen: Screen,
    history: History,
    local_storage: Storage,
    session_storage: Storage,
}

impl Environment {
    /// Build an environment over the given host bindings
    pub fn new(
        config: ShimConfig,
        host: HostBindings,
        event_loop: EventLoop,
        document: SharedDocument,
    ) -> Self {
        let bridge = TransportBridge::new(host.transport.clone());
        let resolver = PathResolver::new(config.root_tag.clone());
        let location = Location::from_origin(&config.origin);
        let navigator = Navigator {
            platform: config.platform.clone(),
            user_agent: config.user_agent.clone(),
        };
        let screen = Screen {
            width: config.screen_width,
            height: config.screen_height,
            x: config.screen_x,
            y: config.screen_y,
        };
        debug!("environment ready for {}", location.href);

        Self {
            config,
            host,
            event_loop,
            document,
            resolver,
            bridge,
            location,
            navigator,
            screen,
            history: History,
            local_storage: Storage::new(),
            session_storage: Storage::new(),
        }
    }

    /// Environment using the real network and the given style engine
    pub fn with_network(
        config: ShimConfig,
        style: Rc<dyn StyleEngine>,
        document: SharedDocument,
    ) -> Result<Self> {
        let event_loop = EventLoop::new();
        let transport = HttpTransport::new(&config.origin, &config.user_agent, event_loop.clone())?;
        let host = HostBindings::new(Rc::new(transport), style);
        Ok(Self::new(config, host, event_loop, document))
    }

    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    pub fn host(&self) -> &HostBindings {
        &self.host
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Bridge every request client of this page dispatches through
    pub fn bridge(&self) -> &TransportBridge {
        &self.bridge
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn history(&self) -> History {
        self.history
    }

    pub fn local_storage(&self) -> &Storage {
        &self.local_storage
    }

    pub fn session_storage(&self) -> &Storage {
        &self.session_storage
    }

    /// `new XMLHttpRequest()`
    pub fn xml_http_request(&self) -> XmlHttpRequest {
        XmlHttpRequest::new(self.bridge.clone(), self.config.legacy_completion)
    }

    /// `fetch(resource, init)`
    pub fn fetch(&self, resource: impl Into<Resource>, init: Option<RequestInit>) -> ResponseFuture {
        FetchClient::new(self.bridge.clone()).fetch(resource, init)
    }

    /// `getComputedStyle(element, pseudo)`
    pub fn get_computed_style(&self, element: Option<NodeId>, pseudo_element: Option<&str>) -> ComputedStyle {
        ComputedStyle::new(
            self.document.clone(),
            element,
            pseudo_element,
            self.resolver.clone(),
            self.host.style.clone(),
        )
    }

    /// Address of `element` as handed to the host
    pub fn address_of(&self, element: Option<NodeId>) -> Option<String> {
        self.resolver.resolve(&*self.document.borrow(), element)
    }

    /// Element at `address`, walking from the root element
    pub fn element_at(&self, address: &str) -> Option<NodeId> {
        let document = self.document.borrow();
        let root = document
            .get_elements_by_tag_name(&self.config.root_tag)
            .into_iter()
            .next()?;
        self.resolver.locate(&*document, root, address)
    }

    /// `new TextEncoder()`
    pub fn text_encoder(&self) -> TextEncoder {
        TextEncoder::new()
    }

    /// `btoa`
    pub fn btoa(&self, bytes: &[u8]) -> String {
        self.host.btoa(bytes)
    }

    /// `atob`
    pub fn atob(&self, encoded: &str) -> Result<Vec<u8>> {
        self.host.atob(encoded)
    }

    /// Run queued work without waiting for the network
    pub fn run_until_idle(&self) -> usize {
        self.event_loop.run_until_idle()
    }

    /// Drive the event loop until `future` settles.
    ///
    /// Returns `None` if the loop runs out of work, or waits longer than the
    /// idle timeout for a completion, before the future is ready.
    pub fn block_on<F: Future>(&self, future: F) -> Option<F::Output> {
        let timeout = Duration::from_millis(self.config.idle_timeout_ms);
        futures::pin_mut!(future);
        loop {
            if let Some(output) = future.as_mut().now_or_never() {
                return Some(output);
            }
            if !self.event_loop.turn(timeout) {
                return future.as_mut().now_or_never();
            }
        }
    }

    /// Run until every outstanding native call has completed or the
    /// configured idle timeout elapses
    pub fn run(&self) -> bool {
        self.event_loop
            .run(Duration::from_millis(self.config.idle_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::host::{ManualTransport, QueryStyleEngine};
    use pretty_assertions::assert_eq;

    fn environment() -> (Environment, Rc<ManualTransport>) {
        let event_loop = EventLoop::new();
        let transport = Rc::new(ManualTransport::new(event_loop.clone()));
        let style = Rc::new(QueryStyleEngine::new(|address, property| {
            Ok(format!("{} {}", address, property))
        }));
        let document = Document::parse_html("<body><div></div><p></p></body>").into_shared();
        let host = HostBindings::new(transport.clone(), style);
        (
            Environment::new(ShimConfig::default(), host, event_loop, document),
            transport,
        )
    }

    #[test]
    fn test_location_from_origin() {
        let location = Location::from_origin("https://shop.test:8443/cart?x=1#top");
        assert_eq!(location.protocol, "https:");
        assert_eq!(location.host, "shop.test:8443");
        assert_eq!(location.hostname, "shop.test");
        assert_eq!(location.port, "8443");
        assert_eq!(location.pathname, "/cart");
        assert_eq!(location.search, "?x=1");
        assert_eq!(location.hash, "#top");
        assert_eq!(location.origin(), "https://shop.test:8443");
    }

    #[test]
    fn test_location_defaults_on_bad_origin() {
        assert_eq!(Location::from_origin("::"), Location::default());
    }

    #[test]
    fn test_globals_from_config() {
        let (env, _) = environment();
        assert_eq!(env.location().hostname, "example.com");
        assert_eq!(env.location().port, "443");
        assert_eq!(env.navigator().user_agent, "pageshim");
        assert_eq!(env.screen().width, 1280);
        assert_eq!(env.screen().y, 25);
    }

    #[test]
    fn test_storages_are_independent() {
        let (env, _) = environment();
        env.local_storage().set_item("k", 1);
        assert_eq!(env.session_storage().get_item("k"), None);
    }

    #[test]
    fn test_computed_style_through_host() {
        let (env, _) = environment();
        let p = env.document().borrow().get_elements_by_tag_name("p")[0];
        let style = env.get_computed_style(Some(p), None);
        assert_eq!(style.get_property_value("color"), "/0/1 color");
        assert_eq!(env.address_of(Some(p)).as_deref(), Some("/0/1"));
        assert_eq!(env.element_at("/0/1"), Some(p));
    }

    #[test]
    fn test_clients_share_the_transport() {
        let (env, transport) = environment();
        let xhr = env.xml_http_request();
        xhr.open("GET", "/a");
        xhr.send(None).unwrap();
        let pending = env.fetch("/b", None);
        assert_eq!(transport.call_count(), 2);

        transport.respond(0, "a");
        transport.respond(1, "b");
        env.run_until_idle();
        assert_eq!(xhr.response_text(), "a");
        assert_eq!(tokio_test::block_on(pending).unwrap().text(), "b");
        assert!(env.run());
    }

    #[test]
    fn test_base64_and_encoder() {
        let (env, _) = environment();
        assert_eq!(env.btoa(b"hi"), "aGk=");
        assert_eq!(env.atob("aGk=").unwrap(), b"hi");
        assert_eq!(env.text_encoder().encode("hi"), b"hi".to_vec());
    }

    /// Answers every request on the next loop turn with "METHOD url"
    struct EchoTransport {
        event_loop: EventLoop,
    }

    impl crate::host::Transport for EchoTransport {
        fn send(&self, request: crate::host::NativeRequest, callback: crate::host::NativeCallback) {
            let data = format!("{} {}", request.method, request.url);
            self.event_loop.post(move || callback(data, None));
        }
    }

    #[test]
    fn test_block_on_drives_chained_requests() {
        let event_loop = EventLoop::new();
        let transport = Rc::new(EchoTransport {
            event_loop: event_loop.clone(),
        });
        let host = HostBindings::new(transport, Rc::new(crate::host::NullStyleEngine));
        let env = Environment::new(ShimConfig::default(), host, event_loop, Document::new().into_shared());

        let chained = async {
            let first = env.fetch("/a", None).await.unwrap();
            env.fetch(format!("{}/b", first.text().replace(' ', "")), None).await
        };
        let response = env.block_on(chained).unwrap().unwrap();
        assert_eq!(response.text(), "GET GET/a/b");
    }

    #[test]
    fn test_block_on_gives_up_when_nothing_can_complete() {
        let (env, transport) = environment();
        let pending = env.fetch("/never", None);
        assert!(env.block_on(pending).is_none());
        assert_eq!(transport.outstanding(), 1);

        let answered = env.fetch("/now", None);
        transport.respond(1, "done");
        assert_eq!(env.block_on(answered).unwrap().unwrap().text(), "done");
    }
}
