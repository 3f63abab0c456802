//! Callback/event driven request client (`XMLHttpRequest`)
//!
//! The client only ever passes through `UNSENT (0) -> LOADING (2) -> DONE (4)`;
//! the host reports no intermediate phases. Listeners are single-slot per
//! event name: registering a second listener for a name replaces the first.

use crate::config::LegacyCompletion;
use crate::net::bridge::{Completion, RequestDescriptor, TransportBridge};
use crate::net::Headers;
use crate::utils::{Result, ShimError, TransportError};
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Status reported for every successful exchange
pub const STATUS_OK: u16 = 200;

/// `XMLHttpRequest.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    Unsent = 0,
    Loading = 2,
    Done = 4,
}

impl ReadyState {
    /// Numeric value as exposed to page code
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Handler invoked with the request as its receiver
pub type Handler = Rc<dyn Fn(&XmlHttpRequest)>;

/// Progress of the in-flight native call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Arrival {
    #[default]
    Idle,
    Waiting,
    Arrived,
}

#[derive(Default)]
struct XhrState {
    ready_state: ReadyState,
    status: u16,
    response_text: String,
    error: Option<TransportError>,
    method: Option<String>,
    url: Option<String>,
    headers: Headers,
    arrival: Arrival,
    listeners: HashMap<String, Handler>,
    onload: Option<Handler>,
    onerror: Option<Handler>,
    onreadystatechange: Option<Handler>,
}

/// Legacy request client.
///
/// Cloning yields another handle to the same request.
#[derive(Clone)]
pub struct XmlHttpRequest {
    state: Rc<RefCell<XhrState>>,
    bridge: TransportBridge,
    completion_mode: LegacyCompletion,
}

impl XmlHttpRequest {
    /// Create a client sending through `bridge`
    pub fn new(bridge: TransportBridge, completion_mode: LegacyCompletion) -> Self {
        Self {
            state: Rc::new(RefCell::new(XhrState::default())),
            bridge,
            completion_mode,
        }
    }

    /// Record method and url; may be called again before sending
    pub fn open(&self, method: &str, url: &str) {
        let mut state = self.state.borrow_mut();
        state.method = Some(method.to_string());
        state.url = Some(url.to_string());
    }

    /// Add a request header; a repeated name overwrites
    pub fn set_request_header(&self, name: &str, value: &str) {
        self.state.borrow_mut().headers.set(name, value);
    }

    /// Hand the request to the transport and move to `LOADING`.
    ///
    /// Fails with [`ShimError::AlreadyPending`] while a previous send on this
    /// client has not completed.
    pub fn send(&self, body: Option<&str>) -> Result<()> {
        let request = {
            let mut state = self.state.borrow_mut();
            if state.arrival == Arrival::Waiting {
                return Err(ShimError::AlreadyPending);
            }
            let (Some(method), Some(url)) = (state.method.clone(), state.url.clone()) else {
                return Err(ShimError::NotOpened);
            };
            state.arrival = Arrival::Waiting;
            state.ready_state = ReadyState::Loading;
            state.status = 0;
            state.response_text.clear();
            state.error = None;
            RequestDescriptor {
                method,
                url,
                headers: state.headers.clone(),
                body: body.unwrap_or_default().to_string(),
            }
        };

        let this = self.clone();
        self.bridge
            .dispatch(request, move |completion| this.complete(completion));
        Ok(())
    }

    /// Register the listener for `event`, replacing any earlier one
    pub fn add_event_listener(&self, event: &str, handler: impl Fn(&XmlHttpRequest) + 'static) {
        self.state
            .borrow_mut()
            .listeners
            .insert(event.to_string(), Rc::new(handler));
    }

    /// `onload`
    pub fn set_onload(&self, handler: impl Fn(&XmlHttpRequest) + 'static) {
        self.state.borrow_mut().onload = Some(Rc::new(handler));
    }

    /// `onerror`
    pub fn set_onerror(&self, handler: impl Fn(&XmlHttpRequest) + 'static) {
        self.state.borrow_mut().onerror = Some(Rc::new(handler));
    }

    /// `onreadystatechange`
    pub fn set_onreadystatechange(&self, handler: impl Fn(&XmlHttpRequest) + 'static) {
        self.state.borrow_mut().onreadystatechange = Some(Rc::new(handler));
    }

    /// Current ready state
    pub fn ready_state(&self) -> ReadyState {
        self.state.borrow().ready_state
    }

    /// HTTP status; 200 once loaded, 0 before completion or after a failure
    pub fn status(&self) -> u16 {
        self.state.borrow().status
    }

    /// Response body, set once loaded
    pub fn response_text(&self) -> String {
        self.state.borrow().response_text.clone()
    }

    /// Native error of a failed exchange
    pub fn error(&self) -> Option<TransportError> {
        self.state.borrow().error.clone()
    }

    /// Response headers are not modeled
    pub fn get_all_response_headers(&self) -> String {
        String::new()
    }

    /// Whether a native call is still outstanding
    pub fn is_pending(&self) -> bool {
        self.state.borrow().arrival == Arrival::Waiting
    }

    fn complete(&self, completion: Completion) {
        let event = match completion {
            Completion::Loaded(data) => {
                if data.is_empty() && self.completion_mode == LegacyCompletion::EmptySentinel {
                    debug!("xhr: empty payload treated as not yet delivered");
                    return;
                }
                let mut state = self.state.borrow_mut();
                state.arrival = Arrival::Arrived;
                state.ready_state = ReadyState::Done;
                state.status = STATUS_OK;
                state.response_text = data;
                "load"
            }
            Completion::Failed(error) => {
                let mut state = self.state.borrow_mut();
                state.arrival = Arrival::Arrived;
                state.ready_state = ReadyState::Done;
                state.status = 0;
                state.response_text.clear();
                state.error = Some(error);
                "error"
            }
        };

        // Handlers are cloned out first so they can freely use this client.
        let (listener, property, ready_state_change) = {
            let state = self.state.borrow();
            let property = if event == "load" {
                state.onload.clone()
            } else {
                state.onerror.clone()
            };
            (
                state.listeners.get(event).cloned(),
                property,
                state.onreadystatechange.clone(),
            )
        };
        for handler in [listener, property, ready_state_change].into_iter().flatten() {
            handler(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::EventLoop;
    use crate::host::ManualTransport;
    use pretty_assertions::assert_eq;

    fn client(mode: LegacyCompletion) -> (XmlHttpRequest, Rc<ManualTransport>, EventLoop) {
        let event_loop = EventLoop::new();
        let transport = Rc::new(ManualTransport::new(event_loop.clone()));
        let bridge = TransportBridge::new(transport.clone());
        (XmlHttpRequest::new(bridge, mode), transport, event_loop)
    }

    fn record(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> impl Fn(&XmlHttpRequest) + 'static {
        let log = log.clone();
        move |xhr: &XmlHttpRequest| log.borrow_mut().push(format!("{}:{}", name, xhr.ready_state().as_u8()))
    }

    #[test]
    fn test_send_moves_to_loading_immediately() {
        let (xhr, transport, _) = client(LegacyCompletion::Explicit);
        xhr.open("GET", "/x");
        assert_eq!(xhr.ready_state(), ReadyState::Unsent);
        xhr.send(None).unwrap();
        assert_eq!(xhr.ready_state(), ReadyState::Loading);
        assert_eq!(transport.call_count(), 1);
        assert_eq!(xhr.status(), 0);
    }

    #[test]
    fn test_load_fires_in_order() {
        let (xhr, transport, event_loop) = client(LegacyCompletion::Explicit);
        let log = Rc::new(RefCell::new(Vec::new()));
        xhr.add_event_listener("load", record(&log, "load"));
        xhr.set_onload(record(&log, "onload"));
        xhr.set_onreadystatechange(record(&log, "onreadystatechange"));
        xhr.open("GET", "/x");
        xhr.send(None).unwrap();

        transport.respond(0, "hello");
        event_loop.run_until_idle();

        assert_eq!(xhr.ready_state(), ReadyState::Done);
        assert_eq!(xhr.status(), 200);
        assert_eq!(xhr.response_text(), "hello");
        assert_eq!(
            *log.borrow(),
            vec!["load:4", "onload:4", "onreadystatechange:4"]
        );
    }

    #[test]
    fn test_listener_slot_last_registration_wins() {
        let (xhr, transport, event_loop) = client(LegacyCompletion::Explicit);
        let log = Rc::new(RefCell::new(Vec::new()));
        xhr.add_event_listener("load", record(&log, "first"));
        xhr.add_event_listener("load", record(&log, "second"));
        xhr.open("GET", "/x");
        xhr.send(None).unwrap();
        transport.respond(0, "ok");
        event_loop.run_until_idle();
        assert_eq!(*log.borrow(), vec!["second:4"]);
    }

    #[test]
    fn test_headers_and_body_reach_transport() {
        let (xhr, transport, _) = client(LegacyCompletion::Explicit);
        xhr.open("GET", "/ignored");
        xhr.open("POST", "/api");
        xhr.set_request_header("X-Token", "a");
        xhr.set_request_header("X-Token", "b");
        xhr.send(Some("data")).unwrap();

        let request = transport.requests()[0].request.clone();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "/api");
        assert_eq!(request.body, "data");
        assert_eq!(request.headers.get("X-Token").map(String::as_str), Some("b"));
    }

    #[test]
    fn test_second_send_while_pending_is_rejected() {
        let (xhr, transport, event_loop) = client(LegacyCompletion::Explicit);
        xhr.open("GET", "/x");
        xhr.send(None).unwrap();
        assert!(matches!(xhr.send(None), Err(ShimError::AlreadyPending)));
        assert_eq!(transport.call_count(), 1);

        transport.respond(0, "ok");
        event_loop.run_until_idle();
        xhr.send(None).unwrap();
        assert_eq!(transport.call_count(), 2);
        assert_eq!(xhr.ready_state(), ReadyState::Loading);
    }

    #[test]
    fn test_send_without_open() {
        let (xhr, transport, _) = client(LegacyCompletion::Explicit);
        assert!(matches!(xhr.send(None), Err(ShimError::NotOpened)));
        assert_eq!(transport.call_count(), 0);
        assert_eq!(xhr.ready_state(), ReadyState::Unsent);
    }

    #[test]
    fn test_empty_payload_completes() {
        let (xhr, transport, event_loop) = client(LegacyCompletion::Explicit);
        let log = Rc::new(RefCell::new(Vec::new()));
        xhr.set_onload(record(&log, "onload"));
        xhr.open("GET", "/empty");
        xhr.send(None).unwrap();
        transport.respond(0, "");
        event_loop.run_until_idle();

        assert_eq!(xhr.ready_state(), ReadyState::Done);
        assert_eq!(xhr.status(), 200);
        assert_eq!(*log.borrow(), vec!["onload:4"]);
    }

    #[test]
    fn test_empty_payload_sentinel_keeps_waiting() {
        let (xhr, transport, event_loop) = client(LegacyCompletion::EmptySentinel);
        let log = Rc::new(RefCell::new(Vec::new()));
        xhr.set_onload(record(&log, "onload"));
        xhr.open("GET", "/empty");
        xhr.send(None).unwrap();
        transport.respond(0, "");
        event_loop.run_until_idle();

        assert_eq!(xhr.ready_state(), ReadyState::Loading);
        assert!(xhr.is_pending());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_failure_fires_error_path() {
        let (xhr, transport, event_loop) = client(LegacyCompletion::Explicit);
        let log = Rc::new(RefCell::new(Vec::new()));
        xhr.add_event_listener("error", record(&log, "error"));
        xhr.add_event_listener("load", record(&log, "load"));
        xhr.set_onerror(record(&log, "onerror"));
        xhr.set_onload(record(&log, "onload"));
        xhr.set_onreadystatechange(record(&log, "onreadystatechange"));
        xhr.open("GET", "/down");
        xhr.send(None).unwrap();
        transport.fail(0, "connection refused");
        event_loop.run_until_idle();

        assert_eq!(xhr.ready_state(), ReadyState::Done);
        assert_eq!(xhr.status(), 0);
        assert_eq!(xhr.error(), Some(TransportError::new("connection refused")));
        assert_eq!(
            *log.borrow(),
            vec!["error:4", "onerror:4", "onreadystatechange:4"]
        );
    }

    #[test]
    fn test_handler_can_read_client() {
        let (xhr, transport, event_loop) = client(LegacyCompletion::Explicit);
        let seen = Rc::new(RefCell::new(String::new()));
        let sink = seen.clone();
        xhr.set_onload(move |this| *sink.borrow_mut() = this.response_text());
        xhr.open("GET", "/x");
        xhr.send(None).unwrap();
        transport.respond(0, "payload");
        event_loop.run_until_idle();
        assert_eq!(*seen.borrow(), "payload");
        assert_eq!(xhr.get_all_response_headers(), "");
    }
}
