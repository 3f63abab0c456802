//! Request clients, element handles, `getComputedStyle` and `TextEncoder`
//! for page scripts
//!
//! The classes themselves are a small script prelude; the work happens in the
//! native functions on the hidden `__pageshim` object, which sit on the same
//! [`XmlHttpRequest`], [`FetchClient`] and [`ComputedStyle`] the host uses.
//!
//! Completions never call into script directly. Request handlers run inside
//! event-loop tasks and only queue a [`XhrNotice`]; fetches park their Boa
//! promise next to the [`ResponseFuture`]. [`settle`] then replays both into
//! the context, in the order the loop produced them.

use super::bindings::{js_str, script_error};
use crate::config::LegacyCompletion;
use crate::dom::{NodeId, PathResolver, SharedDocument};
use crate::encoding::TextEncoder;
use crate::environment::Environment;
use crate::host::StyleEngine;
use crate::net::{
    FetchClient, Request, RequestInit, Resource, Response, ResponseFuture, TransportBridge, XmlHttpRequest,
};
use crate::style::ComputedStyle;
use crate::utils::{Result, TransportError};
use boa_engine::object::builtins::{JsArray, JsPromise};
use boa_engine::{
    Context, JsArgs, JsError, JsNativeError, JsObject, JsResult, JsValue as BoaJsValue, NativeFunction, Source,
    builtins::promise::ResolvingFunctions, js_string, object::ObjectInitializer, property::Attribute,
};
use boa_gc::{Finalize, Trace};
use futures::FutureExt;
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

/// Script side of the request clients and DOM handles
const PRELUDE: &str = r#"
    function Headers(init) {
        Object.defineProperty(this, '_map', { value: new Map() });
        if (init === undefined || init === null) return;
        if (init instanceof Headers) {
            var map = this._map;
            init._map.forEach(function (value, name) { map.set(name, value); });
        } else if (Array.isArray(init)) {
            for (var i = 0; i < init.length; i++) this.append(init[i][0], init[i][1]);
        } else {
            for (var name in init) this.set(name, init[name]);
        }
    }

    Headers.prototype.set = function (name, value) {
        this._map.set(String(name), String(value));
    };
    Headers.prototype.append = Headers.prototype.set;
    Headers.prototype.get = function (name) {
        return this._map.get(String(name));
    };
    Headers.prototype.has = function (name) {
        return this._map.has(String(name));
    };
    Headers.prototype.keys = function () {
        return Array.from(this._map.keys());
    };
    Headers.prototype.forEach = function (callback, thisArg) {
        var self = this;
        this._map.forEach(function (value, name) { callback.call(thisArg, value, name, self); });
    };

    function Request(url, options) {
        if (options) {
            for (var key in options) this[key] = options[key];
        }
        this.url = String(url);
        this.headers = new Headers(this.headers);
    }

    function Response(body) {
        this._body = body === undefined || body === null ? '' : String(body);
        this.status = 200;
        this.ok = true;
    }

    Response.prototype.body = function () { return this._body; };
    Response.prototype.text = function () { return this._body; };
    Response.prototype.json = function () { return JSON.parse(this._body); };

    function __pageshimOptions(bag) {
        var plain = {};
        for (var key in bag) {
            var value = bag[key];
            if (key === 'url' || value === undefined || typeof value === 'function') continue;
            if (key === 'headers') {
                var headers = {};
                new Headers(value).forEach(function (v, n) { headers[n] = v; });
                value = headers;
            }
            plain[key] = value;
        }
        return JSON.stringify(plain);
    }

    function fetch(resource, init) {
        var request = resource instanceof Request ? resource : null;
        var url = request ? request.url : String(resource);
        var options = init === undefined || init === null ? null : __pageshimOptions(init);
        return __pageshim
            .fetch(url, request ? __pageshimOptions(request) : null, options)
            .then(function (data) { return new Response(data); });
    }

    var __pageshimXhrs = {};

    function XMLHttpRequest() {
        Object.defineProperty(this, '_id', { value: __pageshim.xhrCreate() });
        Object.defineProperty(this, '_listeners', { value: {} });
        this.onload = null;
        this.onerror = null;
        this.onreadystatechange = null;
    }

    XMLHttpRequest.UNSENT = 0;
    XMLHttpRequest.LOADING = 2;
    XMLHttpRequest.DONE = 4;

    ['readyState', 'status', 'responseText'].forEach(function (field) {
        Object.defineProperty(XMLHttpRequest.prototype, field, {
            get: function () { return __pageshim.xhrField(this._id, field); }
        });
    });

    XMLHttpRequest.prototype.open = function (method, url) {
        __pageshim.xhrOpen(this._id, String(method), String(url));
    };
    XMLHttpRequest.prototype.setRequestHeader = function (name, value) {
        __pageshim.xhrSetHeader(this._id, String(name), String(value));
    };
    XMLHttpRequest.prototype.addEventListener = function (name, listener) {
        this._listeners[name] = listener;
    };
    XMLHttpRequest.prototype.getAllResponseHeaders = function () {
        return __pageshim.xhrField(this._id, 'responseHeaders');
    };
    XMLHttpRequest.prototype.send = function (body) {
        var previous = __pageshimXhrs[this._id];
        __pageshimXhrs[this._id] = this;
        try {
            __pageshim.xhrSend(this._id, body === undefined || body === null ? null : String(body));
        } catch (e) {
            if (previous === undefined) delete __pageshimXhrs[this._id];
            throw e;
        }
    };

    function __pageshimXhrEvent(id, slot) {
        var xhr = __pageshimXhrs[id];
        if (xhr === undefined) return;
        var handler = slot === 'load' || slot === 'error' ? xhr._listeners[slot] : xhr[slot];
        if (slot === 'onreadystatechange') delete __pageshimXhrs[id];
        if (typeof handler === 'function') handler.call(xhr);
    }

    var __pageshimElements = {};

    function Element(node) {
        Object.defineProperty(this, '_node', { value: node });
    }

    function __pageshimElement(node) {
        if (node === null || node === undefined) return null;
        var element = __pageshimElements[node];
        if (element === undefined) {
            element = new Element(node);
            __pageshimElements[node] = element;
        }
        return element;
    }

    Object.defineProperty(Element.prototype, 'tagName', {
        get: function () { return __pageshim.nodeTag(this._node).toUpperCase(); }
    });
    Object.defineProperty(Element.prototype, 'parentElement', {
        get: function () { return __pageshimElement(__pageshim.nodeParent(this._node)); }
    });
    Object.defineProperty(Element.prototype, 'children', {
        get: function () { return __pageshim.nodeChildren(this._node).map(function (n) { return __pageshimElement(n); }); }
    });

    var document = {
        get documentElement() { return __pageshimElement(__pageshim.documentElement()); },
        get body() { return __pageshimElement(__pageshim.body()); },
        getElementsByTagName: function (tag) {
            return __pageshim.elementsByTag(String(tag)).map(function (n) { return __pageshimElement(n); });
        }
    };

    function getComputedStyle(element, pseudoElement) {
        var node = element instanceof Element ? element._node : null;
        var pseudo = pseudoElement === undefined || pseudoElement === null ? null : String(pseudoElement);
        return {
            getPropertyValue: function (property, extra) {
                return __pageshim.style(node, pseudo, String(property), extra === undefined || extra === null ? null : String(extra));
            }
        };
    }

    function TextEncoder() {}

    Object.defineProperty(TextEncoder.prototype, 'encoding', { get: function () { return 'utf-8'; } });
    TextEncoder.prototype.encode = function (input) {
        var text = input === undefined ? '' : String(input);
        var units = new Array(text.length);
        for (var i = 0; i < text.length; i++) units[i] = text.charCodeAt(i);
        return new Uint8Array(__pageshim.encodeUtf16(units));
    };
"#;

/// Which handler slot a completed request asks script to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct XhrNotice {
    id: u32,
    slot: &'static str,
}

struct PendingFetch {
    future: ResponseFuture,
    resolvers: ResolvingFunctions,
}

/// Requests created by script that have yet to be replayed into the context
#[derive(Default)]
pub(crate) struct PageRequests {
    next_id: u32,
    xhrs: HashMap<u32, XmlHttpRequest>,
    notices: VecDeque<XhrNotice>,
    fetches: Vec<PendingFetch>,
}

impl PageRequests {
    /// Whether any fetch or handler is still waiting to reach script
    pub(crate) fn has_pending(&self) -> bool {
        !self.notices.is_empty() || !self.fetches.is_empty()
    }

    fn take_ready_fetches(&mut self) -> Vec<(ResolvingFunctions, std::result::Result<Response, TransportError>)> {
        let mut ready = Vec::new();
        let mut i = 0;
        while i < self.fetches.len() {
            match (&mut self.fetches[i].future).now_or_never() {
                Some(outcome) => {
                    let pending = self.fetches.remove(i);
                    ready.push((pending.resolvers, outcome));
                }
                None => i += 1,
            }
        }
        ready
    }
}

pub(crate) type SharedRequests = Rc<RefCell<PageRequests>>;

#[derive(Clone, Trace, Finalize)]
struct NetCapture {
    #[unsafe_ignore_trace]
    requests: SharedRequests,
    #[unsafe_ignore_trace]
    bridge: TransportBridge,
    #[unsafe_ignore_trace]
    completion: LegacyCompletion,
}

#[derive(Clone, Trace, Finalize)]
struct DomCapture {
    #[unsafe_ignore_trace]
    document: SharedDocument,
    #[unsafe_ignore_trace]
    resolver: PathResolver,
    #[unsafe_ignore_trace]
    style: Rc<dyn StyleEngine>,
}

/// Install the prelude and its native object; returns the request registry
/// the runtime settles from
pub(crate) fn install(context: &mut Context, env: &Environment) -> Result<SharedRequests> {
    let requests = SharedRequests::default();
    let net = NetCapture {
        requests: requests.clone(),
        bridge: env.bridge().clone(),
        completion: env.config().legacy_completion,
    };
    let dom = DomCapture {
        document: env.document().clone(),
        resolver: env.resolver().clone(),
        style: env.host().style.clone(),
    };

    let native = native_object(context, net, dom);
    context
        .register_global_property(js_string!("__pageshim"), native, Attribute::empty())
        .map_err(script_error)?;
    context
        .eval(Source::from_bytes(PRELUDE))
        .map_err(script_error)?;
    Ok(requests)
}

/// Replay queued request handlers and settled fetches into script.
///
/// Returns how many were delivered.
pub(crate) fn settle(context: &mut Context, requests: &SharedRequests) -> usize {
    let mut delivered = 0;
    loop {
        let notice = requests.borrow_mut().notices.pop_front();
        let Some(notice) = notice else { break };
        if let Err(e) = fire_xhr_event(context, notice) {
            warn!("request handler {} threw: {}", notice.slot, e);
        }
        delivered += 1;
    }

    let ready = requests.borrow_mut().take_ready_fetches();
    for (resolvers, outcome) in ready {
        let settled = match outcome {
            Ok(response) => resolvers
                .resolve
                .call(&BoaJsValue::undefined(), &[js_str(&response.text())], context),
            Err(error) => resolvers
                .reject
                .call(&BoaJsValue::undefined(), &[js_str(error.message())], context),
        };
        if let Err(e) = settled {
            warn!("settling fetch failed: {}", e);
        }
        delivered += 1;
    }
    delivered
}

fn fire_xhr_event(context: &mut Context, notice: XhrNotice) -> JsResult<()> {
    let dispatch = context
        .global_object()
        .get(js_string!("__pageshimXhrEvent"), context)?;
    let Some(dispatch) = dispatch.as_callable() else {
        return Err(JsNativeError::typ()
            .with_message("request dispatcher missing")
            .into());
    };
    dispatch.call(
        &BoaJsValue::undefined(),
        &[BoaJsValue::from(notice.id), js_str(notice.slot)],
        context,
    )?;
    Ok(())
}

fn native_object(context: &mut Context, net: NetCapture, dom: DomCapture) -> JsObject {
    let xhr_create = NativeFunction::from_copy_closure_with_captures(
        |_this, _args, captures: &NetCapture, _ctx| {
            let xhr = XmlHttpRequest::new(captures.bridge.clone(), captures.completion);
            let id = {
                let mut requests = captures.requests.borrow_mut();
                requests.next_id += 1;
                requests.next_id
            };
            let requests = Rc::downgrade(&captures.requests);
            for event in ["load", "error"] {
                xhr.add_event_listener(event, notify(&requests, id, event));
            }
            xhr.set_onload(notify(&requests, id, "onload"));
            xhr.set_onerror(notify(&requests, id, "onerror"));
            xhr.set_onreadystatechange(notify(&requests, id, "onreadystatechange"));
            captures.requests.borrow_mut().xhrs.insert(id, xhr);
            Ok(BoaJsValue::from(id))
        },
        net.clone(),
    );

    let xhr_open = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &NetCapture, ctx| {
            let xhr = lookup_xhr(captures, args, ctx)?;
            let method = string_arg(args, 1, ctx)?;
            let url = string_arg(args, 2, ctx)?;
            xhr.open(&method, &url);
            Ok(BoaJsValue::undefined())
        },
        net.clone(),
    );

    let xhr_set_header = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &NetCapture, ctx| {
            let xhr = lookup_xhr(captures, args, ctx)?;
            let name = string_arg(args, 1, ctx)?;
            let value = string_arg(args, 2, ctx)?;
            xhr.set_request_header(&name, &value);
            Ok(BoaJsValue::undefined())
        },
        net.clone(),
    );

    // The registry borrow is released before sending: a transport may
    // complete inline, and the handlers write back into the registry.
    let xhr_send = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &NetCapture, ctx| {
            let xhr = lookup_xhr(captures, args, ctx)?;
            let body = optional_string(args.get_or_undefined(1), ctx)?;
            xhr.send(body.as_deref())
                .map_err(|e| JsNativeError::error().with_message(e.to_string()))?;
            Ok(BoaJsValue::undefined())
        },
        net.clone(),
    );

    let xhr_field = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &NetCapture, ctx| {
            let xhr = lookup_xhr(captures, args, ctx)?;
            let field = string_arg(args, 1, ctx)?;
            Ok(match field.as_str() {
                "readyState" => BoaJsValue::from(u32::from(xhr.ready_state().as_u8())),
                "status" => BoaJsValue::from(u32::from(xhr.status())),
                "responseText" => js_str(&xhr.response_text()),
                "responseHeaders" => js_str(&xhr.get_all_response_headers()),
                _ => BoaJsValue::undefined(),
            })
        },
        net.clone(),
    );

    let fetch = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &NetCapture, ctx| {
            let url = string_arg(args, 0, ctx)?;
            let resource = match parse_options(args.get_or_undefined(1), ctx)? {
                Some(options) => Resource::Request(Request::new(url, Some(options))),
                None => Resource::Url(url),
            };
            let init = parse_options(args.get_or_undefined(2), ctx)?;
            let future = FetchClient::new(captures.bridge.clone()).fetch(resource, init);
            let (promise, resolvers) = JsPromise::new_pending(ctx);
            captures
                .requests
                .borrow_mut()
                .fetches
                .push(PendingFetch { future, resolvers });
            Ok(promise.into())
        },
        net,
    );

    let document_element = NativeFunction::from_copy_closure_with_captures(
        |_this, _args, captures: &DomCapture, _ctx| Ok(node_value(captures.document.borrow().document_element())),
        dom.clone(),
    );

    let body = NativeFunction::from_copy_closure_with_captures(
        |_this, _args, captures: &DomCapture, _ctx| Ok(node_value(captures.document.borrow().body())),
        dom.clone(),
    );

    let elements_by_tag = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &DomCapture, ctx| {
            let tag = string_arg(args, 0, ctx)?;
            let nodes = captures.document.borrow().get_elements_by_tag_name(&tag);
            Ok(node_array(&nodes, ctx))
        },
        dom.clone(),
    );

    let node_tag = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &DomCapture, ctx| {
            let node = node_arg(args.get_or_undefined(0), &captures.document, ctx)?;
            let document = captures.document.borrow();
            let tag = node
                .and_then(|n| document.element(n))
                .map(|e| e.tag_name.as_str())
                .unwrap_or("");
            Ok(js_str(tag))
        },
        dom.clone(),
    );

    let node_parent = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &DomCapture, ctx| {
            let node = node_arg(args.get_or_undefined(0), &captures.document, ctx)?;
            Ok(node_value(node.and_then(|n| captures.document.borrow().parent_of(n))))
        },
        dom.clone(),
    );

    let node_children = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &DomCapture, ctx| {
            let node = node_arg(args.get_or_undefined(0), &captures.document, ctx)?;
            let children = node
                .map(|n| captures.document.borrow().children(n).to_vec())
                .unwrap_or_default();
            Ok(node_array(&children, ctx))
        },
        dom.clone(),
    );

    let style = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &DomCapture, ctx| {
            let element = node_arg(args.get_or_undefined(0), &captures.document, ctx)?;
            let pseudo = optional_string(args.get_or_undefined(1), ctx)?;
            let property = string_arg(args, 2, ctx)?;
            let extra = optional_string(args.get_or_undefined(3), ctx)?;
            let view = ComputedStyle::new(
                captures.document.clone(),
                element,
                pseudo.as_deref(),
                captures.resolver.clone(),
                captures.style.clone(),
            );
            Ok(js_str(&view.get_property_value_with(&property, extra.as_deref())))
        },
        dom,
    );

    let encode_utf16 = NativeFunction::from_fn_ptr(|_this, args, ctx| {
        let units = args
            .get_or_undefined(0)
            .as_object()
            .ok_or_else(|| JsNativeError::typ().with_message("encode: expected an array of code units"))?;
        let length = units.get(js_string!("length"), ctx)?.to_length(ctx)?;
        let mut code_units = Vec::new();
        for i in 0..length {
            code_units.push(units.get(i as u32, ctx)?.to_uint16(ctx)?);
        }
        let bytes = TextEncoder::new().encode_utf16(&code_units);
        Ok(JsArray::from_iter(bytes.into_iter().map(|b| BoaJsValue::from(u32::from(b))), ctx).into())
    });

    ObjectInitializer::new(context)
        .function(xhr_create, js_string!("xhrCreate"), 0)
        .function(xhr_open, js_string!("xhrOpen"), 3)
        .function(xhr_set_header, js_string!("xhrSetHeader"), 3)
        .function(xhr_send, js_string!("xhrSend"), 2)
        .function(xhr_field, js_string!("xhrField"), 2)
        .function(fetch, js_string!("fetch"), 3)
        .function(document_element, js_string!("documentElement"), 0)
        .function(body, js_string!("body"), 0)
        .function(elements_by_tag, js_string!("elementsByTag"), 1)
        .function(node_tag, js_string!("nodeTag"), 1)
        .function(node_parent, js_string!("nodeParent"), 1)
        .function(node_children, js_string!("nodeChildren"), 1)
        .function(style, js_string!("style"), 4)
        .function(encode_utf16, js_string!("encodeUtf16"), 1)
        .build()
}

/// Handler that queues `slot` for replay; a no-op once the runtime is gone
fn notify(requests: &Weak<RefCell<PageRequests>>, id: u32, slot: &'static str) -> impl Fn(&XmlHttpRequest) + 'static {
    let requests = requests.clone();
    move |_: &XmlHttpRequest| {
        if let Some(requests) = requests.upgrade() {
            debug!("request {} queued {}", id, slot);
            requests.borrow_mut().notices.push_back(XhrNotice { id, slot });
        }
    }
}

fn lookup_xhr(captures: &NetCapture, args: &[BoaJsValue], ctx: &mut Context) -> JsResult<XmlHttpRequest> {
    let id = args.get_or_undefined(0).to_u32(ctx)?;
    let xhr = captures.requests.borrow().xhrs.get(&id).cloned();
    xhr.ok_or_else(|| JsError::from(JsNativeError::typ().with_message(format!("unknown request {}", id))))
}

fn string_arg(args: &[BoaJsValue], index: usize, ctx: &mut Context) -> JsResult<String> {
    Ok(args.get_or_undefined(index).to_string(ctx)?.to_std_string_escaped())
}

fn optional_string(value: &BoaJsValue, ctx: &mut Context) -> JsResult<Option<String>> {
    if value.is_null_or_undefined() {
        return Ok(None);
    }
    Ok(Some(value.to_string(ctx)?.to_std_string_escaped()))
}

/// Options bag serialized by the prelude
fn parse_options(value: &BoaJsValue, ctx: &mut Context) -> JsResult<Option<RequestInit>> {
    let Some(json) = optional_string(value, ctx)? else {
        return Ok(None);
    };
    let options: serde_json::Value = serde_json::from_str(&json)
        .map_err(|e| JsNativeError::typ().with_message(format!("fetch options: {}", e)))?;
    Ok(Some(RequestInit::from_json(&options)))
}

fn node_arg(value: &BoaJsValue, document: &SharedDocument, ctx: &mut Context) -> JsResult<Option<NodeId>> {
    if value.is_null_or_undefined() {
        return Ok(None);
    }
    let index = value.to_u32(ctx)? as usize;
    Ok(document.borrow().node(index))
}

fn node_value(node: Option<NodeId>) -> BoaJsValue {
    match node {
        Some(node) => BoaJsValue::from(node.index() as u32),
        None => BoaJsValue::null(),
    }
}

fn node_array(nodes: &[NodeId], ctx: &mut Context) -> BoaJsValue {
    JsArray::from_iter(nodes.iter().map(|n| BoaJsValue::from(n.index() as u32)), ctx).into()
}

#[cfg(test)]
mod tests {
    use crate::config::ShimConfig;
    use crate::dom::Document;
    use crate::environment::Environment;
    use crate::event_loop::EventLoop;
    use crate::host::{HostBindings, ManualTransport, QueryStyleEngine};
    use crate::js_engine::{JsValue, ScriptRuntime};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn environment() -> (Environment, Rc<ManualTransport>) {
        let event_loop = EventLoop::new();
        let transport = Rc::new(ManualTransport::new(event_loop.clone()));
        let style = Rc::new(QueryStyleEngine::new(|address, property| {
            Ok(format!("{}|{}", address, property))
        }));
        let host = HostBindings::new(transport.clone(), style);
        let document = Document::parse_html("<body><div></div><p></p></body>").into_shared();
        (
            Environment::new(ShimConfig::default(), host, event_loop, document),
            transport,
        )
    }

    fn string(s: &str) -> JsValue {
        JsValue::String(s.to_string())
    }

    fn numbers(values: &[f64]) -> JsValue {
        JsValue::Array(values.iter().map(|n| JsValue::Number(*n)).collect())
    }

    #[test]
    fn test_xhr_completes_through_the_loop() {
        let (env, transport) = environment();
        let mut runtime = ScriptRuntime::new(&env).unwrap();
        let state = runtime
            .eval(
                "var log = [];
                 var x = new XMLHttpRequest();
                 x.addEventListener('load', function () { log.push('load ' + this.responseText); });
                 x.onload = function () { log.push('onload'); };
                 x.onreadystatechange = function () { log.push('rsc ' + this.readyState); };
                 x.open('GET', '/x');
                 x.setRequestHeader('Accept', 'text/plain');
                 x.send();
                 x.readyState",
            )
            .unwrap();
        assert_eq!(state, JsValue::Number(2.0));
        assert_eq!(transport.call_count(), 1);
        let request = transport.requests()[0].request.clone();
        assert_eq!(request.method, "GET");
        assert_eq!(request.headers.get("Accept").map(String::as_str), Some("text/plain"));

        transport.respond(0, "hello");
        runtime.run_until_idle();
        assert_eq!(runtime.eval("x.readyState").unwrap(), JsValue::Number(4.0));
        assert_eq!(runtime.eval("x.status").unwrap(), JsValue::Number(200.0));
        assert_eq!(runtime.eval("x.responseText").unwrap(), string("hello"));
        assert_eq!(runtime.eval("log.join(',')").unwrap(), string("load hello,onload,rsc 4"));
    }

    #[test]
    fn test_xhr_failure_runs_error_handlers() {
        let (env, transport) = environment();
        let mut runtime = ScriptRuntime::new(&env).unwrap();
        runtime
            .execute(
                "var log = [];
                 var x = new XMLHttpRequest();
                 x.addEventListener('error', function () { log.push('error'); });
                 x.onerror = function () { log.push('onerror ' + this.status); };
                 x.onreadystatechange = function () { log.push('rsc ' + this.readyState); };
                 x.open('GET', '/x');
                 x.send();",
            )
            .unwrap();
        transport.fail(0, "connection refused");
        runtime.run_until_idle();
        assert_eq!(runtime.eval("log.join(',')").unwrap(), string("error,onerror 0,rsc 4"));
    }

    #[test]
    fn test_xhr_send_while_pending_throws() {
        let (env, transport) = environment();
        let mut runtime = ScriptRuntime::new(&env).unwrap();
        let outcome = runtime
            .eval(
                "var x = new XMLHttpRequest();
                 x.open('GET', '/x');
                 x.send();
                 try { x.send(); 'sent' } catch (e) { 'threw' }",
            )
            .unwrap();
        assert_eq!(outcome, string("threw"));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(
            runtime
                .eval("try { new XMLHttpRequest().send(); 'sent' } catch (e) { 'threw' }")
                .unwrap(),
            string("threw")
        );
    }

    #[test]
    fn test_fetch_post_resolves_with_delivered_data() {
        let (env, transport) = environment();
        let mut runtime = ScriptRuntime::new(&env).unwrap();
        runtime
            .execute(
                "var out = null;
                 fetch('/x', { method: 'POST', body: 'payload' })
                     .then(function (r) { out = r.text(); }, function (e) { out = 'rejected ' + e; });",
            )
            .unwrap();
        assert_eq!(transport.call_count(), 1);
        let request = transport.requests()[0].request.clone();
        assert_eq!(request.method, "POST");
        assert_eq!(request.body, "payload");
        assert_eq!(runtime.eval("out").unwrap(), JsValue::Null);

        transport.respond(0, "stored");
        runtime.run_until_idle();
        assert_eq!(runtime.eval("out").unwrap(), string("stored"));
    }

    #[test]
    fn test_fetch_rejects_with_native_error_verbatim() {
        let (env, transport) = environment();
        let mut runtime = ScriptRuntime::new(&env).unwrap();
        runtime
            .execute("var out = null; fetch('/x').catch(function (e) { out = e; });")
            .unwrap();
        transport.fail(0, "timeout at host");
        runtime.run_until_idle();
        assert_eq!(runtime.eval("out").unwrap(), string("timeout at host"));
    }

    #[test]
    fn test_fetch_json_parses_synchronously() {
        let (env, transport) = environment();
        let mut runtime = ScriptRuntime::new(&env).unwrap();
        runtime
            .execute(
                "var good = null, bad = null;
                 fetch('/good').then(function (r) { good = r.json().a; });
                 fetch('/bad').then(function (r) {
                     try { r.json(); bad = 'parsed'; } catch (e) { bad = e.name; }
                 });",
            )
            .unwrap();
        transport.respond(0, r#"{"a":1}"#);
        transport.respond(1, "{not json");
        runtime.run_until_idle();
        assert_eq!(runtime.eval("good").unwrap(), JsValue::Number(1.0));
        assert_eq!(runtime.eval("bad").unwrap(), string("SyntaxError"));
    }

    #[test]
    fn test_fetch_request_object_with_overrides() {
        let (env, transport) = environment();
        let mut runtime = ScriptRuntime::new(&env).unwrap();
        runtime
            .execute(
                "var req = new Request('/items', { method: 'PUT', body: 'b', headers: { 'X-A': '1' }, cache: 'no-store' });
                 fetch(req, { method: 'DELETE' });",
            )
            .unwrap();
        let request = transport.requests()[0].request.clone();
        assert_eq!(request.url, "/items");
        assert_eq!(request.method, "DELETE");
        assert_eq!(request.body, "b");
        assert_eq!(request.headers.get("X-A").map(String::as_str), Some("1"));
        assert_eq!(runtime.eval("req.cache").unwrap(), string("no-store"));
        assert_eq!(runtime.eval("req.headers.get('X-A')").unwrap(), string("1"));
    }

    #[test]
    fn test_headers_class() {
        let (env, _) = environment();
        let mut runtime = ScriptRuntime::new(&env).unwrap();
        let value = runtime
            .eval(
                "var h = new Headers({ 'X-Zeta': '1' });
                 h.set('X', '1');
                 h.append('Y', '');
                 h.set('X', '2');
                 [h.get('X'), h.keys().join(','), h.has('Y'), h.has('y'), h.get('missing') === undefined]",
            )
            .unwrap();
        assert_eq!(
            value,
            JsValue::Array(vec![
                string("2"),
                string("X-Zeta,X,Y"),
                JsValue::Boolean(true),
                JsValue::Boolean(false),
                JsValue::Boolean(true),
            ])
        );
    }

    #[test]
    fn test_get_computed_style_resolves_on_read() {
        let (env, _) = environment();
        let mut runtime = ScriptRuntime::new(&env).unwrap();
        runtime
            .execute("var p = document.getElementsByTagName('p')[0]; var style = getComputedStyle(p);")
            .unwrap();
        assert_eq!(runtime.eval("style.getPropertyValue('color')").unwrap(), string("/0/1|color"));

        let body = env.document().borrow().body().unwrap();
        let div = env.document().borrow().children(body)[0];
        env.document().borrow_mut().remove_child(body, div);
        assert_eq!(runtime.eval("style.getPropertyValue('color')").unwrap(), string("/0/0|color"));
        assert_eq!(
            runtime.eval("getComputedStyle(null).getPropertyValue('color')").unwrap(),
            string("")
        );
    }

    #[test]
    fn test_element_handles() {
        let (env, _) = environment();
        let mut runtime = ScriptRuntime::new(&env).unwrap();
        assert_eq!(runtime.eval("document.body.tagName").unwrap(), string("BODY"));
        assert_eq!(
            runtime
                .eval("document.body.children.map(function (e) { return e.tagName; }).join(',')")
                .unwrap(),
            string("DIV,P")
        );
        assert_eq!(
            runtime
                .eval("document.getElementsByTagName('p')[0].parentElement === document.body")
                .unwrap(),
            JsValue::Boolean(true)
        );
    }

    #[test]
    fn test_text_encoder() {
        let (env, _) = environment();
        let mut runtime = ScriptRuntime::new(&env).unwrap();
        assert_eq!(runtime.eval("new TextEncoder().encoding").unwrap(), string("utf-8"));
        assert_eq!(
            runtime.eval("Array.from(new TextEncoder().encode('h\\u20ac'))").unwrap(),
            numbers(&[104.0, 226.0, 130.0, 172.0])
        );
        assert_eq!(
            runtime.eval("Array.from(new TextEncoder().encode('\\ud800'))").unwrap(),
            numbers(&[239.0, 191.0, 189.0])
        );
        assert_eq!(
            runtime.eval("new TextEncoder().encode('ab') instanceof Uint8Array").unwrap(),
            JsValue::Boolean(true)
        );
    }
}
