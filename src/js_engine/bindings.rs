//! Page globals installed into a Boa context

use super::web_apis::{self, SharedRequests};
use crate::environment::Environment;
use crate::host::HostBindings;
use crate::storage::Storage;
use crate::utils::{Result, ShimError};
use boa_engine::{
    Context, JsArgs, JsError, JsNativeError, JsObject, JsString, JsValue as BoaJsValue,
    NativeFunction, js_string, object::ObjectInitializer, property::Attribute,
};
use boa_gc::{Finalize, Trace};

#[derive(Clone, Trace, Finalize)]
struct StorageCapture {
    #[unsafe_ignore_trace]
    storage: Storage,
}

#[derive(Clone, Trace, Finalize)]
struct HostCapture {
    #[unsafe_ignore_trace]
    host: HostBindings,
}

pub(super) fn script_error(e: JsError) -> ShimError {
    ShimError::Script(e.to_string())
}

pub(super) fn js_str(s: &str) -> BoaJsValue {
    BoaJsValue::from(JsString::from(s))
}

/// Install the page surface of `env` as globals.
///
/// Returns the registry of script-created requests still waiting to settle.
pub(crate) fn install(context: &mut Context, env: &Environment) -> Result<SharedRequests> {
    let local = storage_object(context, env.local_storage());
    let session = storage_object(context, env.session_storage());
    context
        .register_global_property(js_string!("localStorage"), local, Attribute::all())
        .map_err(script_error)?;
    context
        .register_global_property(js_string!("sessionStorage"), session, Attribute::all())
        .map_err(script_error)?;

    init_base64(context, env.host())?;
    init_window_globals(context, env)?;

    let global = context.global_object();
    context
        .register_global_property(js_string!("window"), global, Attribute::all())
        .map_err(script_error)?;
    web_apis::install(context, env)
}

fn storage_object(context: &mut Context, storage: &Storage) -> JsObject {
    let captures = StorageCapture {
        storage: storage.clone(),
    };

    // Missing keys read as undefined.
    let get_item = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &StorageCapture, ctx| {
            let key = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
            Ok(captures
                .storage
                .get_item(&key)
                .map(|value| js_str(&value))
                .unwrap_or_else(BoaJsValue::undefined))
        },
        captures.clone(),
    );

    let set_item = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &StorageCapture, ctx| {
            let key = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
            let value = args.get_or_undefined(1).to_string(ctx)?.to_std_string_escaped();
            captures.storage.set_item(&key, value);
            Ok(BoaJsValue::undefined())
        },
        captures.clone(),
    );

    let remove_item = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &StorageCapture, ctx| {
            let key = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
            Ok(BoaJsValue::from(captures.storage.remove_item(&key)))
        },
        captures.clone(),
    );

    let clear = NativeFunction::from_copy_closure_with_captures(
        |_this, _args, captures: &StorageCapture, _ctx| {
            captures.storage.clear();
            Ok(BoaJsValue::undefined())
        },
        captures,
    );

    ObjectInitializer::new(context)
        .function(get_item, js_string!("getItem"), 1)
        .function(set_item, js_string!("setItem"), 2)
        .function(remove_item, js_string!("removeItem"), 1)
        .function(clear, js_string!("clear"), 0)
        .build()
}

/// `btoa`/`atob` over Latin-1 strings, as browsers define them
fn init_base64(context: &mut Context, host: &HostBindings) -> Result<()> {
    let captures = HostCapture { host: host.clone() };

    let btoa_fn = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &HostCapture, ctx| {
            let input = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
            let bytes = latin1_bytes(&input).ok_or_else(|| {
                JsError::from(
                    JsNativeError::typ().with_message("btoa: string contains characters outside Latin1"),
                )
            })?;
            Ok(js_str(&captures.host.btoa(&bytes)))
        },
        captures.clone(),
    );

    let atob_fn = NativeFunction::from_copy_closure_with_captures(
        |_this, args, captures: &HostCapture, ctx| {
            let input = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
            match captures.host.atob(input.trim()) {
                Ok(bytes) => Ok(js_str(&bytes.iter().map(|&b| char::from(b)).collect::<String>())),
                Err(e) => Err(JsNativeError::typ()
                    .with_message(format!("atob: {}", e))
                    .into()),
            }
        },
        captures,
    );

    context
        .register_global_builtin_callable(js_string!("btoa"), 1, btoa_fn)
        .map_err(script_error)?;
    context
        .register_global_builtin_callable(js_string!("atob"), 1, atob_fn)
        .map_err(script_error)?;
    Ok(())
}

fn latin1_bytes(input: &str) -> Option<Vec<u8>> {
    input.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}

/// `navigator`, `location`, `screen`, `screenX`/`screenY` and `history`
fn init_window_globals(context: &mut Context, env: &Environment) -> Result<()> {
    let navigator = env.navigator();
    let navigator = ObjectInitializer::new(context)
        .property(js_string!("userAgent"), js_str(&navigator.user_agent), Attribute::READONLY)
        .property(js_string!("platform"), js_str(&navigator.platform), Attribute::READONLY)
        .build();

    let location = env.location();
    let location = ObjectInitializer::new(context)
        .property(js_string!("href"), js_str(&location.href), Attribute::all())
        .property(js_string!("protocol"), js_str(&location.protocol), Attribute::all())
        .property(js_string!("host"), js_str(&location.host), Attribute::all())
        .property(js_string!("hostname"), js_str(&location.hostname), Attribute::all())
        .property(js_string!("port"), js_str(&location.port), Attribute::all())
        .property(js_string!("pathname"), js_str(&location.pathname), Attribute::all())
        .property(js_string!("search"), js_str(&location.search), Attribute::all())
        .property(js_string!("hash"), js_str(&location.hash), Attribute::all())
        .property(js_string!("origin"), js_str(&location.origin()), Attribute::READONLY)
        .build();

    let screen = env.screen();
    let screen_object = ObjectInitializer::new(context)
        .property(js_string!("width"), BoaJsValue::from(screen.width), Attribute::READONLY)
        .property(js_string!("height"), BoaJsValue::from(screen.height), Attribute::READONLY)
        .build();

    let replace_state = NativeFunction::from_fn_ptr(|_this, _args, _ctx| Ok(BoaJsValue::undefined()));
    let history = ObjectInitializer::new(context)
        .function(replace_state, js_string!("replaceState"), 3)
        .build();

    let globals: [(JsString, BoaJsValue); 6] = [
        (js_string!("navigator"), navigator.into()),
        (js_string!("location"), location.into()),
        (js_string!("screen"), screen_object.into()),
        (js_string!("screenX"), BoaJsValue::from(screen.x)),
        (js_string!("screenY"), BoaJsValue::from(screen.y)),
        (js_string!("history"), history.into()),
    ];
    for (name, value) in globals {
        context
            .register_global_property(name, value, Attribute::all())
            .map_err(script_error)?;
    }
    Ok(())
}
