//! Script runtime using Boa engine

use super::web_apis::{self, SharedRequests};
use super::{JsValue, bindings};
use crate::environment::Environment;
use crate::event_loop::EventLoop;
use crate::utils::{Result, ShimError};
use boa_engine::{Context, JsValue as BoaJsValue, Source, js_string};
use log::{debug, warn};
use std::collections::HashMap;
use std::time::Duration;

/// Boa context with the page globals installed
pub struct ScriptRuntime {
    context: Context,
    requests: SharedRequests,
    event_loop: EventLoop,
    idle_timeout: Duration,
}

impl ScriptRuntime {
    /// Create a runtime bound to `env`.
    ///
    /// Storage handles are shared, so writes from script are visible through
    /// `env` and the other way round.
    pub fn new(env: &Environment) -> Result<Self> {
        let mut context = Context::default();
        let requests = bindings::install(&mut context, env)?;
        Ok(Self {
            context,
            requests,
            event_loop: env.event_loop().clone(),
            idle_timeout: Duration::from_millis(env.config().idle_timeout_ms),
        })
    }

    /// Execute a script and return its completion value
    pub fn execute(&mut self, code: &str) -> Result<JsValue> {
        let code = strip_comment_wrapper(code);
        if code.trim().is_empty() {
            return Ok(JsValue::Undefined);
        }

        debug!("executing {} bytes of script", code.len());
        let source = Source::from_bytes(code.as_bytes());
        let result = self
            .context
            .eval(source)
            .map_err(|e| ShimError::Script(e.to_string()))?;
        self.run_jobs();
        Ok(Self::convert_boa_value(&result, &mut self.context))
    }

    /// Run queued loop tasks and hand every completion they produce to
    /// script, without waiting on the network.
    ///
    /// Returns the number of loop tasks and script deliveries made.
    pub fn run_until_idle(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let ran = self.event_loop.run_until_idle();
            let delivered = web_apis::settle(&mut self.context, &self.requests);
            self.run_jobs();
            if ran + delivered == 0 {
                return handled;
            }
            handled += ran + delivered;
        }
    }

    /// Like [`run_until_idle`](Self::run_until_idle), but also wait for
    /// background completions. Returns false if a native call was still
    /// outstanding when the idle timeout elapsed.
    pub fn run(&mut self) -> bool {
        loop {
            self.run_until_idle();
            if self.event_loop.is_idle() && !self.requests.borrow().has_pending() {
                return true;
            }
            if !self.event_loop.turn(self.idle_timeout) {
                return self.event_loop.parked_count() == 0;
            }
        }
    }

    /// Drain the promise job queue
    fn run_jobs(&mut self) {
        if let Err(e) = self.context.run_jobs() {
            warn!("promise job failed: {}", e);
        }
    }

    /// Evaluate a JavaScript expression
    pub fn eval(&mut self, expression: &str) -> Result<JsValue> {
        self.execute(expression)
    }

    /// Convert Boa JsValue to our JsValue
    fn convert_boa_value(value: &BoaJsValue, context: &mut Context) -> JsValue {
        if value.is_undefined() {
            JsValue::Undefined
        } else if value.is_null() {
            JsValue::Null
        } else if let Some(b) = value.as_boolean() {
            JsValue::Boolean(b)
        } else if let Some(n) = value.as_number() {
            JsValue::Number(n)
        } else if let Some(s) = value.as_string() {
            JsValue::String(s.to_std_string_escaped())
        } else if value.is_object() {
            if let Ok(array) = value.to_object(context) {
                if array.is_array() {
                    if let Ok(length_val) = array.get(js_string!("length"), context) {
                        if let Some(length) = length_val.as_number() {
                            let mut items = Vec::new();
                            for i in 0..(length as u32) {
                                if let Ok(item) = array.get(i, context) {
                                    items.push(Self::convert_boa_value(&item, context));
                                }
                            }
                            return JsValue::Array(items);
                        }
                    }
                }
            }
            JsValue::Object(HashMap::new())
        } else {
            JsValue::Undefined
        }
    }
}

/// Inline scripts are sometimes wrapped in `<!-- ... -->`; both markers become
/// line comments.
fn strip_comment_wrapper(code: &str) -> String {
    let mut code = code.trim().to_string();
    if let Some(rest) = code.strip_prefix("<!--") {
        code = format!("//{}", rest);
    }
    if let Some(rest) = code.strip_suffix("-->") {
        code = format!("{}//", rest);
    }
    code
}
