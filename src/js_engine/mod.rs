//! JavaScript engine integration
//!
//! Page scripts run on Boa (pure Rust) with the environment installed as
//! globals. Request completions reach script when [`ScriptRuntime`] drains the
//! event loop.

mod bindings;
mod runtime;
mod web_apis;

pub use runtime::ScriptRuntime;

/// JavaScript value types
#[derive(Debug, Clone, PartialEq)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<JsValue>),
    Object(std::collections::HashMap<String, JsValue>),
}

impl JsValue {
    /// Check if the value is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
        }
    }

    /// Convert to string representation
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::String(s) => s.clone(),
            Self::Array(arr) => arr
                .iter()
                .map(|v| v.to_js_string())
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".to_string(),
        }
    }
}
