//! Style engines provided by the host

use super::StyleEngine;
use log::{debug, warn};

/// Engine that knows no styles
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStyleEngine;

impl StyleEngine for NullStyleEngine {
    fn style(&self, _: Option<&str>, _: Option<&str>, _: &str, _: Option<&str>) -> String {
        String::new()
    }
}

type Query = dyn Fn(&str, &str) -> std::result::Result<String, String>;

/// Engine backed by a host query function `(address, property) -> value`.
///
/// Query failures are logged and reported as an empty value.
pub struct QueryStyleEngine {
    query: Box<Query>,
}

impl QueryStyleEngine {
    /// Wrap a host query
    pub fn new(query: impl Fn(&str, &str) -> std::result::Result<String, String> + 'static) -> Self {
        Self {
            query: Box::new(query),
        }
    }
}

impl StyleEngine for QueryStyleEngine {
    fn style(
        &self,
        address: Option<&str>,
        _pseudo_element: Option<&str>,
        property: &str,
        _extra: Option<&str>,
    ) -> String {
        let Some(address) = address else {
            return String::new();
        };
        match (self.query)(address, property) {
            Ok(value) => {
                debug!("call query({}, {})={}", address, property, value);
                value
            }
            Err(e) => {
                warn!("style query {}: {}", address, e);
                String::new()
            }
        }
    }
}
