//! Computed style lookup
//!
//! `getComputedStyle(el, pseudo)` hands back a view that stores only the element.
//! The address is resolved on every property read: the element may have moved
//! between creating the view and querying it.

use crate::dom::{NodeId, PathResolver, SharedDocument};
use crate::host::StyleEngine;
use std::rc::Rc;

/// Live computed-style view of one element
#[derive(Clone)]
pub struct ComputedStyle {
    document: SharedDocument,
    element: Option<NodeId>,
    pseudo_element: Option<String>,
    resolver: PathResolver,
    engine: Rc<dyn StyleEngine>,
}

impl ComputedStyle {
    /// Create a view; nothing is resolved until a property is read
    pub fn new(
        document: SharedDocument,
        element: Option<NodeId>,
        pseudo_element: Option<&str>,
        resolver: PathResolver,
        engine: Rc<dyn StyleEngine>,
    ) -> Self {
        Self {
            document,
            element,
            pseudo_element: pseudo_element.map(str::to_string),
            resolver,
            engine,
        }
    }

    /// The element this view describes
    pub fn element(&self) -> Option<NodeId> {
        self.element
    }

    /// Computed value of `property`, empty when the element has no address
    pub fn get_property_value(&self, property: &str) -> String {
        self.get_property_value_with(property, None)
    }

    /// Like [`get_property_value`](Self::get_property_value), forwarding an extra
    /// host-specific argument
    pub fn get_property_value_with(&self, property: &str, extra: Option<&str>) -> String {
        let address = self.resolver.resolve(&*self.document.borrow(), self.element);
        self.engine.style(
            address.as_deref(),
            self.pseudo_element.as_deref(),
            property,
            extra,
        )
    }
}
