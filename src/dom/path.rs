//! Structural element addresses
//!
//! An address is the chain of child positions from the root element, e.g.
//! `/0/2/1` is the second child of the third child of the root. The host style
//! engine caches computed values by this string, so two distinct elements must
//! never share an address and an element's address always extends its parent's.

/// Read access to a tree of elements.
///
/// Nodes are compared by identity (`PartialEq` on the handle), never by content.
pub trait DomTree {
    /// Element handle
    type Node: Copy + PartialEq;

    /// The parent element, `None` for detached nodes and the document element
    fn parent_element(&self, node: Self::Node) -> Option<Self::Node>;

    /// Ordered element children
    fn children(&self, node: Self::Node) -> &[Self::Node];

    /// Tag name as supplied by the tree
    fn tag_name(&self, node: Self::Node) -> Option<&str>;
}

/// Address of the root element
pub const ROOT_ADDRESS: &str = "/0";

/// Maps elements to addresses and back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root_tag: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new("BODY")
    }
}

impl PathResolver {
    /// Resolver anchored at elements named `root_tag` (case-insensitive)
    pub fn new(root_tag: impl Into<String>) -> Self {
        Self {
            root_tag: root_tag.into(),
        }
    }

    /// Compute the address of `element`.
    ///
    /// `None` means "unresolvable": no element, a detached node, or a parent
    /// chain that ends before reaching the root.
    pub fn resolve<T: DomTree>(&self, tree: &T, element: Option<T::Node>) -> Option<String> {
        let mut node = element?;
        let mut positions = Vec::new();

        while !self.is_root(tree, node) {
            let parent = tree.parent_element(node)?;
            let index = tree.children(parent).iter().position(|c| *c == node)?;
            positions.push(index);
            node = parent;
        }

        let mut address = String::from(ROOT_ADDRESS);
        for index in positions.iter().rev() {
            address.push('/');
            address.push_str(&index.to_string());
        }
        Some(address)
    }

    /// Find the element at `address`, walking down from `root`.
    ///
    /// Malformed addresses and positions past the end yield `None`.
    pub fn locate<T: DomTree>(&self, tree: &T, root: T::Node, address: &str) -> Option<T::Node> {
        let rest = address.strip_prefix(ROOT_ADDRESS)?;
        if rest.is_empty() {
            return Some(root);
        }
        let rest = rest.strip_prefix('/')?;

        let mut node = root;
        for segment in rest.split('/') {
            let index: usize = segment.parse().ok()?;
            node = *tree.children(node).get(index)?;
        }
        Some(node)
    }

    fn is_root<T: DomTree>(&self, tree: &T, node: T::Node) -> bool {
        tree.tag_name(node)
            .is_some_and(|tag| tag.eq_ignore_ascii_case(&self.root_tag))
    }
}
