//! Boundary to an external markup parser.
//!
//! Scripts may embed markup expressions such as `<Layout>...</Layout>`. The
//! compiler does not understand markup syntax itself; when it sees a `<` in
//! expression position (and markup support is enabled) it hands the rest of
//! the input to a registered collaborator, which consumes as much as it
//! recognizes and returns an opaque tree plus the unconsumed remainder.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::compiler::Value;
use crate::errors::LangResult;

/// An opaque markup tree produced by a collaborator. The compiler never
/// inspects it; it only stores it and hands it back for rendering.
#[derive(Clone)]
pub struct MarkupTree(pub Arc<dyn Any + Send + Sync>);
impl MarkupTree {
    pub fn new(tree: impl Any + Send + Sync) -> Self {
        Self(Arc::new(tree))
    }
    /// Attempts to downcast the tree to a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}
impl fmt::Debug for MarkupTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MarkupTree(..)")
    }
}

/// The result of a markup hand-off.
pub struct MarkupParse {
    /// The parsed tree.
    pub tree: MarkupTree,
    /// The input remaining after the markup expression, starting with the
    /// first character the collaborator did not consume.
    pub leftover: String,
}

/// A markup collaborator. Implementations parse a markup dialect the compiler
/// itself knows nothing about.
pub trait MarkupParser: Send + Sync {
    /// Parses a markup expression at the start of `input` (which begins with
    /// `<`). Returns the tree and the unconsumed remainder.
    fn parse_markup(&self, input: &str) -> LangResult<MarkupParse>;
    /// Renders a tree previously produced by `parse_markup` into a runtime
    /// value.
    fn render_markup(&self, tree: &MarkupTree) -> Value;
}
