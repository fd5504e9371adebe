//! Typed entity traits.

use crate::graph::Node;
use crate::schema::{EntitySchema, RootSchema};
use bulkmodel_core::Result;

/// An entity stored inline in its owner's row.
///
/// Implementations convert between the Rust struct and an untyped [`Node`].
/// `to_node` must list every field and every owned navigation of `SCHEMA`;
/// absent optional children are listed as `None`.
pub trait OwnedEntity: Sized {
    const SCHEMA: &'static EntitySchema;

    fn to_node(&self) -> Node;

    #[allow(clippy::result_large_err)]
    fn from_node(node: Node) -> Result<Self>;
}

/// An entity with its own table row and primary key.
pub trait RootEntity: OwnedEntity + Send + Sync {
    /// Table facts; `ROOT.entity` is expected to be `SCHEMA`.
    const ROOT: &'static RootSchema;
}
