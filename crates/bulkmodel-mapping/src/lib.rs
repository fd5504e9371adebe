//! Owned-entity mapping for bulkmodel.
//!
//! This crate turns a root entity and its chain of owned (embedded) entities
//! into one flat row, and turns stored rows back into the same graph:
//!
//! - `EntitySchema` / `FieldDef` / `OwnedDef` describe entity shapes as const data
//! - `EnumType` / `SqlEnum` map integer-backed enumerations
//! - `Node` is the untyped graph an `OwnedEntity` converts to and from
//! - `TableMapping` fixes the column layout and rejects irreversible schemas
//! - `flatten` / `reconstruct` move between graphs and rows

pub mod entity;
pub mod enums;
pub mod flatten;
pub mod graph;
pub mod mapping;
pub mod naming;
pub mod reconstruct;
pub mod schema;

pub use entity::{OwnedEntity, RootEntity};
pub use enums::{EnumMember, EnumType, SqlEnum};
pub use flatten::{flatten, flatten_all, flatten_node};
pub use graph::{Node, NodeValue};
pub use mapping::{LevelMapping, MAX_OWNED_DEPTH, MappedColumn, TableMapping};
pub use naming::NamingConvention;
pub use reconstruct::{reconstruct, reconstruct_node};
pub use schema::{EntitySchema, FieldDef, FieldKind, OwnedDef, RootSchema};
