#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # metaschema-model
//!
//! Linked type-graph model for metaschema documents.
//!
//! A family of schema documents is held in one [`SchemaGraph`] arena.
//! Declarations are owned by the graph and stamped with their owning
//! document; usages and dependency sets refer to them through handles.

/// Primitive `as-type` keywords.
pub mod datatype;
/// Assembly, field and flag definitions and placed declarations.
pub mod definition;
/// Documents, import directives and per-document dependency sets.
pub mod document;
/// The arena that owns one schema family.
pub mod graph;
/// Handle types into the arena.
pub mod ids;
/// Descriptive metadata and source positions.
pub mod metadata;
/// Synthesized reconciliation declarations.
pub mod multiplexer;
/// Per-document name index.
pub mod symbols;
/// Usages, grouping and model entries.
pub mod usage;

pub use datatype::Datatype;
pub use definition::{
    AssemblyDefinition, Declaration, DeclarationKind, Definition, DefinitionBody,
    FieldDefinition, FlagDefinition, Scope,
};
pub use document::{Dependencies, Dependency, Document, DocumentHeader, Import, Namespace, RawDocument};
pub use graph::SchemaGraph;
pub use ids::{DeclarationId, DocumentId, MultiplexerId};
pub use metadata::{Example, Metadata, Position};
pub use multiplexer::{MultiplexMode, Multiplexer};
pub use symbols::SymbolTable;
pub use usage::{
    FieldWrapping, GroupAs, JsonGrouping, MaxOccurs, ModelItem, Usage, UsageRef, UsageSlot,
    UsageTarget, XmlGrouping,
};

use thiserror::Error;

/// Errors raised when converting source text into model values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown datatype '{0}'")]
    UnknownDatatype(String),

    #[error("Invalid value '{value}' for attribute '{attribute}'")]
    InvalidAttribute { attribute: String, value: String },
}

impl Error {
    /// Build an invalid-attribute error with the attribute name and offending value.
    pub fn invalid_attribute(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// Crate-local result type for model conversions.
pub type Result<T> = std::result::Result<T, Error>;
