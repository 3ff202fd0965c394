//! Schema documents, their import directives and dependency sets
#![allow(clippy::must_use_candidate)] // Builder/constructor API intentionally omits pervasive #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent builder methods return Self for ergonomics.

use crate::definition::{DeclarationKind, Definition, Scope};
use crate::ids::{DeclarationId, DocumentId, MultiplexerId};
use crate::metadata::Position;
use crate::symbols::SymbolTable;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root-element attributes and header children of a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentHeader {
    /// Identifying name (`short-name`, else `@root`, else the file stem)
    pub name: String,

    /// File the document was decoded from
    pub source: PathBuf,

    /// Name of the top-level assembly (`@top`)
    pub top: Option<String>,

    /// Legacy identity attribute (`@root`)
    pub root: Option<String>,

    pub schema_name: Option<String>,

    pub schema_version: Option<String>,

    pub namespace: Option<String>,

    pub remarks: Option<String>,

    /// `@abstract="yes"`: the document exists only to be imported
    pub is_abstract: bool,
}

/// An `import` directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    /// Location relative to the family's base directory
    pub href: String,
    pub position: Position,
}

/// What an external name resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dependency {
    Declaration(DeclarationId),
    Multiplexer(MultiplexerId),
}

/// Name class a dependency is registered under.
///
/// Assemblies, fields and flags have separate namespaces, and multiplexer
/// names form a fourth, so equal names in different classes do not collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Declaration(DeclarationKind),
    Multiplexer,
}

/// Externally resolved names of one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    entries: BTreeMap<(String, Namespace), Dependency>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name -> dependency` in `namespace`; re-registering a name
    /// there is a no-op. Returns true if the entry was added.
    pub fn register(&mut self, namespace: Namespace, name: impl Into<String>, dependency: Dependency) -> bool {
        match self.entries.entry((name.into(), namespace)) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(dependency);
                true
            }
        }
    }

    pub fn get(&self, namespace: Namespace, name: &str) -> Option<Dependency> {
        self.entries.get(&(name.to_string(), namespace)).copied()
    }

    /// Entries in name order; equal names follow namespace order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Dependency)> {
        self.entries.iter().map(|((name, _), dep)| (name.as_str(), *dep))
    }

    /// Like [`Dependencies::iter`], with each entry's namespace
    pub fn entries(&self) -> impl Iterator<Item = (&str, Namespace, Dependency)> {
        self.entries
            .iter()
            .map(|((name, namespace), dep)| (name.as_str(), *namespace, *dep))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Serialize)]
struct DependencyEntry<'a> {
    name: &'a str,
    namespace: Namespace,
    dependency: Dependency,
}

impl Serialize for Dependencies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries().map(|(name, namespace, dependency)| DependencyEntry {
            name,
            namespace,
            dependency,
        }))
    }
}

/// Structural decode of one document, before it is placed in a graph.
///
/// Inline usages refer to declarations by their position in `declarations`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDocument {
    pub header: DocumentHeader,
    pub imports: Vec<Import>,
    pub declarations: Vec<(Scope, Definition)>,
}

impl RawDocument {
    pub fn new(header: DocumentHeader) -> Self {
        Self {
            header,
            imports: Vec::new(),
            declarations: Vec::new(),
        }
    }

    /// Append a definition; returns the local handle inline usages should carry
    pub fn push(&mut self, scope: Scope, definition: Definition) -> DeclarationId {
        self.declarations.push((scope, definition));
        DeclarationId::from_index(self.declarations.len() - 1)
    }

    /// Global definitions, in document order
    pub fn globals(&self) -> impl Iterator<Item = &Definition> {
        self.declarations
            .iter()
            .filter(|(scope, _)| *scope == Scope::Global)
            .map(|(_, def)| def)
    }
}

/// A document placed in a graph
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: DocumentId,

    pub header: DocumentHeader,

    pub imports: Vec<Import>,

    /// Global declarations by kind, in document order
    pub assemblies: Vec<DeclarationId>,
    pub fields: Vec<DeclarationId>,
    pub flags: Vec<DeclarationId>,

    /// Anonymous declarations nested in usages
    pub inline: Vec<DeclarationId>,

    /// Resolved imports, parallel to `imports`
    pub imported: Vec<DocumentId>,

    pub dependencies: Dependencies,

    /// Multiplexers synthesized in this document, sorted by name
    pub multiplexers: Vec<MultiplexerId>,

    #[serde(skip)]
    pub symbols: SymbolTable,
}

impl Document {
    pub fn new(id: DocumentId, header: DocumentHeader, imports: Vec<Import>) -> Self {
        Self {
            id,
            header,
            imports,
            assemblies: Vec::new(),
            fields: Vec::new(),
            flags: Vec::new(),
            inline: Vec::new(),
            imported: Vec::new(),
            dependencies: Dependencies::new(),
            multiplexers: Vec::new(),
            symbols: SymbolTable::new(),
        }
    }

    /// Identifying name
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Every declaration this document owns: globals by kind, then inline ones
    pub fn owned_declarations(&self) -> impl Iterator<Item = DeclarationId> + '_ {
        self.assemblies
            .iter()
            .chain(&self.fields)
            .chain(&self.flags)
            .chain(&self.inline)
            .copied()
    }
}
