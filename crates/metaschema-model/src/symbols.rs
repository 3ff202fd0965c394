//! Per-document symbol table

use crate::definition::DeclarationKind;
use crate::ids::DeclarationId;
use std::collections::HashMap;

/// Global declarations of one document, indexed by kind and name
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<(DeclarationKind, String), DeclarationId>,
}

impl SymbolTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self {
            symbols: HashMap::new(),
        }
    }

    /// Register a declaration; the first registration of a name wins.
    /// Returns false if the name was already taken for this kind.
    pub fn register(
        &mut self,
        kind: DeclarationKind,
        name: impl Into<String>,
        id: DeclarationId,
    ) -> bool {
        match self.symbols.entry((kind, name.into())) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        }
    }

    /// Get a declaration by kind and name
    pub fn get(&self, kind: DeclarationKind, name: &str) -> Option<DeclarationId> {
        self.symbols.get(&(kind, name.to_string())).copied()
    }

    /// Check if a declaration exists
    pub fn contains(&self, kind: DeclarationKind, name: &str) -> bool {
        self.get(kind, name).is_some()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
