//! Synthesized reconciliation declarations

use crate::definition::DeclarationKind;
use crate::ids::{DeclarationId, DocumentId, MultiplexerId};
use crate::usage::{GroupAs, UsageRef};
use serde::Serialize;

/// Key/value shape the multiplexer reconciles with the array shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MultiplexMode {
    /// A lone member may appear as a bare value
    SingletonOrArray,
    /// Members are keyed on `index_flag` of the wrapped declaration
    ByKey { index_flag: String },
}

/// A declaration that exists only to bridge the two encodings of one grouped usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Multiplexer {
    pub id: MultiplexerId,
    /// Derived name: wrapped declaration name plus the configured suffix
    pub name: String,
    /// Document the multiplexer was synthesized in
    pub owner: DocumentId,
    /// The usage that triggered synthesis
    pub usage: UsageRef,
    /// Declaration the grouped usage stands for
    pub wrapped: DeclarationId,
    pub wrapped_name: String,
    pub kind: DeclarationKind,
    pub group: GroupAs,
    pub mode: MultiplexMode,
}

impl Multiplexer {
    /// Index flag for by-key multiplexers
    pub fn index_flag(&self) -> Option<&str> {
        match &self.mode {
            MultiplexMode::ByKey { index_flag } => Some(index_flag),
            MultiplexMode::SingletonOrArray => None,
        }
    }

    /// Key/value encoding is a mapping rather than a list
    pub fn in_json_map(&self) -> bool {
        matches!(self.mode, MultiplexMode::ByKey { .. })
    }
}

/// Derive the multiplexer name for a wrapped declaration
pub fn derive_name(declaration_name: &str, suffix: &str) -> String {
    format!("{declaration_name}{suffix}")
}
