//! Descriptive metadata and source positions attached to declarations and usages
#![allow(clippy::must_use_candidate)] // Constructor helpers are clear at call sites without #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent setters are designed for chaining.

use serde::Serialize;

/// Source position of an element, used for error reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,
}

/// Human-facing documentation carried alongside a definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Short display name (`formal-name`)
    pub formal_name: Option<String>,

    /// One-line description
    pub description: Option<String>,

    /// Remarks paragraphs flattened to text
    pub remarks: Option<String>,

    /// Worked examples
    pub examples: Vec<Example>,

    /// Where the owning element starts in its source document
    pub position: Position,
}

/// An `example` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Example {
    /// External example location (`@href`)
    pub href: Option<String>,

    /// Path of the example within the target document (`@path`)
    pub path: Option<String>,

    pub description: Option<String>,

    pub remarks: Option<String>,

    /// Inline example content as text
    pub content: String,
}

impl Position {
    /// Create a new position
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Metadata {
    /// Create empty metadata anchored at `position`
    #[must_use]
    pub fn at(position: Position) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the formal name
    #[must_use]
    pub fn with_formal_name(mut self, formal_name: impl Into<String>) -> Self {
        self.formal_name = Some(formal_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_creation() {
        let pos = Position::new(10, 20);
        assert_eq!(pos.line, 10);
        assert_eq!(pos.column, 20);
    }

    #[test]
    fn test_metadata_builder() {
        let meta = Metadata::at(Position::new(3, 5))
            .with_formal_name("Widget")
            .with_description("A widget");

        assert_eq!(meta.formal_name.as_deref(), Some("Widget"));
        assert_eq!(meta.description.as_deref(), Some("A widget"));
        assert_eq!(meta.position.line, 3);
        assert!(meta.examples.is_empty());
    }
}
