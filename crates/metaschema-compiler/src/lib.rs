#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # metaschema-compiler
//!
//! Turns a family of metaschema documents into a linked [`SchemaGraph`].
//!
//! The pipeline runs in four passes over one family:
//! decode → import resolution → linking → multiplexer synthesis.

pub mod cache;
pub mod compiler;
pub mod config;
pub mod decode;
pub mod link;
pub mod loader;
pub mod multiplex;
pub mod xml;

pub use cache::DocumentCache;
pub use compiler::{Compiler, discover_families};
pub use config::CompilerConfig;
pub use link::link;
pub use loader::SchemaLoader;
pub use metaschema_model::SchemaGraph;
pub use multiplex::synthesize;

use metaschema_model::{DeclarationKind, Document, Position};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort compilation of a schema family
#[derive(Error, Debug)]
pub enum Error {
    #[error("{}{}: malformed <{element}>: {message}", path.display(), at_line(*line))]
    Format {
        path: PathBuf,
        element: String,
        line: Option<usize>,
        message: String,
    },

    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "{}{}: {kind} '{name}' used in '{declaration}' of '{document}' is not defined in any imported document",
        path.display(),
        at_line(*line)
    )]
    UnresolvedReference {
        path: PathBuf,
        line: Option<usize>,
        document: String,
        declaration: String,
        kind: DeclarationKind,
        name: String,
    },

    #[error(
        "{}{}: group '{group}' in '{declaration}' of '{document}' is BY_KEY but '{target}' declares no json-key index flag",
        path.display(),
        at_line(*line)
    )]
    MissingIndexKey {
        path: PathBuf,
        line: Option<usize>,
        document: String,
        declaration: String,
        target: String,
        group: String,
    },

    #[error("Import cycle: {}", chain.join(" -> "))]
    ImportCycle { chain: Vec<String> },

    #[error("Invalid configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

fn at_line(line: Option<usize>) -> String {
    line.map(|l| format!(":{l}")).unwrap_or_default()
}

/// Line of a usage; positions of usages built in memory are all zero
fn known_line(position: Position) -> Option<usize> {
    (position.line > 0).then_some(position.line)
}

impl Error {
    /// Build a format error for an element of `path`.
    pub fn format(
        path: impl Into<PathBuf>,
        element: impl Into<String>,
        line: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self::Format {
            path: path.into(),
            element: element.into(),
            line,
            message: message.into(),
        }
    }

    /// Build an I/O error naming the unreadable location.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an unresolved-reference error for a usage at `position` in `document`.
    pub fn unresolved(
        document: &Document,
        position: Position,
        declaration: impl Into<String>,
        kind: DeclarationKind,
        name: impl Into<String>,
    ) -> Self {
        Self::UnresolvedReference {
            path: document.header.source.clone(),
            line: known_line(position),
            document: document.name().to_string(),
            declaration: declaration.into(),
            kind,
            name: name.into(),
        }
    }

    /// Build a missing-index-key error for a grouped usage at `position` in `document`.
    pub fn missing_index_key(
        document: &Document,
        position: Position,
        declaration: impl Into<String>,
        target: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self::MissingIndexKey {
            path: document.header.source.clone(),
            line: known_line(position),
            document: document.name().to_string(),
            declaration: declaration.into(),
            target: target.into(),
            group: group.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
