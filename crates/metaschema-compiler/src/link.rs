//! Definition linking.
//!
//! Every reference usage in the graph is bound to exactly one declaration.
//! Lookup starts with the referencing document's own globals and then walks
//! its imports in order, depth-first; the first match wins. A match owned by
//! another document is recorded in the referencing document's dependency set.

use crate::{Error, Result};
use metaschema_model::{DeclarationId, DeclarationKind, Dependency, DocumentId, Position, SchemaGraph, UsageSlot};
use tracing::{debug, trace};

/// An unresolved usage waiting for lookup
struct Pending {
    slot: UsageSlot,
    kind: DeclarationKind,
    name: String,
    position: Position,
}

/// Link every document in `graph`. Returns the number of usages resolved.
///
/// Usages that are already resolved are left alone, so linking twice is harmless.
pub fn link(graph: &mut SchemaGraph) -> Result<usize> {
    let mut resolved = 0;
    for index in 0..graph.documents().len() {
        resolved += link_document(graph, DocumentId::from_index(index))?;
    }
    debug!("Linked {} usages across {} documents", resolved, graph.documents().len());
    Ok(resolved)
}

/// Link the declarations owned by one document
pub fn link_document(graph: &mut SchemaGraph, doc: DocumentId) -> Result<usize> {
    let owned: Vec<DeclarationId> = graph.document(doc).owned_declarations().collect();
    let mut resolved = 0;

    for declaration in owned {
        for pending in pending_usages(graph, declaration) {
            let target = graph
                .lookup(doc, pending.kind, &pending.name)
                .ok_or_else(|| {
                    Error::unresolved(
                        graph.document(doc),
                        pending.position,
                        graph.declaration(declaration).name(),
                        pending.kind,
                        &pending.name,
                    )
                })?;

            let owner = graph.declaration(target).owner;
            trace!(
                "{}: {} '{}' -> {} in {}",
                graph.document(doc).name(),
                pending.kind,
                pending.name,
                target,
                graph.document(owner).name()
            );
            if graph.register_dependency(doc, owner, &pending.name, Dependency::Declaration(target)) {
                debug!(
                    "{} depends on '{}' from {}",
                    graph.document(doc).name(),
                    pending.name,
                    graph.document(owner).name()
                );
            }

            if let Some(usage) = graph
                .declaration_mut(declaration)
                .definition
                .usage_mut(pending.slot)
            {
                if usage.resolve(target) {
                    resolved += 1;
                }
            }
        }
    }
    Ok(resolved)
}

/// Flags first, then model usages with choice members, in document order
fn pending_usages(graph: &SchemaGraph, declaration: DeclarationId) -> Vec<Pending> {
    graph
        .declaration(declaration)
        .definition
        .usages()
        .into_iter()
        .filter(|(_, usage)| usage.is_unresolved())
        .filter_map(|(slot, usage)| {
            usage.reference_name().map(|name| Pending {
                slot,
                kind: usage.kind,
                name: name.to_string(),
                position: usage.position,
            })
        })
        .collect()
}
