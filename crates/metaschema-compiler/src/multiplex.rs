//! Multiplexer synthesis.
//!
//! A grouped usage whose key/value shape differs from its array shape gets a
//! multiplexer named after the referenced declaration. Documents are visited
//! imports-first and the graph keeps one multiplexer per name; a later usage
//! deriving an existing name depends on that instance instead of creating a
//! second one.

use crate::{Error, Result};
use metaschema_model::multiplexer::derive_name;
use metaschema_model::{
    DeclarationId, DeclarationKind, Dependency, DocumentId, GroupAs, MultiplexMode, Multiplexer, Position,
    SchemaGraph, UsageRef, UsageSlot,
};
use tracing::{debug, info};

/// A grouped usage that needs reconciling
struct Candidate {
    usage: UsageRef,
    kind: DeclarationKind,
    declaration_name: String,
    reference_name: String,
    wrapped: Option<DeclarationId>,
    group: GroupAs,
    position: Position,
}

/// Synthesize multiplexers for the family rooted at the graph's first document.
///
/// Must run after [`crate::link`]. Returns the number of multiplexers created.
pub fn synthesize(graph: &mut SchemaGraph, suffix: &str) -> Result<usize> {
    let Some(root) = graph.root() else {
        return Ok(0);
    };

    let before = graph.multiplexers().len();
    for doc in graph.post_order(root) {
        synthesize_document(graph, doc, suffix)?;
    }

    let created = graph.multiplexers().len() - before;
    info!(
        "Synthesized {} multiplexers for '{}'",
        created,
        graph.document(root).name()
    );
    Ok(created)
}

fn synthesize_document(graph: &mut SchemaGraph, doc: DocumentId, suffix: &str) -> Result<()> {
    for candidate in candidates(graph, doc) {
        let Some(wrapped) = candidate.wrapped else {
            return Err(Error::unresolved(
                graph.document(doc),
                candidate.position,
                candidate.declaration_name,
                candidate.kind,
                candidate.reference_name,
            ));
        };

        let target = graph.declaration(wrapped);
        let mode = if candidate.group.is_by_key() {
            let index_flag = target.definition.json_key().ok_or_else(|| {
                Error::missing_index_key(
                    graph.document(doc),
                    candidate.position,
                    &candidate.declaration_name,
                    target.name(),
                    &candidate.group.name,
                )
            })?;
            MultiplexMode::ByKey {
                index_flag: index_flag.to_string(),
            }
        } else {
            MultiplexMode::SingletonOrArray
        };

        let name = derive_name(target.name(), suffix);
        let wrapped_name = target.name().to_string();
        let kind = target.kind();
        if let Some(existing) = graph.multiplexer_named(&name) {
            let owner = graph.multiplexer(existing).owner;
            graph.register_dependency(doc, owner, &name, Dependency::Multiplexer(existing));
            graph.bind_usage(candidate.usage, existing);
            debug!(
                "Reusing {} from {} for '{}'",
                name,
                graph.document(owner).name(),
                candidate.declaration_name
            );
            continue;
        }

        let id = graph.add_multiplexer(|id| Multiplexer {
            id,
            name,
            owner: doc,
            usage: candidate.usage,
            wrapped,
            wrapped_name,
            kind,
            group: candidate.group,
            mode,
        });
        debug!(
            "Created {} in {}",
            graph.multiplexer(id).name,
            graph.document(doc).name()
        );
    }

    graph.sort_multiplexers(doc);
    Ok(())
}

/// Grouped model usages (choice members included) that need a multiplexer
fn candidates(graph: &SchemaGraph, doc: DocumentId) -> Vec<Candidate> {
    let mut out = Vec::new();
    for id in graph.document(doc).owned_declarations() {
        let declaration = graph.declaration(id);
        for (slot, usage) in declaration.definition.usages() {
            if matches!(slot, UsageSlot::Flag(_)) || !usage.requires_multiplexer() {
                continue;
            }
            let Some(group) = usage.group_as.clone() else {
                continue;
            };
            out.push(Candidate {
                usage: declaration.usage_ref(slot),
                kind: usage.kind,
                declaration_name: declaration.name().to_string(),
                reference_name: usage.reference_name().unwrap_or_default().to_string(),
                wrapped: usage.declaration(),
                group,
                position: usage.position,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link;
    use metaschema_model::{
        AssemblyDefinition, Definition, DocumentHeader, FieldDefinition,
        JsonGrouping, ModelItem, Namespace, RawDocument, Scope, Usage,
    };

    const SUFFIX: &str = "Multiplexer";

    fn header(name: &str) -> DocumentHeader {
        DocumentHeader {
            name: name.to_string(),
            ..DocumentHeader::default()
        }
    }

    fn keyed_field(name: &str, key: Option<&str>) -> Definition {
        Definition::field(
            name,
            FieldDefinition {
                json_key: key.map(str::to_string),
                ..FieldDefinition::default()
            },
        )
    }

    fn holder(name: &str, usages: Vec<Usage>) -> Definition {
        Definition::assembly(
            name,
            AssemblyDefinition {
                model: usages.into_iter().map(ModelItem::Usage).collect(),
                ..AssemblyDefinition::default()
            },
        )
    }

    fn grouped(target: &str, group: &str, in_json: JsonGrouping) -> Usage {
        Usage::reference(DeclarationKind::Field, target)
            .grouped(GroupAs::new(group).with_in_json(in_json))
    }

    fn single(doc: RawDocument) -> SchemaGraph {
        let mut graph = SchemaGraph::new();
        graph.insert(doc);
        link(&mut graph).unwrap();
        graph
    }

    #[test]
    fn test_default_grouping_yields_multiplexer() {
        let mut raw = RawDocument::new(header("root"));
        raw.push(Scope::Global, keyed_field("item", None));
        raw.push(
            Scope::Global,
            holder("list", vec![grouped("item", "items", JsonGrouping::SingletonOrArray)]),
        );
        let mut graph = single(raw);

        assert_eq!(synthesize(&mut graph, SUFFIX).unwrap(), 1);
        let mplex = &graph.multiplexers()[0];
        assert_eq!(mplex.name, "itemMultiplexer");
        assert_eq!(mplex.mode, MultiplexMode::SingletonOrArray);
        assert_eq!(mplex.kind, DeclarationKind::Field);
        assert_eq!(mplex.group.name, "items");
        assert_eq!(graph.multiplexer_for(mplex.usage).map(|m| m.id), Some(mplex.id));
    }

    #[test]
    fn test_array_and_ungrouped_yield_none() {
        let mut raw = RawDocument::new(header("root"));
        raw.push(Scope::Global, keyed_field("item", None));
        raw.push(
            Scope::Global,
            holder(
                "list",
                vec![
                    grouped("item", "items", JsonGrouping::Array),
                    Usage::reference(DeclarationKind::Field, "item"),
                ],
            ),
        );
        let mut graph = single(raw);

        assert_eq!(synthesize(&mut graph, SUFFIX).unwrap(), 0);
        assert!(graph.multiplexers().is_empty());
    }

    #[test]
    fn test_by_key_uses_index_flag() {
        let mut raw = RawDocument::new(header("root"));
        raw.push(Scope::Global, keyed_field("param", Some("id")));
        raw.push(
            Scope::Global,
            holder("control", vec![grouped("param", "params", JsonGrouping::ByKey)]),
        );
        let mut graph = single(raw);

        synthesize(&mut graph, SUFFIX).unwrap();
        let mplex = &graph.multiplexers()[0];
        assert_eq!(mplex.index_flag(), Some("id"));
        assert!(mplex.in_json_map());
    }

    #[test]
    fn test_by_key_without_index_flag_is_error() {
        let mut raw = RawDocument::new(header("root"));
        raw.push(Scope::Global, keyed_field("param", None));
        raw.push(
            Scope::Global,
            holder("control", vec![grouped("param", "params", JsonGrouping::ByKey)]),
        );
        let mut graph = single(raw);

        match synthesize(&mut graph, SUFFIX).unwrap_err() {
            Error::MissingIndexKey {
                document,
                declaration,
                target,
                group,
                ..
            } => {
                assert_eq!(document, "root");
                assert_eq!(declaration, "control");
                assert_eq!(target, "param");
                assert_eq!(group, "params");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_name_in_two_documents_synthesized_once() {
        let mut lib = RawDocument::new(header("lib"));
        lib.push(Scope::Global, keyed_field("item", None));
        lib.push(
            Scope::Global,
            holder("inner", vec![grouped("item", "items", JsonGrouping::SingletonOrArray)]),
        );

        let mut root = RawDocument::new(header("root"));
        root.push(
            Scope::Global,
            holder("outer", vec![grouped("item", "entries", JsonGrouping::SingletonOrArray)]),
        );

        let mut graph = SchemaGraph::new();
        let root_id = graph.insert(root);
        let lib_id = graph.insert(lib);
        graph.add_import(root_id, lib_id);
        link(&mut graph).unwrap();

        assert_eq!(synthesize(&mut graph, SUFFIX).unwrap(), 1);
        let mplex = &graph.multiplexers()[0];
        assert_eq!(mplex.owner, lib_id);
        assert_eq!(
            graph.document(root_id).dependencies.get(Namespace::Multiplexer, "itemMultiplexer"),
            Some(Dependency::Multiplexer(mplex.id))
        );

        // both usages map to the one instance
        let outer = graph.document(root_id).assemblies[0];
        let outer_usage = graph.declaration(outer).usage_ref(UsageSlot::Model(0));
        assert_eq!(graph.multiplexer_for(outer_usage).map(|m| m.id), Some(mplex.id));
        assert!(graph.document(root_id).multiplexers.is_empty());
    }

    #[test]
    fn test_synthesis_is_idempotent() {
        let mut raw = RawDocument::new(header("root"));
        raw.push(Scope::Global, keyed_field("item", None));
        raw.push(
            Scope::Global,
            holder("list", vec![grouped("item", "items", JsonGrouping::SingletonOrArray)]),
        );
        let mut graph = single(raw);

        assert_eq!(synthesize(&mut graph, SUFFIX).unwrap(), 1);
        assert_eq!(synthesize(&mut graph, SUFFIX).unwrap(), 0);
        assert_eq!(graph.multiplexers().len(), 1);
    }

    #[test]
    fn test_choice_members_considered_and_sorted() {
        let mut raw = RawDocument::new(header("root"));
        raw.push(Scope::Global, keyed_field("zeta", None));
        raw.push(Scope::Global, keyed_field("alpha", None));
        raw.push(
            Scope::Global,
            Definition::assembly(
                "holder",
                AssemblyDefinition {
                    model: vec![ModelItem::Choice(vec![
                        grouped("zeta", "zetas", JsonGrouping::SingletonOrArray),
                        grouped("alpha", "alphas", JsonGrouping::SingletonOrArray),
                    ])],
                    ..AssemblyDefinition::default()
                },
            ),
        );
        let mut graph = single(raw);
        synthesize(&mut graph, SUFFIX).unwrap();

        let root = graph.root().unwrap();
        let names: Vec<&str> = graph
            .document(root)
            .multiplexers
            .iter()
            .map(|&id| graph.multiplexer(id).name.as_str())
            .collect();
        assert_eq!(names, vec!["alphaMultiplexer", "zetaMultiplexer"]);
    }

    #[test]
    fn test_custom_suffix() {
        let mut raw = RawDocument::new(header("root"));
        raw.push(Scope::Global, keyed_field("item", None));
        raw.push(
            Scope::Global,
            holder("list", vec![grouped("item", "items", JsonGrouping::SingletonOrArray)]),
        );
        let mut graph = single(raw);
        synthesize(&mut graph, "Choice").unwrap();
        assert!(graph.multiplexer_named("itemChoice").is_some());
    }

    #[test]
    fn test_unlinked_usage_is_unresolved_error() {
        let mut raw = RawDocument::new(header("root"));
        raw.push(Scope::Global, keyed_field("item", None));
        raw.push(
            Scope::Global,
            holder("list", vec![grouped("item", "items", JsonGrouping::SingletonOrArray)]),
        );
        let mut graph = SchemaGraph::new();
        graph.insert(raw);

        assert!(matches!(
            synthesize(&mut graph, SUFFIX),
            Err(Error::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_empty_graph() {
        let mut graph = SchemaGraph::new();
        assert_eq!(synthesize(&mut graph, SUFFIX).unwrap(), 0);
    }
}
