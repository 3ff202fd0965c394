//! The per-family arena that owns every document, declaration and multiplexer.
//!
//! Declarations are owned by the graph and carry their owning `DocumentId`;
//! documents and usages refer to them by handle, so cross-document links
//! never form ownership cycles.

use crate::definition::{Declaration, DeclarationKind, Scope};
use crate::document::{Dependency, Document, Namespace, RawDocument};
use crate::ids::{DeclarationId, DocumentId, MultiplexerId};
use crate::multiplexer::Multiplexer;
use crate::usage::{Usage, UsageRef};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// All documents of one schema family, linked by handles
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaGraph {
    documents: Vec<Document>,
    declarations: Vec<Declaration>,
    multiplexers: Vec<Multiplexer>,
    #[serde(skip)]
    multiplexer_index: BTreeMap<String, MultiplexerId>,
    #[serde(skip)]
    usage_multiplexers: BTreeMap<UsageRef, MultiplexerId>,
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a decoded document in the arena and index its globals.
    ///
    /// Every declaration is stamped with the new document as owner.
    pub fn insert(&mut self, raw: RawDocument) -> DocumentId {
        let doc_id = DocumentId::from_index(self.documents.len());
        let offset = self.declarations.len();
        let mut document = Document::new(doc_id, raw.header, raw.imports);

        for (local, (scope, mut definition)) in raw.declarations.into_iter().enumerate() {
            definition.rebase(offset);
            let id = DeclarationId::from_index(offset + local);
            let kind = definition.kind();

            match scope {
                Scope::Global => {
                    if !document.symbols.register(kind, definition.name.clone(), id) {
                        debug!(
                            "Duplicate {} '{}' in {}; first definition wins",
                            kind,
                            definition.name,
                            document.name()
                        );
                    }
                    match kind {
                        DeclarationKind::Assembly => document.assemblies.push(id),
                        DeclarationKind::Field => document.fields.push(id),
                        DeclarationKind::Flag => document.flags.push(id),
                    }
                }
                Scope::Inline => document.inline.push(id),
            }

            self.declarations.push(Declaration {
                id,
                owner: doc_id,
                scope,
                definition,
            });
        }

        self.documents.push(document);
        doc_id
    }

    /// Attach `child` as the next resolved import of `parent`
    pub fn add_import(&mut self, parent: DocumentId, child: DocumentId) {
        self.documents[parent.to_index()].imported.push(child);
    }

    /// The top-level document: the first one inserted
    pub fn root(&self) -> Option<DocumentId> {
        (!self.documents.is_empty()).then(|| DocumentId::from_index(0))
    }

    pub fn document(&self, id: DocumentId) -> &Document {
        &self.documents[id.to_index()]
    }

    pub fn document_mut(&mut self, id: DocumentId) -> &mut Document {
        &mut self.documents[id.to_index()]
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn declaration(&self, id: DeclarationId) -> &Declaration {
        &self.declarations[id.to_index()]
    }

    pub fn declaration_mut(&mut self, id: DeclarationId) -> &mut Declaration {
        &mut self.declarations[id.to_index()]
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn multiplexer(&self, id: MultiplexerId) -> &Multiplexer {
        &self.multiplexers[id.to_index()]
    }

    /// Global multiplexer list, in synthesis order
    pub fn multiplexers(&self) -> &[Multiplexer] {
        &self.multiplexers
    }

    /// The usage at `usage`, if the address is valid
    pub fn usage(&self, usage: UsageRef) -> Option<&Usage> {
        self.declarations
            .get(usage.declaration.to_index())?
            .definition
            .usage(usage.slot)
    }

    /// Scan `doc` for a global of `kind` named `name`, then each import in order, depth-first
    pub fn lookup(&self, doc: DocumentId, kind: DeclarationKind, name: &str) -> Option<DeclarationId> {
        let document = self.document(doc);
        if let Some(id) = document.symbols.get(kind, name) {
            return Some(id);
        }
        document
            .imported
            .iter()
            .find_map(|&imported| self.lookup(imported, kind, name))
    }

    /// Imports before importers, starting from `doc`
    pub fn post_order(&self, doc: DocumentId) -> Vec<DocumentId> {
        let mut out = Vec::new();
        self.visit_post_order(doc, &mut out);
        out
    }

    fn visit_post_order(&self, doc: DocumentId, out: &mut Vec<DocumentId>) {
        for &imported in &self.document(doc).imported {
            self.visit_post_order(imported, out);
        }
        out.push(doc);
    }

    /// Record a dependency of `doc` unless `owner` is `doc` itself
    pub fn register_dependency(
        &mut self,
        doc: DocumentId,
        owner: DocumentId,
        name: &str,
        dependency: Dependency,
    ) -> bool {
        if owner == doc {
            return false;
        }
        let namespace = self.dependency_namespace(dependency);
        self.document_mut(doc)
            .dependencies
            .register(namespace, name, dependency)
    }

    /// Namespace a dependency's name is registered under
    pub fn dependency_namespace(&self, dependency: Dependency) -> Namespace {
        match dependency {
            Dependency::Declaration(id) => Namespace::Declaration(self.declaration(id).kind()),
            Dependency::Multiplexer(_) => Namespace::Multiplexer,
        }
    }

    /// Document that owns a dependency's target
    pub fn dependency_owner(&self, dependency: Dependency) -> DocumentId {
        match dependency {
            Dependency::Declaration(id) => self.declaration(id).owner,
            Dependency::Multiplexer(id) => self.multiplexer(id).owner,
        }
    }

    /// Distinct documents `doc` depends on, sorted by identity (ties by handle)
    pub fn imported_dependencies(&self, doc: DocumentId) -> Vec<DocumentId> {
        let mut owners: Vec<DocumentId> = self
            .document(doc)
            .dependencies
            .iter()
            .map(|(_, dep)| self.dependency_owner(dep))
            .collect();
        owners.sort_by(|a, b| {
            self.document(*a)
                .name()
                .cmp(self.document(*b).name())
                .then(a.cmp(b))
        });
        owners.dedup();
        owners
    }

    /// Register a synthesized multiplexer with its owner and the name index.
    ///
    /// The caller guarantees no multiplexer of that name exists yet.
    pub fn add_multiplexer(&mut self, build: impl FnOnce(MultiplexerId) -> Multiplexer) -> MultiplexerId {
        let id = MultiplexerId::from_index(self.multiplexers.len());
        let mplex = build(id);
        self.multiplexer_index.insert(mplex.name.clone(), id);
        self.usage_multiplexers.insert(mplex.usage, id);
        self.documents[mplex.owner.to_index()].multiplexers.push(id);
        self.multiplexers.push(mplex);
        id
    }

    /// Note that `usage` is represented by the existing multiplexer `id`
    pub fn bind_usage(&mut self, usage: UsageRef, id: MultiplexerId) {
        self.usage_multiplexers.entry(usage).or_insert(id);
    }

    pub fn multiplexer_named(&self, name: &str) -> Option<MultiplexerId> {
        self.multiplexer_index.get(name).copied()
    }

    /// The multiplexer representing a grouped usage, for exporters
    pub fn multiplexer_for(&self, usage: UsageRef) -> Option<&Multiplexer> {
        self.usage_multiplexers
            .get(&usage)
            .map(|&id| self.multiplexer(id))
    }

    /// Sort one document's multiplexer list by name
    pub fn sort_multiplexers(&mut self, doc: DocumentId) {
        let mut ids = std::mem::take(&mut self.documents[doc.to_index()].multiplexers);
        ids.sort_by(|a, b| self.multiplexer(*a).name.cmp(&self.multiplexer(*b).name));
        self.documents[doc.to_index()].multiplexers = ids;
    }

    /// Whether `doc` declares a root assembly (`root-name`, or the one named by `@top`)
    pub fn contains_root_element(&self, doc: DocumentId) -> bool {
        let document = self.document(doc);
        document.assemblies.iter().any(|&id| {
            let decl = self.declaration(id);
            matches!(
                &decl.definition.body,
                crate::definition::DefinitionBody::Assembly(a) if a.root_name.is_some()
            ) || document.header.top.as_deref() == Some(decl.name())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{AssemblyDefinition, Definition, FieldDefinition, FlagDefinition};
    use crate::document::DocumentHeader;
    use crate::multiplexer::MultiplexMode;
    use crate::usage::{GroupAs, ModelItem, UsageSlot};

    fn raw(name: &str) -> RawDocument {
        RawDocument::new(DocumentHeader {
            name: name.to_string(),
            ..DocumentHeader::default()
        })
    }

    fn flag(name: &str) -> Definition {
        Definition::flag(name, FlagDefinition::default())
    }

    #[test]
    fn test_insert_stamps_owner_and_indexes_globals() {
        let mut graph = SchemaGraph::new();
        let mut first = raw("first");
        first.push(Scope::Global, flag("a"));
        let second_doc = {
            let mut second = raw("second");
            second.push(Scope::Global, flag("b"));
            second.push(Scope::Inline, flag("c"));
            second
        };

        let d1 = graph.insert(first);
        let d2 = graph.insert(second_doc);

        assert_eq!(graph.root(), Some(d1));
        assert_eq!(graph.declarations().len(), 3);
        let b = graph.document(d2).flags[0];
        assert_eq!(graph.declaration(b).owner, d2);
        assert_eq!(graph.declaration(b).name(), "b");
        assert_eq!(graph.document(d2).inline.len(), 1);
        assert_eq!(graph.document(d2).symbols.get(DeclarationKind::Flag, "c"), None);
    }

    #[test]
    fn test_insert_rebases_inline_handles() {
        let mut graph = SchemaGraph::new();
        let mut first = raw("first");
        first.push(Scope::Global, flag("x"));
        graph.insert(first);

        let mut second = raw("second");
        let inline = second.push(Scope::Inline, flag("inline-flag"));
        second.push(
            Scope::Global,
            Definition::field(
                "f",
                FieldDefinition {
                    flags: vec![Usage::inline(DeclarationKind::Flag, inline)],
                    ..FieldDefinition::default()
                },
            ),
        );
        let d2 = graph.insert(second);

        let field = graph.declaration(graph.document(d2).fields[0]);
        let target = field.definition.flags()[0].declaration().unwrap();
        assert_eq!(graph.declaration(target).name(), "inline-flag");
        assert_eq!(graph.declaration(target).owner, d2);
    }

    #[test]
    fn test_lookup_prefers_local_then_imports_in_order() {
        let mut graph = SchemaGraph::new();
        let mut top = raw("top");
        top.push(Scope::Global, flag("shared"));
        let top_id = graph.insert(top);

        let mut first = raw("first");
        first.push(Scope::Global, flag("shared"));
        first.push(Scope::Global, flag("only-imported"));
        let first_id = graph.insert(first);

        let mut second = raw("second");
        second.push(Scope::Global, flag("only-imported"));
        let second_id = graph.insert(second);

        graph.add_import(top_id, first_id);
        graph.add_import(top_id, second_id);

        let shared = graph.lookup(top_id, DeclarationKind::Flag, "shared").unwrap();
        assert_eq!(graph.declaration(shared).owner, top_id);

        let imported = graph
            .lookup(top_id, DeclarationKind::Flag, "only-imported")
            .unwrap();
        assert_eq!(graph.declaration(imported).owner, first_id);

        assert!(graph.lookup(top_id, DeclarationKind::Field, "shared").is_none());
    }

    #[test]
    fn test_post_order_visits_imports_first() {
        let mut graph = SchemaGraph::new();
        let a = graph.insert(raw("a"));
        let b = graph.insert(raw("b"));
        let c = graph.insert(raw("c"));
        let d = graph.insert(raw("d"));
        graph.add_import(a, b);
        graph.add_import(b, c);
        graph.add_import(a, d);

        assert_eq!(graph.post_order(a), vec![c, b, d, a]);
    }

    #[test]
    fn test_register_dependency_skips_own_document() {
        let mut graph = SchemaGraph::new();
        let mut a = raw("a");
        a.push(Scope::Global, flag("x"));
        let a_id = graph.insert(a);
        let x = graph.document(a_id).flags[0];

        assert!(!graph.register_dependency(a_id, a_id, "x", Dependency::Declaration(x)));
        assert!(graph.document(a_id).dependencies.is_empty());
    }

    #[test]
    fn test_imported_dependencies_sorted_and_distinct() {
        let mut graph = SchemaGraph::new();
        let top = graph.insert(raw("top"));
        let mut zulu = raw("zulu");
        zulu.push(Scope::Global, flag("z1"));
        zulu.push(Scope::Global, flag("z2"));
        let zulu = graph.insert(zulu);
        let mut alpha = raw("alpha");
        alpha.push(Scope::Global, flag("a1"));
        let alpha = graph.insert(alpha);

        for (doc, name) in [(zulu, "z1"), (zulu, "z2"), (alpha, "a1")] {
            let id = graph.lookup(doc, DeclarationKind::Flag, name).unwrap();
            graph.register_dependency(top, doc, name, Dependency::Declaration(id));
        }

        assert_eq!(graph.imported_dependencies(top), vec![alpha, zulu]);
    }

    #[test]
    fn test_flag_and_field_of_same_name_both_recorded() {
        let mut graph = SchemaGraph::new();
        let root = graph.insert(raw("root"));
        let mut a = raw("a");
        a.push(Scope::Global, flag("title"));
        let a = graph.insert(a);
        let mut b = raw("b");
        b.push(Scope::Global, Definition::field("title", FieldDefinition::default()));
        let b = graph.insert(b);
        graph.add_import(root, a);
        graph.add_import(root, b);

        let flag_title = graph.lookup(root, DeclarationKind::Flag, "title").unwrap();
        let field_title = graph.lookup(root, DeclarationKind::Field, "title").unwrap();
        assert!(graph.register_dependency(root, a, "title", Dependency::Declaration(flag_title)));
        assert!(graph.register_dependency(root, b, "title", Dependency::Declaration(field_title)));

        let deps = &graph.document(root).dependencies;
        assert_eq!(deps.len(), 2);
        assert_eq!(
            deps.get(Namespace::Declaration(DeclarationKind::Field), "title"),
            Some(Dependency::Declaration(field_title))
        );
        assert_eq!(graph.imported_dependencies(root), vec![a, b]);
    }

    #[test]
    fn test_multiplexer_registration() {
        let mut graph = SchemaGraph::new();
        let mut doc = raw("root");
        let part = doc.push(
            Scope::Global,
            Definition::field("Part", FieldDefinition::default()),
        );
        doc.push(
            Scope::Global,
            Definition::assembly(
                "Widget",
                AssemblyDefinition {
                    model: vec![ModelItem::Usage(
                        Usage::inline(DeclarationKind::Field, part).grouped(GroupAs::new("parts")),
                    )],
                    ..AssemblyDefinition::default()
                },
            ),
        );
        let doc_id = graph.insert(doc);
        let widget = graph.document(doc_id).assemblies[0];
        let usage = graph.declaration(widget).usage_ref(UsageSlot::Model(0));

        let id = graph.add_multiplexer(|id| Multiplexer {
            id,
            name: "PartMultiplexer".to_string(),
            owner: doc_id,
            usage,
            wrapped: part,
            wrapped_name: "Part".to_string(),
            kind: DeclarationKind::Field,
            group: GroupAs::new("parts"),
            mode: MultiplexMode::SingletonOrArray,
        });

        assert_eq!(graph.multiplexer_named("PartMultiplexer"), Some(id));
        assert_eq!(graph.document(doc_id).multiplexers, vec![id]);
        assert_eq!(graph.multiplexer_for(usage).map(|m| m.id), Some(id));
        assert!(graph.usage(usage).unwrap().requires_multiplexer());
    }
}
