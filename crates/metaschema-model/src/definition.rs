//! Declarations: named, reusable assembly, field and flag definitions

use crate::datatype::Datatype;
use crate::ids::{DeclarationId, DocumentId};
use crate::metadata::Metadata;
use crate::usage::{ModelItem, Usage, UsageRef, UsageSlot};
use serde::Serialize;
use std::fmt;

/// The three declaration kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DeclarationKind {
    Assembly,
    Field,
    Flag,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeclarationKind::Assembly => "assembly",
            DeclarationKind::Field => "field",
            DeclarationKind::Flag => "flag",
        })
    }
}

/// Structured content: flags plus a model of nested usages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyDefinition {
    pub flags: Vec<Usage>,
    pub model: Vec<ModelItem>,
    /// Name of the index flag (`json-key/@flag-name`)
    pub json_key: Option<String>,
    /// Element name when this assembly is a document root (`root-name`)
    pub root_name: Option<String>,
    pub address: Option<String>,
}

/// Leaf content with optional flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    pub flags: Vec<Usage>,
    pub datatype: Datatype,
    pub json_key: Option<String>,
    /// Property name of the value in the key/value encoding
    pub json_value_key: Option<String>,
    /// Flag whose value names the value property (`json-value-key/@flag-name`)
    pub json_value_key_flag: Option<String>,
}

/// A primitive-valued attribute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagDefinition {
    pub datatype: Datatype,
    pub allowed_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DefinitionBody {
    Assembly(AssemblyDefinition),
    Field(FieldDefinition),
    Flag(FlagDefinition),
}

/// A decoded definition, before it is placed in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub name: String,
    pub metadata: Metadata,
    pub body: DefinitionBody,
}

/// Whether a declaration is addressable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scope {
    /// Top-level definition, entered in the owning document's symbol table
    Global,
    /// Anonymous definition nested inside a usage
    Inline,
}

/// A definition placed in the graph, with its fixed owning document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub id: DeclarationId,
    pub owner: DocumentId,
    pub scope: Scope,
    pub definition: Definition,
}

impl Definition {
    pub fn assembly(name: impl Into<String>, body: AssemblyDefinition) -> Self {
        Self::new(name, DefinitionBody::Assembly(body))
    }

    pub fn field(name: impl Into<String>, body: FieldDefinition) -> Self {
        Self::new(name, DefinitionBody::Field(body))
    }

    pub fn flag(name: impl Into<String>, body: FlagDefinition) -> Self {
        Self::new(name, DefinitionBody::Flag(body))
    }

    fn new(name: impl Into<String>, body: DefinitionBody) -> Self {
        Self {
            name: name.into(),
            metadata: Metadata::default(),
            body,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn kind(&self) -> DeclarationKind {
        match self.body {
            DefinitionBody::Assembly(_) => DeclarationKind::Assembly,
            DefinitionBody::Field(_) => DeclarationKind::Field,
            DefinitionBody::Flag(_) => DeclarationKind::Flag,
        }
    }

    /// Flag usages; always empty for flag definitions
    pub fn flags(&self) -> &[Usage] {
        match &self.body {
            DefinitionBody::Assembly(a) => &a.flags,
            DefinitionBody::Field(f) => &f.flags,
            DefinitionBody::Flag(_) => &[],
        }
    }

    /// Model entries; only assemblies have a model
    pub fn model(&self) -> &[ModelItem] {
        match &self.body {
            DefinitionBody::Assembly(a) => &a.model,
            DefinitionBody::Field(_) | DefinitionBody::Flag(_) => &[],
        }
    }

    /// Index flag named by `json-key`, if declared
    pub fn json_key(&self) -> Option<&str> {
        match &self.body {
            DefinitionBody::Assembly(a) => a.json_key.as_deref(),
            DefinitionBody::Field(f) => f.json_key.as_deref(),
            DefinitionBody::Flag(_) => None,
        }
    }

    /// Value datatype of fields and flags
    pub fn datatype(&self) -> Option<Datatype> {
        match &self.body {
            DefinitionBody::Assembly(_) => None,
            DefinitionBody::Field(f) => Some(f.datatype),
            DefinitionBody::Flag(f) => Some(f.datatype),
        }
    }

    /// Every usage with its slot: flags first, then model entries, choice members in place
    pub fn usages(&self) -> Vec<(UsageSlot, &Usage)> {
        let mut out: Vec<(UsageSlot, &Usage)> = self
            .flags()
            .iter()
            .enumerate()
            .map(|(i, u)| (UsageSlot::Flag(i), u))
            .collect();
        for (item, entry) in self.model().iter().enumerate() {
            match entry {
                ModelItem::Usage(u) => out.push((UsageSlot::Model(item), u)),
                ModelItem::Choice(members) => {
                    out.extend(
                        members
                            .iter()
                            .enumerate()
                            .map(|(member, u)| (UsageSlot::Choice { item, member }, u)),
                    );
                }
                ModelItem::Prose | ModelItem::Any => {}
            }
        }
        out
    }

    /// Look up one usage by slot
    pub fn usage(&self, slot: UsageSlot) -> Option<&Usage> {
        match slot {
            UsageSlot::Flag(i) => self.flags().get(i),
            UsageSlot::Model(i) => match self.model().get(i)? {
                ModelItem::Usage(u) => Some(u),
                _ => None,
            },
            UsageSlot::Choice { item, member } => match self.model().get(item)? {
                ModelItem::Choice(members) => members.get(member),
                _ => None,
            },
        }
    }

    pub fn usage_mut(&mut self, slot: UsageSlot) -> Option<&mut Usage> {
        match (&mut self.body, slot) {
            (DefinitionBody::Assembly(a), UsageSlot::Flag(i)) => a.flags.get_mut(i),
            (DefinitionBody::Field(f), UsageSlot::Flag(i)) => f.flags.get_mut(i),
            (DefinitionBody::Assembly(a), UsageSlot::Model(i)) => match a.model.get_mut(i)? {
                ModelItem::Usage(u) => Some(u),
                _ => None,
            },
            (DefinitionBody::Assembly(a), UsageSlot::Choice { item, member }) => {
                match a.model.get_mut(item)? {
                    ModelItem::Choice(members) => members.get_mut(member),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Shift inline-declaration handles by `offset`
    pub(crate) fn rebase(&mut self, offset: usize) {
        match &mut self.body {
            DefinitionBody::Assembly(a) => {
                a.flags.iter_mut().for_each(|u| u.rebase(offset));
                for item in &mut a.model {
                    item.usages_mut().iter_mut().for_each(|u| u.rebase(offset));
                }
            }
            DefinitionBody::Field(f) => f.flags.iter_mut().for_each(|u| u.rebase(offset)),
            DefinitionBody::Flag(_) => {}
        }
    }
}

impl Declaration {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn kind(&self) -> DeclarationKind {
        self.definition.kind()
    }

    pub fn is_inline(&self) -> bool {
        self.scope == Scope::Inline
    }

    /// Address of one of this declaration's usages
    pub fn usage_ref(&self, slot: UsageSlot) -> UsageRef {
        UsageRef {
            declaration: self.id,
            slot,
        }
    }
}
