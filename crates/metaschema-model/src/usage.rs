//! Usages: occurrences of a declaration inside another declaration's structure

use crate::datatype::Datatype;
use crate::definition::DeclarationKind;
use crate::ids::DeclarationId;
use crate::metadata::Position;
use crate::Error;
use serde::Serialize;
use std::str::FromStr;

/// How a grouped usage is shaped in the key/value (JSON-style) encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum JsonGrouping {
    /// A single member may be written as a bare value instead of a one-element list
    #[default]
    SingletonOrArray,
    /// Always a list
    Array,
    /// A mapping keyed on the referenced declaration's index flag
    ByKey,
}

/// How a grouped usage is shaped in the array (XML-style) encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum XmlGrouping {
    /// Bare repetition of the member element
    #[default]
    Ungrouped,
    /// Repetitions wrapped in an element named after the group
    Grouped,
}

/// Collection semantics of a repeated usage (`group-as`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupAs {
    pub name: String,
    pub in_json: JsonGrouping,
    pub in_xml: XmlGrouping,
}

/// How a field usage's value appears in the array encoding (`field/@in-xml`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FieldWrapping {
    #[default]
    Wrapped,
    /// Value content is inlined into the parent without an element
    Unwrapped,
    WithWrapper,
}

/// Upper occurrence bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MaxOccurs {
    Bounded(u32),
    #[default]
    Unbounded,
}

/// What a usage points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UsageTarget {
    /// A named declaration, resolved by the linker
    Reference {
        name: String,
        resolved: Option<DeclarationId>,
    },
    /// An anonymous declaration owned by the same document
    Inline(DeclarationId),
}

/// One occurrence of a declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub kind: DeclarationKind,
    pub target: UsageTarget,
    pub group_as: Option<GroupAs>,
    pub required: bool,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    /// Only meaningful for field usages
    pub in_xml: FieldWrapping,
    /// Datatype override on a flag reference
    pub datatype: Option<Datatype>,
    /// Legacy `value` children of a flag usage
    pub allowed_values: Vec<String>,
    /// Local description, taking precedence over the declaration's
    pub description: Option<String>,
    pub remarks: Option<String>,
    pub position: Position,
}

/// An entry of an assembly's model, in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ModelItem {
    Usage(Usage),
    Choice(Vec<Usage>),
    Prose,
    Any,
}

/// Location of a usage inside its containing declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum UsageSlot {
    Flag(usize),
    Model(usize),
    Choice { item: usize, member: usize },
}

/// Address of one usage in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UsageRef {
    /// The declaration whose structure contains the usage
    pub declaration: DeclarationId,
    pub slot: UsageSlot,
}

impl JsonGrouping {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JsonGrouping::SingletonOrArray => "SINGLETON_OR_ARRAY",
            JsonGrouping::Array => "ARRAY",
            JsonGrouping::ByKey => "BY_KEY",
        }
    }
}

impl FromStr for JsonGrouping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "SINGLETON_OR_ARRAY" => Ok(JsonGrouping::SingletonOrArray),
            "ARRAY" => Ok(JsonGrouping::Array),
            "BY_KEY" => Ok(JsonGrouping::ByKey),
            other => Err(Error::invalid_attribute("in-json", other)),
        }
    }
}

impl FromStr for XmlGrouping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "UNGROUPED" => Ok(XmlGrouping::Ungrouped),
            "GROUPED" => Ok(XmlGrouping::Grouped),
            other => Err(Error::invalid_attribute("in-xml", other)),
        }
    }
}

impl FromStr for FieldWrapping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "WRAPPED" => Ok(FieldWrapping::Wrapped),
            "UNWRAPPED" => Ok(FieldWrapping::Unwrapped),
            "WITH_WRAPPER" => Ok(FieldWrapping::WithWrapper),
            other => Err(Error::invalid_attribute("in-xml", other)),
        }
    }
}

impl FromStr for MaxOccurs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "unbounded" {
            return Ok(MaxOccurs::Unbounded);
        }
        s.parse::<u32>()
            .map(MaxOccurs::Bounded)
            .map_err(|_| Error::invalid_attribute("max-occurs", s))
    }
}

impl GroupAs {
    /// Create a group with default encodings (singleton-or-array, ungrouped)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            in_json: JsonGrouping::default(),
            in_xml: XmlGrouping::default(),
        }
    }

    #[must_use]
    pub fn with_in_json(mut self, in_json: JsonGrouping) -> Self {
        self.in_json = in_json;
        self
    }

    #[must_use]
    pub fn with_in_xml(mut self, in_xml: XmlGrouping) -> Self {
        self.in_xml = in_xml;
        self
    }

    /// The key/value encoding diverges from the array encoding unless it is a plain list
    #[must_use]
    pub fn requires_multiplexer(&self) -> bool {
        matches!(
            self.in_json,
            JsonGrouping::SingletonOrArray | JsonGrouping::ByKey
        )
    }

    #[must_use]
    pub fn is_by_key(&self) -> bool {
        self.in_json == JsonGrouping::ByKey
    }

    /// Wrapper element name in the array encoding, if any
    #[must_use]
    pub fn xml_wrapper(&self) -> Option<&str> {
        match self.in_xml {
            XmlGrouping::Grouped => Some(&self.name),
            XmlGrouping::Ungrouped => None,
        }
    }
}

impl Usage {
    fn with_target(kind: DeclarationKind, target: UsageTarget) -> Self {
        Self {
            kind,
            target,
            group_as: None,
            required: false,
            min_occurs: 0,
            max_occurs: MaxOccurs::Bounded(1),
            in_xml: FieldWrapping::default(),
            datatype: None,
            allowed_values: Vec::new(),
            description: None,
            remarks: None,
            position: Position::default(),
        }
    }

    /// A by-name usage awaiting resolution
    pub fn reference(kind: DeclarationKind, name: impl Into<String>) -> Self {
        Self::with_target(
            kind,
            UsageTarget::Reference {
                name: name.into(),
                resolved: None,
            },
        )
    }

    /// A usage of an inline declaration
    pub fn inline(kind: DeclarationKind, declaration: DeclarationId) -> Self {
        Self::with_target(kind, UsageTarget::Inline(declaration))
    }

    #[must_use]
    pub fn grouped(mut self, group_as: GroupAs) -> Self {
        self.group_as = Some(group_as);
        self
    }

    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Name of the referenced declaration, for reference usages
    pub fn reference_name(&self) -> Option<&str> {
        match &self.target {
            UsageTarget::Reference { name, .. } => Some(name),
            UsageTarget::Inline(_) => None,
        }
    }

    /// The declaration this usage stands for, once known
    pub fn declaration(&self) -> Option<DeclarationId> {
        match &self.target {
            UsageTarget::Reference { resolved, .. } => *resolved,
            UsageTarget::Inline(id) => Some(*id),
        }
    }

    /// Reference usage without a resolved declaration yet
    pub fn is_unresolved(&self) -> bool {
        matches!(self.target, UsageTarget::Reference { resolved: None, .. })
    }

    /// Record the linker's answer; returns false if this usage was already resolved or is inline
    pub fn resolve(&mut self, declaration: DeclarationId) -> bool {
        match &mut self.target {
            UsageTarget::Reference { resolved, .. } if resolved.is_none() => {
                *resolved = Some(declaration);
                true
            }
            _ => false,
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.group_as.is_some()
    }

    /// Grouped and in a key/value mode that cannot share the array-encoding shape
    pub fn requires_multiplexer(&self) -> bool {
        self.group_as
            .as_ref()
            .is_some_and(GroupAs::requires_multiplexer)
    }

    pub(crate) fn rebase(&mut self, offset: usize) {
        if let UsageTarget::Inline(id) = &mut self.target {
            *id = id.offset(offset);
        }
    }
}

impl ModelItem {
    /// Usages held by this item, choice members included
    pub fn usages(&self) -> &[Usage] {
        match self {
            ModelItem::Usage(u) => std::slice::from_ref(u),
            ModelItem::Choice(members) => members,
            ModelItem::Prose | ModelItem::Any => &[],
        }
    }

    pub(crate) fn usages_mut(&mut self) -> &mut [Usage] {
        match self {
            ModelItem::Usage(u) => std::slice::from_mut(u),
            ModelItem::Choice(members) => members,
            ModelItem::Prose | ModelItem::Any => &mut [],
        }
    }
}
