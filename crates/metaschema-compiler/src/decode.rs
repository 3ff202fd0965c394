//! Structural decode of one metaschema document.
//!
//! Produces a [`RawDocument`]: declarations in document order, usages still
//! holding names, inline declarations addressed by their local handle.
//! Nothing is resolved here.

use crate::xml::{self, EntityMap, XmlElement, XmlNode};
use crate::{Error, Result};
use metaschema_model::{
    AssemblyDefinition, Datatype, DeclarationId, DeclarationKind, Definition, DocumentHeader,
    Example, FieldDefinition, FieldWrapping, FlagDefinition, GroupAs, Import, JsonGrouping,
    MaxOccurs, Metadata, ModelItem, RawDocument, Scope, Usage, XmlGrouping,
};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, trace};

const ROOT_ELEMENT: &str = "METASCHEMA";

/// Read and decode the document at `path`
pub fn decode_file(path: &Path, entities: &EntityMap) -> Result<RawDocument> {
    trace!("Decoding {}", path.display());
    let source = std::fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
    decode_str(&source, path, entities)
}

/// Decode `source`; `path` is used for identity fallback and error context
pub fn decode_str(source: &str, path: &Path, entities: &EntityMap) -> Result<RawDocument> {
    let root = xml::parse(source, entities).map_err(|err| {
        let element = err.element.unwrap_or_else(|| ROOT_ELEMENT.to_string());
        Error::format(path, element, Some(err.position.line), err.message)
    })?;

    if root.name != ROOT_ELEMENT {
        return Err(Error::format(
            path,
            &root.name,
            Some(root.position.line),
            format!("root element must be <{ROOT_ELEMENT}>"),
        ));
    }

    let mut decoder = Decoder {
        path,
        raw: RawDocument::default(),
    };
    decoder.header(&root)?;
    decoder.body(&root)?;

    debug!(
        "Decoded '{}': {} declarations, {} imports",
        decoder.raw.header.name,
        decoder.raw.declarations.len(),
        decoder.raw.imports.len()
    );
    Ok(decoder.raw)
}

struct Decoder<'a> {
    path: &'a Path,
    raw: RawDocument,
}

impl Decoder<'_> {
    fn header(&mut self, root: &XmlElement) -> Result<()> {
        let name = non_empty_text(root, "short-name")
            .or_else(|| root.attr("root").map(str::to_string))
            .or_else(|| {
                self.path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "schema".to_string());

        self.raw.header = DocumentHeader {
            name,
            source: self.path.to_path_buf(),
            top: root.attr("top").map(str::to_string),
            root: root.attr("root").map(str::to_string),
            schema_name: non_empty_text(root, "schema-name"),
            schema_version: non_empty_text(root, "schema-version"),
            namespace: non_empty_text(root, "namespace"),
            remarks: root.child("remarks").and_then(render_prose),
            is_abstract: self.yes_no(root, "abstract")?,
        };
        Ok(())
    }

    fn body(&mut self, root: &XmlElement) -> Result<()> {
        for el in root.elements() {
            match el.name.as_str() {
                "import" => {
                    let href = self.required(el, "href")?;
                    self.raw.imports.push(Import {
                        href: href.to_string(),
                        position: el.position,
                    });
                }
                "define-assembly" => {
                    self.define_assembly(el, Scope::Global)?;
                }
                "define-field" => {
                    self.define_field(el, Scope::Global)?;
                }
                "define-flag" => {
                    self.define_flag(el, Scope::Global)?;
                }
                "schema-name" | "schema-version" | "short-name" | "namespace" | "remarks" => {}
                other => trace!("Skipping <{}> in {}", other, self.path.display()),
            }
        }
        Ok(())
    }

    fn define_assembly(&mut self, el: &XmlElement, scope: Scope) -> Result<DeclarationId> {
        let name = self.required(el, "name")?;
        let flags = self.flag_usages(el)?;
        let model = match el.child("model") {
            Some(model) => self.model(model)?,
            None => Vec::new(),
        };

        let body = AssemblyDefinition {
            flags,
            model,
            json_key: json_key(el),
            root_name: non_empty_text(el, "root-name"),
            address: el.attr("address").map(str::to_string),
        };
        let definition = Definition::assembly(name, body).with_metadata(self.metadata(el));
        Ok(self.raw.push(scope, definition))
    }

    fn define_field(&mut self, el: &XmlElement, scope: Scope) -> Result<DeclarationId> {
        let name = self.required(el, "name")?;
        let flags = self.flag_usages(el)?;
        let value_key = el.child("json-value-key");

        let body = FieldDefinition {
            flags,
            datatype: self.datatype(el)?.unwrap_or_default(),
            json_key: json_key(el),
            json_value_key: value_key.map(XmlElement::text).filter(|key| !key.is_empty()),
            json_value_key_flag: value_key
                .and_then(|key| key.attr("flag-name"))
                .map(str::to_string),
        };
        let definition = Definition::field(name, body).with_metadata(self.metadata(el));
        Ok(self.raw.push(scope, definition))
    }

    fn define_flag(&mut self, el: &XmlElement, scope: Scope) -> Result<DeclarationId> {
        let name = self.required(el, "name")?;
        let body = FlagDefinition {
            datatype: self.datatype(el)?.unwrap_or_default(),
            allowed_values: allowed_values(el),
        };
        let definition = Definition::flag(name, body).with_metadata(self.metadata(el));
        Ok(self.raw.push(scope, definition))
    }

    /// Flag usages of an assembly or field, in document order
    fn flag_usages(&mut self, parent: &XmlElement) -> Result<Vec<Usage>> {
        let mut flags = Vec::new();
        for el in parent.elements() {
            match el.name.as_str() {
                "flag" => flags.push(self.flag_usage(el)?),
                "define-flag" => {
                    let id = self.define_flag(el, Scope::Inline)?;
                    flags.push(self.occurrence(Usage::inline(DeclarationKind::Flag, id), el)?);
                }
                _ => {}
            }
        }
        Ok(flags)
    }

    fn flag_usage(&mut self, el: &XmlElement) -> Result<Usage> {
        if let Some(name) = el.attr("ref") {
            let mut usage = self.occurrence(Usage::reference(DeclarationKind::Flag, name), el)?;
            usage.datatype = self.datatype(el)?;
            usage.allowed_values = el
                .children_named("value")
                .map(XmlElement::text)
                .chain(allowed_values(el))
                .collect();
            return Ok(usage);
        }

        // Legacy form: `<flag name=.. as-type=..>` declares the flag in place
        let Some(name) = el.attr("name") else {
            return Err(self.error(el, "flag usage needs a 'ref' or 'name' attribute"));
        };
        let body = FlagDefinition {
            datatype: self.datatype(el)?.unwrap_or_default(),
            allowed_values: el
                .children_named("value")
                .map(XmlElement::text)
                .chain(allowed_values(el))
                .collect(),
        };
        let definition = Definition::flag(name, body).with_metadata(self.metadata(el));
        let id = self.raw.push(Scope::Inline, definition);
        self.occurrence(Usage::inline(DeclarationKind::Flag, id), el)
    }

    fn model(&mut self, model: &XmlElement) -> Result<Vec<ModelItem>> {
        let mut items = Vec::new();
        for el in model.elements() {
            let item = match el.name.as_str() {
                name if is_model_usage(name) => ModelItem::Usage(self.model_usage(el)?),
                "choice" => {
                    let mut members = Vec::new();
                    for member in el.elements() {
                        if is_model_usage(&member.name) {
                            members.push(self.model_usage(member)?);
                        } else {
                            trace!("Skipping <{}> in choice", member.name);
                        }
                    }
                    ModelItem::Choice(members)
                }
                "prose" => ModelItem::Prose,
                "any" => ModelItem::Any,
                other => {
                    trace!("Skipping <{}> in model of {}", other, self.path.display());
                    continue;
                }
            };
            items.push(item);
        }
        Ok(items)
    }

    fn model_usage(&mut self, el: &XmlElement) -> Result<Usage> {
        let usage = match el.name.as_str() {
            "assembly" => Usage::reference(DeclarationKind::Assembly, self.required(el, "ref")?),
            "field" => Usage::reference(DeclarationKind::Field, self.required(el, "ref")?),
            "define-assembly" => Usage::inline(
                DeclarationKind::Assembly,
                self.define_assembly(el, Scope::Inline)?,
            ),
            _ => Usage::inline(DeclarationKind::Field, self.define_field(el, Scope::Inline)?),
        };

        let mut usage = self.occurrence(usage, el)?;
        if let Some(group) = el.child("group-as") {
            usage.group_as = Some(self.group_as(group)?);
        }
        if usage.kind == DeclarationKind::Field {
            if let Some(wrapping) = self.parse_attr::<FieldWrapping>(el, "in-xml")? {
                usage.in_xml = wrapping;
            }
        }
        Ok(usage)
    }

    /// Occurrence constraints and local documentation shared by all usages
    fn occurrence(&self, mut usage: Usage, el: &XmlElement) -> Result<Usage> {
        let min_occurs = self.parse_attr::<u32>(el, "min-occurs")?.unwrap_or(0);
        usage.required = self.yes_no(el, "required")? || min_occurs >= 1;
        usage.min_occurs = min_occurs;
        if let Some(max_occurs) = self.parse_attr::<MaxOccurs>(el, "max-occurs")? {
            usage.max_occurs = max_occurs;
        }
        usage.description = el.child("description").and_then(render_prose);
        usage.remarks = el.child("remarks").and_then(render_prose);
        Ok(usage.at(el.position))
    }

    fn group_as(&self, el: &XmlElement) -> Result<GroupAs> {
        let name = self.required(el, "name")?;
        let in_json = self
            .parse_attr::<JsonGrouping>(el, "in-json")?
            .unwrap_or_default();
        let in_xml = self
            .parse_attr::<XmlGrouping>(el, "in-xml")?
            .unwrap_or_default();
        Ok(GroupAs::new(name).with_in_json(in_json).with_in_xml(in_xml))
    }

    fn metadata(&self, el: &XmlElement) -> Metadata {
        Metadata {
            formal_name: non_empty_text(el, "formal-name"),
            description: el.child("description").and_then(render_prose),
            remarks: el.child("remarks").and_then(render_prose),
            examples: el.children_named("example").map(example).collect(),
            position: el.position,
        }
    }

    fn datatype(&self, el: &XmlElement) -> Result<Option<Datatype>> {
        self.parse_attr::<Datatype>(el, "as-type")
    }

    fn yes_no(&self, el: &XmlElement, attr: &str) -> Result<bool> {
        match el.attr(attr) {
            None | Some("no") => Ok(false),
            Some("yes") => Ok(true),
            Some(other) => Err(self.error(el, format!("{attr}=\"{other}\": expected 'yes' or 'no'"))),
        }
    }

    fn parse_attr<T>(&self, el: &XmlElement, attr: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        el.attr(attr)
            .map(|value| {
                value
                    .trim()
                    .parse::<T>()
                    .map_err(|err| self.error(el, format!("{attr}=\"{value}\": {err}")))
            })
            .transpose()
    }

    fn required<'e>(&self, el: &'e XmlElement, attr: &str) -> Result<&'e str> {
        el.attr(attr)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| self.error(el, format!("missing '{attr}' attribute")))
    }

    fn error(&self, el: &XmlElement, message: impl Into<String>) -> Error {
        Error::format(self.path, &el.name, Some(el.position.line), message)
    }
}

fn is_model_usage(name: &str) -> bool {
    matches!(name, "assembly" | "field" | "define-assembly" | "define-field")
}

fn non_empty_text(el: &XmlElement, child: &str) -> Option<String> {
    el.child(child)
        .map(XmlElement::text)
        .filter(|text| !text.is_empty())
}

fn json_key(el: &XmlElement) -> Option<String> {
    el.child("json-key")
        .and_then(|key| key.attr("flag-name"))
        .map(str::to_string)
}

fn allowed_values(el: &XmlElement) -> Vec<String> {
    let constrained = el
        .children_named("constraint")
        .flat_map(|constraint| constraint.children_named("allowed-values"));
    el.children_named("allowed-values")
        .chain(constrained)
        .flat_map(|values| values.children_named("enum"))
        .map(|value| {
            value
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| value.text())
        })
        .collect()
}

fn example(el: &XmlElement) -> Example {
    let mut content = String::new();
    for node in &el.children {
        match node {
            XmlNode::Text(text) => content.push_str(text),
            XmlNode::Element(child) if child.name == "description" || child.name == "remarks" => {}
            XmlNode::Element(child) => {
                content.push(' ');
                content.push_str(&child.text());
            }
        }
    }

    Example {
        href: el.attr("href").map(str::to_string),
        path: el.attr("path").map(str::to_string),
        description: el.child("description").and_then(render_prose),
        remarks: el.child("remarks").and_then(render_prose),
        content: xml::normalize_space(&content),
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "li" | "pre" | "blockquote" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    )
}

/// Paragraph text of a markup element; anchors render as `text (href)`
fn render_prose(el: &XmlElement) -> Option<String> {
    let mut paragraphs = Vec::new();
    let mut inline = String::new();
    collect_prose(el, &mut paragraphs, &mut inline);
    flush(&mut paragraphs, &mut inline);
    (!paragraphs.is_empty()).then(|| paragraphs.join("\n\n"))
}

fn collect_prose(el: &XmlElement, paragraphs: &mut Vec<String>, inline: &mut String) {
    for node in &el.children {
        match node {
            XmlNode::Text(text) => inline.push_str(text),
            XmlNode::Element(child) if is_block(&child.name) => {
                flush(paragraphs, inline);
                let mut inner = String::new();
                collect_prose(child, paragraphs, &mut inner);
                flush(paragraphs, &mut inner);
            }
            XmlNode::Element(child) if child.name == "a" => {
                let text = child.text();
                match child.attr("href") {
                    Some(href) => inline.push_str(&format!("{text} ({href})")),
                    None => inline.push_str(&text),
                }
            }
            XmlNode::Element(child) => collect_prose(child, paragraphs, inline),
        }
    }
}

fn flush(paragraphs: &mut Vec<String>, inline: &mut String) {
    let text = xml::normalize_space(inline);
    if !text.is_empty() {
        paragraphs.push(text);
    }
    inline.clear();
}
