//! Minimal element tree built on quick-xml.
//!
//! The decoder works on a fully materialised tree so that every element keeps
//! its source position and no reader state leaks between documents.

use metaschema_model::Position;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use tracing::trace;

/// Named entity replacements; the five predefined XML entities need no entry
pub type EntityMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with its attributes, children and start position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name, namespace prefix stripped
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub position: Position,
}

/// Malformed input, with the position quick-xml stopped at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlError {
    pub message: String,
    pub position: Position,
    /// Innermost element open at the fault, if any
    pub element: Option<String>,
}

impl XmlError {
    fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            position,
            element: None,
        }
    }

    fn within(mut self, element: Option<&XmlElement>) -> Self {
        if let Some(element) = element {
            self.element = Some(element.name.clone());
        }
        self
    }
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements, in document order
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element named `name`
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |el| el.name == name)
    }

    /// All descendant text with whitespace runs collapsed to single spaces
    pub fn text(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        normalize_space(&raw)
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(el) => el.collect_text(out),
            }
        }
    }
}

pub fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte offset to line/column lookup
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    fn position(&self, offset: usize) -> Position {
        let line = self.starts.partition_point(|&start| start <= offset);
        let start = self.starts.get(line.saturating_sub(1)).copied().unwrap_or(0);
        Position::new(line, offset.saturating_sub(start) + 1)
    }
}

/// Parse `source` into its root element.
///
/// Entity references resolve against `entities` plus any `<!ENTITY>`
/// declarations in the document type declaration.
pub fn parse(source: &str, entities: &EntityMap) -> Result<XmlElement, XmlError> {
    let lines = LineIndex::new(source);
    let mut reader = Reader::from_str(source);
    let mut entities = entities.clone();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let position = lines.position(reader.buffer_position() as usize);
        let event = reader.read_event().map_err(|err| {
            XmlError::new(
                err.to_string(),
                lines.position(reader.error_position() as usize),
            )
            .within(stack.last())
        })?;

        match event {
            Event::Start(start) => {
                stack.push(open_element(&start, position, &entities)?);
            }
            Event::Empty(start) => {
                let element = open_element(&start, position, &entities)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlError::new("unexpected closing tag", position))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    let text = text
                        .unescape_with(|name| resolve_entity(&entities, name))
                        .map_err(|err| XmlError::new(err.to_string(), position).within(Some(&*parent)))?;
                    parent.children.push(XmlNode::Text(text.into_owned()));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    parent.children.push(XmlNode::Text(text));
                }
            }
            Event::DocType(doctype) => {
                let declared = declared_entities(&String::from_utf8_lossy(&doctype));
                trace!("Document type declares {} entities", declared.len());
                for (name, value) in declared {
                    entities.entry(name).or_insert(value);
                }
            }
            Event::Eof => break,
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(XmlError::new(
            format!("element <{}> is never closed", open.name),
            open.position,
        )
        .within(Some(open)));
    }
    root.ok_or_else(|| XmlError::new("document has no root element", Position::new(1, 1)))
}

fn open_element(
    start: &BytesStart<'_>,
    position: Position,
    entities: &EntityMap,
) -> Result<XmlElement, XmlError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.local_name().as_ref()));
    element.position = position;

    for attr in start.attributes() {
        let attr = attr.map_err(|err| XmlError::new(err.to_string(), position).within(Some(&element)))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value_with(|name| resolve_entity(entities, name))
            .map_err(|err| XmlError::new(err.to_string(), position).within(Some(&element)))?;
        element.attributes.push((
            String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(element)
}

/// Configured and declared entities first, then the five predefined ones
fn resolve_entity<'e>(entities: &'e EntityMap, name: &str) -> Option<&'e str> {
    entities
        .get(name)
        .map(String::as_str)
        .or_else(|| quick_xml::escape::resolve_predefined_entity(name))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(XmlError::new(
            format!("second root element <{}>", element.name),
            element.position,
        ));
    }
    *root = Some(element);
    Ok(())
}

/// General entities from an internal DTD subset; parameter entities are ignored
fn declared_entities(doctype: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = doctype;

    while let Some(at) = rest.find("<!ENTITY") {
        rest = rest[at + "<!ENTITY".len()..].trim_start();
        if rest.starts_with('%') {
            continue;
        }
        let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let body = &rest[1..];
        let Some(close) = body.find(quote) else {
            break;
        };
        if !name.is_empty() {
            out.push((name.to_string(), body[..close].to_string()));
        }
        rest = &body[close + 1..];
    }
    out
}
