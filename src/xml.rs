//! Namespace-aware element trees for configuration sources.
//!
//! Beans configurations are small documents, so they are read into a tree of
//! [`XmlElement`]s once and then walked by the bean reader and the XML aspect
//! extractor. Every element records the 1-based lines of its start and end tags.

use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use text_size::TextSize;

use crate::base::{LineIndex, LineRange};
use crate::error::ExtractError;

pub const BEANS_NAMESPACE: &str = "http://www.springframework.org/schema/beans";
pub const AOP_NAMESPACE: &str = "http://www.springframework.org/schema/aop";
pub const TX_NAMESPACE: &str = "http://www.springframework.org/schema/tx";

/// One element with its resolved namespace and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Namespace URI, `None` when the element is not in any namespace.
    pub namespace: Option<SmolStr>,
    pub local_name: SmolStr,
    pub attributes: IndexMap<SmolStr, String>,
    pub children: Vec<XmlElement>,
    /// Concatenated, trimmed character data directly inside this element.
    pub text: String,
    pub lines: LineRange,
}

impl XmlElement {
    /// Whether this element is `local_name` in `namespace`.
    ///
    /// Elements without a namespace match the beans namespace, so documents
    /// that omit the default namespace declaration still read.
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name
            && match &self.namespace {
                Some(ns) => ns == namespace,
                None => namespace == BEANS_NAMESPACE,
            }
    }

    /// Attribute value, treating empty values as absent.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Direct children that are `local_name` in `namespace`.
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children
            .iter()
            .filter(move |c| c.is(namespace, local_name))
    }

    /// All elements below this one, depth first, in document order.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        let mut stack: Vec<&XmlElement> = self.children.iter().rev().collect();
        while let Some(element) = stack.pop() {
            out.push(element);
            stack.extend(element.children.iter().rev());
        }
        out
    }

    pub fn start_line(&self) -> u32 {
        self.lines.start
    }
}

/// Read `source` into its root element.
pub fn parse_document(source: &str) -> Result<XmlElement, ExtractError> {
    let index = LineIndex::new(source);
    let line_at = |offset: usize| index.line_of(TextSize::from(offset as u32));

    let mut reader = Reader::from_str(source);
    let mut scopes: Vec<FxHashMap<SmolStr, SmolStr>> = vec![FxHashMap::default()];
    let mut open: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let offset = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let element = start_element(e, &mut scopes, line_at(offset))?;
                open.push(element);
            }
            Ok(Event::Empty(ref e)) => {
                let element = start_element(e, &mut scopes, line_at(offset))?;
                scopes.pop();
                attach(element, &mut open, &mut root);
            }
            Ok(Event::End(_)) => {
                scopes.pop();
                if let Some(mut element) = open.pop() {
                    element.lines = LineRange::new(element.lines.start, line_at(offset));
                    element.text = element.text.trim().to_string();
                    attach(element, &mut open, &mut root);
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(current) = open.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| ExtractError::xml(offset, format!("Text error: {err}")))?;
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::xml(
                    reader.error_position() as usize,
                    e.to_string(),
                ));
            }
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(ExtractError::xml(
            source.len(),
            format!("unclosed element <{}>", unclosed.local_name),
        ));
    }
    root.ok_or_else(|| ExtractError::xml(0, "document has no root element"))
}

fn attach(element: XmlElement, open: &mut [XmlElement], root: &mut Option<XmlElement>) {
    match open.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// Build an element from a start tag and push its namespace scope.
fn start_element(
    e: &BytesStart<'_>,
    scopes: &mut Vec<FxHashMap<SmolStr, SmolStr>>,
    line: u32,
) -> Result<XmlElement, ExtractError> {
    let mut scope = FxHashMap::default();
    let mut attributes = IndexMap::new();

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| ExtractError::xml(0, format!("Attribute error: {err}")))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| ExtractError::xml(0, format!("Attribute key error: {err}")))?;
        let value = attr
            .unescape_value()
            .map_err(|err| ExtractError::xml(0, format!("Attribute value error: {err}")))?
            .to_string();

        if key == "xmlns" {
            scope.insert(SmolStr::default(), SmolStr::new(&value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.insert(SmolStr::new(prefix), SmolStr::new(&value));
        } else {
            attributes.insert(SmolStr::new(key), value);
        }
    }
    scopes.push(scope);

    let name_bytes = e.name();
    let tag_name = std::str::from_utf8(name_bytes.as_ref())
        .map_err(|err| ExtractError::xml(0, format!("Invalid tag name: {err}")))?;
    let (prefix, local_name) = match tag_name.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", tag_name),
    };
    let namespace = scopes
        .iter()
        .rev()
        .find_map(|s| s.get(prefix))
        .filter(|ns| !ns.is_empty())
        .cloned();

    Ok(XmlElement {
        namespace,
        local_name: SmolStr::new(local_name),
        attributes,
        children: Vec::new(),
        text: String::new(),
        lines: LineRange::line(line),
    })
}
