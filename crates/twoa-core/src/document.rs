//! # Document Model
//!
//! A small, owned XML element tree plus the text boundary around it.
//!
//! The codec never touches text directly: the encoder produces a [`Document`]
//! and the decoder consumes one. [`Document::parse`] and [`Document::render`]
//! are the only places where bytes meet the tree, and both are backed by
//! `quick-xml`.
//!
//! Names are namespace-resolved on parse. Elements of the TwoA format live in
//! the primary namespace and the two identifier attributes live in the schema
//! namespace; everything else is kept as-is.

use crate::CodecError;
use crate::primitives::{SCHEMA_NAMESPACE, SCHEMA_PREFIX, TWOA_NAMESPACE};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Writer};
use std::fmt;

// =============================================================================
// NAMES
// =============================================================================

/// The namespace an element or attribute name is bound to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Namespace {
    /// Unqualified name.
    None,
    /// The TwoA primary namespace.
    TwoA,
    /// The XML Schema namespace (`xsd` prefix).
    Schema,
    /// Any other namespace URI.
    Other(String),
}

impl Namespace {
    /// Classify a namespace URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Self {
        match uri {
            TWOA_NAMESPACE => Self::TwoA,
            SCHEMA_NAMESPACE => Self::Schema,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub namespace: Namespace,
    pub local: String,
}

impl QName {
    /// A name in the TwoA namespace.
    #[must_use]
    pub fn twoa(local: impl Into<String>) -> Self {
        Self {
            namespace: Namespace::TwoA,
            local: local.into(),
        }
    }

    /// A name in the schema namespace.
    #[must_use]
    pub fn schema(local: impl Into<String>) -> Self {
        Self {
            namespace: Namespace::Schema,
            local: local.into(),
        }
    }

    /// An unqualified name.
    #[must_use]
    pub fn plain(local: impl Into<String>) -> Self {
        Self {
            namespace: Namespace::None,
            local: local.into(),
        }
    }

    /// Name as written in a rendered document.
    ///
    /// TwoA is the default namespace of rendered documents, so its names stay
    /// unprefixed. Names in foreign namespaces are written unprefixed as well.
    fn qualified(&self) -> String {
        match self.namespace {
            Namespace::Schema => format!("{}:{}", SCHEMA_PREFIX, self.local),
            _ => self.local.clone(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

// =============================================================================
// ELEMENT TREE
// =============================================================================

/// An attribute: qualified name plus unescaped value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// An element with attributes, child elements, and optional text content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
    pub text: Option<String>,
}

impl Element {
    /// Create an empty element.
    #[must_use]
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Create an empty element in the TwoA namespace.
    #[must_use]
    pub fn twoa(local: &str) -> Self {
        Self::new(QName::twoa(local))
    }

    /// Builder: add an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name,
            value: value.into(),
        });
        self
    }

    /// Builder: set the text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: append a child element.
    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child element.
    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// True when this element is `local` in the TwoA namespace.
    #[must_use]
    pub fn is(&self, local: &str) -> bool {
        self.name.namespace == Namespace::TwoA && self.name.local == local
    }

    /// Value of the attribute `local` bound to `namespace`.
    #[must_use]
    pub fn attribute(&self, namespace: &Namespace, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| &attr.name.namespace == namespace && attr.name.local == local)
            .map(|attr| attr.value.as_str())
    }

    /// Children named `local` in the TwoA namespace, in document order.
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.is(local))
    }

    /// First child named `local` in the TwoA namespace.
    #[must_use]
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.is(local))
    }

    /// Text content, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// A complete document: exactly one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    /// Wrap a root element.
    #[must_use]
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse XML text into a document.
    ///
    /// Whitespace around text content is trimmed. Comments, processing
    /// instructions, and the declaration are dropped.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Xml` if the text is not well-formed or uses an
    /// undeclared prefix, and `CodecError::InvalidInput` if it has no root
    /// element.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut reader = NsReader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) => {
                    let element = element_from_start(&reader, &start)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&reader, &start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| CodecError::Xml("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let value = text.unescape().map_err(xml_error)?;
                    append_text(&mut stack, &value);
                }
                Event::CData(data) => {
                    let value = std::str::from_utf8(&data).map_err(xml_error)?;
                    append_text(&mut stack, value);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(CodecError::Xml(format!(
                "unclosed element <{}>",
                open.name
            )));
        }

        root.map(Self::new)
            .ok_or_else(|| CodecError::InvalidInput("document has no root element".to_string()))
    }

    /// Render the document as indented XML text with a standalone declaration.
    ///
    /// The root element declares the TwoA namespace as default and binds the
    /// `xsd` prefix to the schema namespace.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Xml` if the writer fails.
    pub fn render(&self, indent: usize) -> Result<String, CodecError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', indent);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(xml_error)?;
        write_element(&mut writer, &self.root, true)?;

        String::from_utf8(writer.into_inner()).map_err(xml_error)
    }
}

// =============================================================================
// PARSE HELPERS
// =============================================================================

fn xml_error(e: impl fmt::Display) -> CodecError {
    CodecError::Xml(e.to_string())
}

fn namespace_of(resolved: ResolveResult<'_>) -> Result<Namespace, CodecError> {
    match resolved {
        ResolveResult::Bound(ns) => {
            let uri = std::str::from_utf8(ns.as_ref()).map_err(xml_error)?;
            Ok(Namespace::from_uri(uri))
        }
        ResolveResult::Unbound => Ok(Namespace::None),
        ResolveResult::Unknown(prefix) => Err(CodecError::Xml(format!(
            "undeclared namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn element_from_start(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> Result<Element, CodecError> {
    let (resolved, local) = reader.resolve_element(start.name());
    let namespace = namespace_of(resolved)?;
    let local = std::str::from_utf8(local.as_ref()).map_err(xml_error)?;
    let mut element = Element::new(QName {
        namespace,
        local: local.to_string(),
    });

    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let namespace = namespace_of(resolved)?;
        let local = std::str::from_utf8(local.as_ref()).map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?;
        element.attributes.push(Attribute {
            name: QName {
                namespace,
                local: local.to_string(),
            },
            value: value.into_owned(),
        });
    }

    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), CodecError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(CodecError::Xml("multiple root elements".to_string())),
    }
}

fn append_text(stack: &mut [Element], value: &str) {
    // Text outside the root is whitespace after trimming; ignore it.
    if let Some(current) = stack.last_mut() {
        current.text.get_or_insert_with(String::new).push_str(value);
    }
}

// =============================================================================
// RENDER HELPERS
// =============================================================================

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &Element,
    is_root: bool,
) -> Result<(), CodecError> {
    let name = element.name.qualified();
    let mut start = BytesStart::new(name.as_str());
    if is_root {
        start.push_attribute(("xmlns", TWOA_NAMESPACE));
        start.push_attribute((format!("xmlns:{}", SCHEMA_PREFIX).as_str(), SCHEMA_NAMESPACE));
    }
    for attr in &element.attributes {
        start.push_attribute((attr.name.qualified().as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() && element.text.is_none() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }

    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)?;
    }
    for child in &element.children {
        write_element(writer, child, false)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(xml_error)
}

// =============================================================================
// TESTS
// =============================================================================
