//! Document tree nodes.
//!
//! Every node keeps the markup it was parsed from, so a node that is never
//! touched serializes byte for byte as it was read. Mutating an element's
//! attributes or turning a self-closing element into a container drops the
//! verbatim start tag and regenerates it.

use std::borrow::Cow;
use std::fmt::Write as _;

use quick_xml::escape::{partial_escape, unescape};
use smallvec::SmallVec;

use crate::document::Layout;

/// An attribute of an element, stored in escaped form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    raw_value: String,
}

impl Attribute {
    /// Creates an attribute from an unescaped value.
    ///
    /// Apostrophes are kept literal, as MSBuild conditions are full of them.
    #[must_use]
    pub fn new(name: impl Into<String>, value: &str) -> Self {
        Self {
            name: name.into(),
            raw_value: partial_escape(value).replace('"', "&quot;"),
        }
    }

    pub(crate) fn from_raw(name: String, raw_value: String) -> Self {
        Self { name, raw_value }
    }

    /// Returns the attribute name as written, including any prefix.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the unescaped value.
    #[must_use]
    pub fn value(&self) -> Cow<'_, str> {
        unescape_lossy(&self.raw_value)
    }

    /// Returns the value exactly as written in the document.
    #[inline]
    #[must_use]
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Node {
    /// An element with its attributes and children.
    Element(Element),
    /// Character data, stored escaped.
    Text(String),
    /// A comment, stored with its delimiters.
    Comment(String),
    /// A CDATA section, stored with its delimiters.
    CData(String),
    /// The XML declaration, stored verbatim.
    Declaration(String),
    /// A processing instruction, stored verbatim.
    Instruction(String),
    /// A document type declaration, stored verbatim.
    DocType(String),
}

impl Node {
    /// Creates a text node from an unescaped value.
    #[must_use]
    pub fn text(value: &str) -> Self {
        Self::Text(partial_escape(value).into_owned())
    }

    /// Returns the element if this node is one.
    #[inline]
    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Returns the element mutably if this node is one.
    #[inline]
    #[must_use]
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Returns `true` for a text node made only of whitespace.
    #[must_use]
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Self::Text(text) if text.chars().all(char::is_whitespace))
    }

    pub(crate) fn write_to(&self, out: &mut String) {
        match self {
            Self::Element(element) => element.write_to(out),
            Self::Text(raw)
            | Self::Comment(raw)
            | Self::CData(raw)
            | Self::Declaration(raw)
            | Self::Instruction(raw)
            | Self::DocType(raw) => out.push_str(raw),
        }
    }
}

/// An element of the document tree.
///
/// # Examples
///
/// ```
/// use nf_xml::Element;
///
/// let element = Element::new("bindingRedirect")
///     .with_attr("oldVersion", "0.0.0.0-65535.65535.65535.65535")
///     .with_attr("newVersion", "6.0.0.0");
/// assert_eq!(
///     element.to_xml(),
///     r#"<bindingRedirect oldVersion="0.0.0.0-65535.65535.65535.65535" newVersion="6.0.0.0" />"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: SmallVec<[Attribute; 4]>,
    children: Vec<Node>,
    self_closing: bool,
    raw_start: Option<String>,
    raw_end: Option<String>,
}

impl Element {
    /// Creates an empty, self-closing element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: SmallVec::new(),
            children: Vec::new(),
            self_closing: true,
            raw_start: None,
            raw_end: None,
        }
    }

    pub(crate) fn parsed(
        name: String,
        attributes: SmallVec<[Attribute; 4]>,
        self_closing: bool,
        raw_start: String,
    ) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
            self_closing,
            raw_start: Some(raw_start),
            raw_end: None,
        }
    }

    pub(crate) fn close(&mut self, raw_end: String) {
        self.raw_end = Some(raw_end);
    }

    pub(crate) fn push_parsed(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Adds an attribute, returning the element for chaining.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Sets the text content, returning the element for chaining.
    #[must_use]
    pub fn with_text(mut self, value: &str) -> Self {
        self.set_text(value);
        self
    }

    /// Returns the element name as written, including any prefix.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the element name without its namespace prefix.
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// Returns `true` if the local name matches.
    #[inline]
    #[must_use]
    pub fn is(&self, local_name: &str) -> bool {
        self.local_name() == local_name
    }

    /// Returns the unescaped value of an attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<Cow<'_, str>> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(Attribute::value)
    }

    /// Iterates over the attributes in document order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Sets an attribute, appending it when absent.
    ///
    /// Returns `true` if the document changed.
    pub fn set_attr(&mut self, name: &str, value: &str) -> bool {
        let attribute = Attribute::new(name, value);
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) if attr.value() == value => return false,
            Some(attr) => *attr = attribute,
            None => self.attributes.push(attribute),
        }
        self.raw_start = None;
        true
    }

    /// Removes an attribute.
    ///
    /// Returns `true` if the attribute existed.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|attr| attr.name != name);
        if self.attributes.len() == before {
            return false;
        }
        self.raw_start = None;
        true
    }

    /// Returns the child nodes in document order.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Iterates over the child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Iterates mutably over the child elements.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// Iterates over the child elements with the given local name.
    pub fn elements_named<'a>(&'a self, local_name: &str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |element| element.is(local_name))
    }

    /// Iterates mutably over the child elements with the given local name.
    pub fn elements_named_mut<'a>(
        &'a mut self,
        local_name: &str,
    ) -> impl Iterator<Item = &'a mut Element> {
        self.elements_mut().filter(move |element| element.is(local_name))
    }

    /// Returns the first child element with the given local name.
    #[must_use]
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.elements_named(local_name).next()
    }

    /// Returns the first child element with the given local name, mutably.
    #[must_use]
    pub fn child_mut(&mut self, local_name: &str) -> Option<&mut Element> {
        self.elements_named_mut(local_name).next()
    }

    /// Returns `true` if the element has at least one child element.
    #[must_use]
    pub fn has_elements(&self) -> bool {
        self.elements().next().is_some()
    }

    /// Returns the unescaped text content of the direct children.
    ///
    /// # Examples
    ///
    /// ```
    /// use nf_xml::XmlDocument;
    ///
    /// let doc = XmlDocument::parse("<HintPath>a &amp; b</HintPath>")?;
    /// assert_eq!(doc.root().text(), "a & b");
    /// # Ok::<(), nf_xml::XmlError>(())
    /// ```
    #[must_use]
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                Node::Text(raw) => text.push_str(&unescape_lossy(raw)),
                Node::CData(raw) => text.push_str(
                    raw.strip_prefix("<![CDATA[")
                        .and_then(|inner| inner.strip_suffix("]]>"))
                        .unwrap_or(raw),
                ),
                _ => {}
            }
        }
        text
    }

    /// Replaces the children with a single text node.
    ///
    /// Returns `true` if the document changed.
    pub fn set_text(&mut self, value: &str) -> bool {
        let unchanged = !self.has_elements()
            && self.text() == value
            && (!value.is_empty() || self.children.is_empty());
        if unchanged {
            return false;
        }
        self.children.clear();
        if !value.is_empty() {
            self.open();
            self.children.push(Node::text(value));
        }
        true
    }

    /// Appends a child element on its own line, indented like its siblings.
    ///
    /// `depth` is the nesting depth of `self` (the root element is at depth 0).
    /// Returns the index of the new element among the children.
    pub fn append_element(&mut self, child: Element, depth: usize, layout: &Layout) -> usize {
        let indent = self.child_indent(depth, layout);
        let closing = match self.children.last() {
            Some(node) if node.is_whitespace() => match self.children.pop() {
                Some(Node::Text(text)) => text,
                _ => layout.indent(depth),
            },
            _ => layout.indent(depth),
        };

        self.open();
        self.children.push(Node::Text(indent));
        let index = self.children.len();
        self.children.push(Node::Element(child));
        self.children.push(Node::Text(closing));
        index
    }

    /// Inserts an element directly after the child at `index`, on its own line.
    ///
    /// Returns the index of the new element among the children.
    pub fn insert_element_after(&mut self, index: usize, child: Element) -> usize {
        let indent = index
            .checked_sub(1)
            .and_then(|prev| self.children.get(prev))
            .and_then(|node| match node {
                Node::Text(text) if node.is_whitespace() => Some(text.clone()),
                _ => None,
            });

        let mut at = (index + 1).min(self.children.len());
        self.open();
        if let Some(indent) = indent {
            self.children.insert(at, Node::Text(indent));
            at += 1;
        }
        self.children.insert(at, Node::Element(child));
        at
    }

    /// Returns the first child element with the given local name, creating it
    /// at the end of the children when missing.
    pub fn ensure_child(
        &mut self,
        local_name: &str,
        depth: usize,
        layout: &Layout,
    ) -> Option<&mut Element> {
        let index = match self.position(|element| element.is(local_name)) {
            Some(index) => index,
            None => self.append_element(Element::new(local_name), depth, layout),
        };
        self.element_mut(index)
    }

    /// Returns the child index of the first element matching the predicate.
    pub fn position(&self, mut predicate: impl FnMut(&Element) -> bool) -> Option<usize> {
        self.children
            .iter()
            .position(|node| node.as_element().is_some_and(&mut predicate))
    }

    /// Returns the child element at a child index from [`Element::position`].
    pub fn element_mut(&mut self, index: usize) -> Option<&mut Element> {
        self.children.get_mut(index).and_then(Node::as_element_mut)
    }

    /// Keeps only the child elements for which the predicate returns `true`.
    ///
    /// The whitespace preceding each removed element goes with it. Returns the
    /// number of elements removed.
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&Element) -> bool) -> usize {
        let mut removed = 0;
        let mut kept: Vec<Node> = Vec::with_capacity(self.children.len());
        for node in self.children.drain(..) {
            match &node {
                Node::Element(element) if !keep(element) => {
                    removed += 1;
                    if kept.last().is_some_and(Node::is_whitespace) {
                        kept.pop();
                    }
                }
                _ => kept.push(node),
            }
        }
        self.children = kept;
        removed
    }

    /// Serializes the element and its subtree.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn child_indent(&self, depth: usize, layout: &Layout) -> String {
        self.children
            .windows(2)
            .filter_map(|pair| match pair {
                [Node::Text(text), Node::Element(_)] if pair[0].is_whitespace() => {
                    text.rfind('\n').map(|at| text[at..].to_owned())
                }
                _ => None,
            })
            .last()
            .map_or_else(
                || layout.indent(depth + 1),
                |indent| indent.replacen('\n', layout.newline(), 1),
            )
    }

    fn open(&mut self) {
        if self.self_closing {
            self.self_closing = false;
            self.raw_start = None;
        }
    }

    pub(crate) fn write_to(&self, out: &mut String) {
        let empty = self.self_closing && self.children.is_empty();
        if let Some(raw) = &self.raw_start {
            out.push_str(raw);
            if empty {
                return;
            }
        } else {
            out.push('<');
            out.push_str(&self.name);
            for attr in &self.attributes {
                let quote = if attr.raw_value.contains('"') { '\'' } else { '"' };
                let _ = write!(out, " {}={quote}{}{quote}", attr.name, attr.raw_value);
            }
            if empty {
                out.push_str(" />");
                return;
            }
            out.push('>');
        }

        for child in &self.children {
            child.write_to(out);
        }

        match &self.raw_end {
            Some(raw) => out.push_str(raw),
            None => {
                let _ = write!(out, "</{}>", self.name);
            }
        }
    }
}

fn unescape_lossy(raw: &str) -> Cow<'_, str> {
    unescape(raw).unwrap_or(Cow::Borrowed(raw))
}
