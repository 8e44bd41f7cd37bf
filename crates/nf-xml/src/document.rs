//! Whole-document parsing and serialization.

use std::fmt;

use camino::Utf8Path;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use smallvec::SmallVec;

use crate::error::XmlError;
use crate::node::{Attribute, Element, Node};

const BOM: char = '\u{feff}';

/// Line ending and indentation conventions of a document.
///
/// Detected when a document is parsed and used to format new elements so
/// they blend in with existing markup.
///
/// # Examples
///
/// ```
/// use nf_xml::Layout;
///
/// let layout = Layout::detect("<a>\r\n\t<b />\r\n</a>");
/// assert_eq!(layout.newline(), "\r\n");
/// assert_eq!(layout.indent(2), "\r\n\t\t");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    newline: &'static str,
    unit: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            newline: "\n",
            unit: "  ".to_owned(),
        }
    }
}

impl Layout {
    /// Detects the conventions of a document's source text.
    #[must_use]
    pub fn detect(source: &str) -> Self {
        let newline = if source.contains("\r\n") { "\r\n" } else { "\n" };
        let unit = source
            .lines()
            .skip(1)
            .filter_map(|line| {
                let content = line.trim_start();
                let indent = &line[..line.len() - content.len()];
                (!indent.is_empty() && content.starts_with('<')).then_some(indent)
            })
            .min_by_key(|indent| indent.len())
            .map_or_else(|| "  ".to_owned(), str::to_owned);
        Self { newline, unit }
    }

    /// Returns the line ending.
    #[inline]
    #[must_use]
    pub fn newline(&self) -> &'static str {
        self.newline
    }

    /// Returns the whitespace that starts a line at the given depth.
    #[must_use]
    pub fn indent(&self, depth: usize) -> String {
        let mut indent = String::with_capacity(self.newline.len() + self.unit.len() * depth);
        indent.push_str(self.newline);
        for _ in 0..depth {
            indent.push_str(&self.unit);
        }
        indent
    }
}

/// A parsed XML document.
///
/// Serializing an unmodified document reproduces its source exactly,
/// including the byte order mark, the declaration, comments, and whitespace.
///
/// # Examples
///
/// ```
/// use nf_xml::XmlDocument;
///
/// let source = "<?xml version=\"1.0\"?>\n<packages>\n  <package id=\"A\" version=\"1.0\" />\n</packages>\n";
/// let mut doc = XmlDocument::parse(source)?;
/// assert_eq!(doc.to_string(), source);
///
/// let package = doc.root_mut().child_mut("package").unwrap();
/// package.set_attr("version", "2.0");
/// assert!(doc.to_string().contains(r#"<package id="A" version="2.0" />"#));
/// # Ok::<(), nf_xml::XmlError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    bom: bool,
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
    layout: Layout,
}

impl XmlDocument {
    /// Parses a document from source text.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Malformed`] when the text is not well-formed,
    /// [`XmlError::MissingRoot`] when it has no element, and
    /// [`XmlError::MultipleRoots`] when it has more than one top-level element.
    pub fn parse(source: &str) -> Result<Self, XmlError> {
        let (bom, body) = match source.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, source),
        };

        let mut reader = Reader::from_str(body);
        let mut stack: Vec<Element> = Vec::new();
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let start = offset(reader.buffer_position());
            let event = reader.read_event().map_err(|err| {
                XmlError::malformed(
                    u64::try_from(reader.error_position()).unwrap_or(u64::MAX),
                    err.to_string(),
                )
            })?;
            let end = offset(reader.buffer_position());
            let raw = body.get(start..end).unwrap_or_default().to_owned();
            let position = u64::try_from(start).unwrap_or(u64::MAX);

            let node = match event {
                Event::Start(tag) => {
                    stack.push(parse_tag(&tag, false, raw, position)?);
                    continue;
                }
                Event::Empty(tag) => Node::Element(parse_tag(&tag, true, raw, position)?),
                Event::End(_) => {
                    let Some(mut element) = stack.pop() else {
                        return Err(XmlError::malformed(position, "unexpected end tag"));
                    };
                    element.close(raw);
                    Node::Element(element)
                }
                Event::Text(_) => Node::Text(raw),
                Event::CData(_) => Node::CData(raw),
                Event::Comment(_) => Node::Comment(raw),
                Event::Decl(_) => Node::Declaration(raw),
                Event::PI(_) => Node::Instruction(raw),
                Event::DocType(_) => Node::DocType(raw),
                Event::Eof => break,
            };

            if let Some(parent) = stack.last_mut() {
                parent.push_parsed(node);
                continue;
            }
            match node {
                Node::Element(element) => {
                    if root.is_some() {
                        return Err(XmlError::MultipleRoots);
                    }
                    root = Some(element);
                }
                other if root.is_none() => prolog.push(other),
                other => epilog.push(other),
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::malformed(
                u64::try_from(body.len()).unwrap_or(u64::MAX),
                format!("unclosed element <{}>", open.name()),
            ));
        }

        let root = root.ok_or(XmlError::MissingRoot)?;
        Ok(Self {
            bom,
            prolog,
            root,
            epilog,
            layout: Layout::detect(body),
        })
    }

    /// Reads and parses a document from a file.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Io`] if the file cannot be read,
    /// [`XmlError::Encoding`] if it is not UTF-8, and [`XmlError::File`] wrapping
    /// the parse failure otherwise.
    pub fn load(path: &Utf8Path) -> Result<Self, XmlError> {
        let bytes = std::fs::read(path).map_err(|source| XmlError::io(path, source))?;
        let source = String::from_utf8(bytes).map_err(|_| XmlError::Encoding {
            path: path.to_owned(),
        })?;
        Self::parse(&source).map_err(|err| err.in_file(path))
    }

    /// Writes the serialized document to a file.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Utf8Path) -> Result<(), XmlError> {
        std::fs::write(path, self.to_string()).map_err(|source| XmlError::io(path, source))
    }

    /// Returns the root element.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Returns the root element mutably.
    #[inline]
    #[must_use]
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Returns the detected layout.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Returns `true` if the source started with a byte order mark.
    #[inline]
    #[must_use]
    pub fn has_bom(&self) -> bool {
        self.bom
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        if self.bom {
            out.push(BOM);
        }
        for node in &self.prolog {
            node.write_to(&mut out);
        }
        self.root.write_to(&mut out);
        for node in &self.epilog {
            node.write_to(&mut out);
        }
        f.write_str(&out)
    }
}

fn parse_tag(
    tag: &BytesStart<'_>,
    self_closing: bool,
    raw: String,
    position: u64,
) -> Result<Element, XmlError> {
    let name = utf8(tag.name().as_ref(), position)?.to_owned();
    let mut attributes: SmallVec<[Attribute; 4]> = SmallVec::new();
    for attr in tag.attributes() {
        let attr = attr.map_err(|err| XmlError::malformed(position, err.to_string()))?;
        attributes.push(Attribute::from_raw(
            utf8(attr.key.as_ref(), position)?.to_owned(),
            utf8(&attr.value, position)?.to_owned(),
        ));
    }
    Ok(Element::parsed(name, attributes, self_closing, raw))
}

fn utf8(bytes: &[u8], position: u64) -> Result<&str, XmlError> {
    std::str::from_utf8(bytes).map_err(|err| XmlError::malformed(position, err.to_string()))
}

fn offset<T: TryInto<usize>>(position: T) -> usize {
    position.try_into().unwrap_or(usize::MAX)
}
