//! Element tree of a parsed XML document.
//!
//! Only the element structure is retained: names, parent links and the
//! ordered list of element children. Text, comments and processing
//! instructions do not take part in signature placement and are skipped.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Index of an element within an [`XmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the element in document order (the root is 0).
    pub fn index(&self) -> usize {
        self.0
    }
}

/// An element of the document tree.
#[derive(Debug, Clone)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `ds:Signature`
    pub qualified_name: String,
    /// Local name without namespace prefix, e.g. `Signature`
    pub local_name: String,
    /// Parent element, `None` for the root
    pub parent: Option<NodeId>,
    /// Element children in document order
    pub children: Vec<NodeId>,
}

impl XmlElement {
    /// Whether this element is named `name`.
    ///
    /// A prefixed name (`ds:Signature`) is compared against the qualified
    /// name; an unprefixed name against the local name.
    pub fn matches(&self, name: &str) -> bool {
        if name.contains(':') {
            self.qualified_name == name
        } else {
            self.local_name == name
        }
    }
}

/// A well-formed XML document reduced to its element tree.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    elements: Vec<XmlElement>,
}

impl XmlDocument {
    /// Parse an XML document.
    ///
    /// Fails with [`Error::MalformedXml`] if the document is not UTF-8, has
    /// mismatched or unclosed tags, has no root element, more than one root
    /// element, or character data outside the root element.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let xml = std::str::from_utf8(data)
            .map_err(|e| Error::MalformedXml(format!("document is not UTF-8: {}", e)))?;

        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut elements: Vec<XmlElement> = Vec::new();
        let mut open: Vec<NodeId> = Vec::new();
        let mut root_closed = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let id = Self::push_element(&mut elements, &open, root_closed, e)?;
                    open.push(id);
                },
                Ok(Event::Empty(ref e)) => {
                    Self::push_element(&mut elements, &open, root_closed, e)?;
                    if open.is_empty() {
                        root_closed = true;
                    }
                },
                Ok(Event::End(_)) => {
                    // quick-xml checks that end names match their start tags
                    open.pop();
                    if open.is_empty() {
                        root_closed = true;
                    }
                },
                Ok(Event::Text(_)) | Ok(Event::CData(_)) => {
                    if open.is_empty() {
                        return Err(Error::MalformedXml(format!(
                            "character data outside the root element at byte {}",
                            reader.buffer_position()
                        )));
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::MalformedXml(format!(
                        "error at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                },
                _ => {},
            }
        }

        if !open.is_empty() {
            let unclosed = &elements[open[open.len() - 1].0].qualified_name;
            return Err(Error::MalformedXml(format!("unclosed element <{}>", unclosed)));
        }
        if elements.is_empty() {
            return Err(Error::MalformedXml("document has no root element".to_string()));
        }

        log::debug!("Parsed XML document with {} elements", elements.len());
        Ok(Self { elements })
    }

    fn push_element(
        elements: &mut Vec<XmlElement>,
        open: &[NodeId],
        root_closed: bool,
        e: &BytesStart<'_>,
    ) -> Result<NodeId> {
        let qualified_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

        let parent = open.last().copied();
        if parent.is_none() && (root_closed || !elements.is_empty()) {
            return Err(Error::MalformedXml(format!(
                "second root element <{}>",
                qualified_name
            )));
        }

        let id = NodeId(elements.len());
        elements.push(XmlElement {
            qualified_name,
            local_name,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            elements[parent.0].children.push(id);
        }
        Ok(id)
    }

    /// The document (root) element.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Look up an element by id.
    ///
    /// Ids are only handed out by this document, so lookups of ids from the
    /// same document always succeed.
    pub fn element(&self, id: NodeId) -> &XmlElement {
        &self.elements[id.0]
    }

    /// Element children of `id`, in document order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.elements[id.0].children
    }

    /// Total number of elements in the document.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Absolute path of `id` from the root, e.g. `/Document/Signatures`.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let element = self.element(node);
            names.push(element.qualified_name.as_str());
            current = element.parent;
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }
}
