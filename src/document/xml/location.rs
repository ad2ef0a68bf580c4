//! Symbolic placement directives for XML signature elements.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where, among the parent's element children, the signature is inserted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChildPosition {
    /// Before all existing children
    First,
    /// After all existing children
    Last,
    /// Immediately before the first child with the given name
    Before(String),
    /// Immediately after the first child with the given name
    After(String),
}

impl ChildPosition {
    /// Position immediately before the first child named `sibling`.
    pub fn before(sibling: impl Into<String>) -> Result<Self> {
        Ok(ChildPosition::Before(validate_name("sibling", sibling.into())?))
    }

    /// Position immediately after the first child named `sibling`.
    pub fn after(sibling: impl Into<String>) -> Result<Self> {
        Ok(ChildPosition::After(validate_name("sibling", sibling.into())?))
    }

    /// The sibling name referenced by this position, if any.
    pub fn sibling(&self) -> Option<&str> {
        match self {
            ChildPosition::Before(name) | ChildPosition::After(name) => Some(name),
            ChildPosition::First | ChildPosition::Last => None,
        }
    }
}

impl fmt::Display for ChildPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildPosition::First => write!(f, "first"),
            ChildPosition::Last => write!(f, "last"),
            ChildPosition::Before(name) => write!(f, "before:{}", name),
            ChildPosition::After(name) => write!(f, "after:{}", name),
        }
    }
}

impl FromStr for ChildPosition {
    type Err = Error;

    /// Parse `first`, `last`, `before:<name>` or `after:<name>` (keywords are
    /// case-insensitive).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("first") {
            return Ok(ChildPosition::First);
        }
        if s.eq_ignore_ascii_case("last") {
            return Ok(ChildPosition::Last);
        }
        if let Some((keyword, sibling)) = s.split_once(':') {
            if keyword.eq_ignore_ascii_case("before") {
                return ChildPosition::before(sibling);
            }
            if keyword.eq_ignore_ascii_case("after") {
                return ChildPosition::after(sibling);
            }
        }
        Err(Error::validation(
            "childPosition",
            format!("'{}' is not a supported child position", s),
        ))
    }
}

impl Serialize for ChildPosition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChildPosition {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Directive telling where an XML signature element should be inserted.
///
/// The parent element is addressed by the sequence of element names leading
/// from the document root (the first segment names the root itself). The
/// parent must resolve to exactly one element.
///
/// # Example
///
/// ```
/// use signservice_integration::document::xml::{ChildPosition, XmlSignatureLocation};
///
/// let location = XmlSignatureLocation::new(["Document", "Signatures"], ChildPosition::Last)?;
/// assert_eq!(location.xpath(), "/Document/Signatures");
///
/// let same = XmlSignatureLocation::from_xpath("/Document/Signatures", ChildPosition::Last)?;
/// assert_eq!(location, same);
/// # Ok::<(), signservice_integration::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawXmlSignatureLocation", rename_all = "camelCase")]
pub struct XmlSignatureLocation {
    parent_path: Vec<String>,
    child_position: ChildPosition,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawXmlSignatureLocation {
    #[serde(default)]
    parent_path: Option<Vec<String>>,
    #[serde(default)]
    xpath: Option<String>,
    #[serde(default)]
    child_position: Option<ChildPosition>,
}

impl TryFrom<RawXmlSignatureLocation> for XmlSignatureLocation {
    type Error = Error;

    fn try_from(raw: RawXmlSignatureLocation) -> Result<Self> {
        let position = raw.child_position.unwrap_or(ChildPosition::Last);
        match (raw.parent_path, raw.xpath) {
            (Some(path), None) => Self::new(path, position),
            (None, Some(xpath)) => Self::from_xpath(&xpath, position),
            (Some(_), Some(_)) => Err(Error::validation(
                "xmlSignatureLocation",
                "parentPath and xpath are mutually exclusive",
            )),
            (None, None) => Err(Error::validation(
                "xmlSignatureLocation",
                "one of parentPath or xpath is required",
            )),
        }
    }
}

impl XmlSignatureLocation {
    /// Create a location from the element names leading to the parent.
    pub fn new<I, S>(parent_path: I, child_position: ChildPosition) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parent_path = parent_path
            .into_iter()
            .map(|segment| validate_name("parentPath", segment.into()))
            .collect::<Result<Vec<_>>>()?;
        if parent_path.is_empty() {
            return Err(Error::validation(
                "xmlSignatureLocation",
                "parentPath must name at least the document root",
            ));
        }
        Ok(Self {
            parent_path,
            child_position,
        })
    }

    /// Create a location from a plain absolute element path such as
    /// `/Document/Signatures`.
    ///
    /// Only child steps by element name are supported; predicates, wildcards,
    /// axes and relative paths are rejected.
    pub fn from_xpath(xpath: &str, child_position: ChildPosition) -> Result<Self> {
        let trimmed = xpath.trim();
        let Some(steps) = trimmed.strip_prefix('/') else {
            return Err(Error::validation(
                "xmlSignatureLocation",
                format!("'{}' is not an absolute path", xpath),
            ));
        };
        if steps.starts_with('/') {
            return Err(Error::validation(
                "xmlSignatureLocation",
                format!("'{}' uses the descendant axis, which is not supported", xpath),
            ));
        }
        Self::new(steps.split('/'), child_position)
    }

    /// Element names from the root to the parent element.
    pub fn parent_path(&self) -> &[String] {
        &self.parent_path
    }

    /// Position among the parent's children.
    pub fn child_position(&self) -> &ChildPosition {
        &self.child_position
    }

    /// The parent path rendered as an absolute path.
    pub fn xpath(&self) -> String {
        format!("/{}", self.parent_path.join("/"))
    }
}

/// Element names: non-empty, no whitespace and none of the XPath operator
/// characters a plain name step cannot contain.
fn validate_name(field: &str, name: String) -> Result<String> {
    let invalid = name.is_empty()
        || name.chars().any(|c| {
            c.is_whitespace() || matches!(c, '/' | '[' | ']' | '*' | '@' | '(' | ')' | '=' | '|')
        })
        || name == "."
        || name == ".."
        || name.starts_with(':')
        || name.ends_with(':');
    if invalid {
        return Err(Error::validation(
            field,
            format!("'{}' is not a valid element name", name),
        ));
    }
    Ok(name)
}
