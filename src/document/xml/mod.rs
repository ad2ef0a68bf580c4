//! XML signature placement.
//!
//! An XML document is reduced to its element tree ([`XmlDocument`]), and a
//! symbolic [`XmlSignatureLocation`] is resolved against it by the
//! [`LocationResolver`] into a concrete [`InsertionPoint`]: the parent element
//! plus the index among its element children where the signature element is
//! to be inserted.
//!
//! # Example
//!
//! ```
//! use signservice_integration::document::xml::{
//!     ChildPosition, LocationResolver, XmlDocument, XmlSignatureLocation,
//! };
//!
//! let doc = XmlDocument::parse(b"<Document><Signatures><S/><S/></Signatures></Document>")?;
//! let location = XmlSignatureLocation::new(["Document", "Signatures"], ChildPosition::Last)?;
//!
//! let point = LocationResolver::new().resolve(&doc, &location)?;
//! assert_eq!(point.index, 2);
//! # Ok::<(), signservice_integration::Error>(())
//! ```

mod location;
mod resolver;
mod tree;

pub use location::{ChildPosition, XmlSignatureLocation};
pub use resolver::{InsertionPoint, LocationResolver};
pub use tree::{NodeId, XmlDocument, XmlElement};
