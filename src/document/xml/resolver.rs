//! Resolution of signature location directives against a document tree.

use super::location::{ChildPosition, XmlSignatureLocation};
use super::tree::{NodeId, XmlDocument};
use crate::error::{Error, Result};

/// A concrete place in the element tree where the signature element goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionPoint {
    /// The parent element receiving the signature
    pub parent: NodeId,
    /// Index among the parent's element children, in `[0, child_count]`
    pub index: usize,
}

/// Resolves [`XmlSignatureLocation`] directives.
///
/// Resolution never mutates the document. The same document and directive
/// always resolve to the same insertion point.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocationResolver;

impl LocationResolver {
    /// Create a resolver.
    pub fn new() -> Self {
        Self
    }

    /// Compute the insertion point for `location` in `document`.
    ///
    /// Every segment of the parent path must match exactly one element;
    /// missing and ambiguous segments fail with [`Error::ElementNotFound`].
    /// A BEFORE/AFTER position whose sibling is absent fails with
    /// [`Error::SiblingNotFound`].
    pub fn resolve(
        &self,
        document: &XmlDocument,
        location: &XmlSignatureLocation,
    ) -> Result<InsertionPoint> {
        let parent = self.resolve_parent(document, location)?;
        let children = document.children(parent);

        let index = match location.child_position() {
            ChildPosition::First => 0,
            ChildPosition::Last => children.len(),
            ChildPosition::Before(sibling) | ChildPosition::After(sibling) => {
                let found = children
                    .iter()
                    .position(|&child| document.element(child).matches(sibling))
                    .ok_or_else(|| Error::SiblingNotFound {
                        parent_path: location.xpath(),
                        sibling: sibling.clone(),
                    })?;
                match location.child_position() {
                    ChildPosition::After(_) => found + 1,
                    _ => found,
                }
            },
        };

        log::debug!(
            "Resolved {} ({}) to index {} of {} children",
            location.xpath(),
            location.child_position(),
            index,
            children.len()
        );
        Ok(InsertionPoint { parent, index })
    }

    fn resolve_parent(
        &self,
        document: &XmlDocument,
        location: &XmlSignatureLocation,
    ) -> Result<NodeId> {
        let path = location.parent_path();
        let not_found = |segment: &str, matches: usize| Error::ElementNotFound {
            path: location.xpath(),
            segment: segment.to_string(),
            matches,
        };

        let root = document.root();
        if !document.element(root).matches(&path[0]) {
            return Err(not_found(&path[0], 0));
        }

        let mut current = root;
        for segment in &path[1..] {
            let mut matching = document
                .children(current)
                .iter()
                .copied()
                .filter(|&child| document.element(child).matches(segment));
            current = match (matching.next(), matching.count()) {
                (Some(only), 0) => only,
                (None, _) => return Err(not_found(segment, 0)),
                (Some(_), others) => return Err(not_found(segment, others + 1)),
            };
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(xml: &str) -> XmlDocument {
        XmlDocument::parse(xml.as_bytes()).unwrap()
    }

    fn location(path: &[&str], position: ChildPosition) -> XmlSignatureLocation {
        XmlSignatureLocation::new(path.iter().copied(), position).unwrap()
    }

    #[test]
    fn test_first_and_last() {
        let d = doc("<Document><A/><B/><C/></Document>");
        let resolver = LocationResolver::new();

        let first = resolver.resolve(&d, &location(&["Document"], ChildPosition::First)).unwrap();
        assert_eq!(first, InsertionPoint { parent: d.root(), index: 0 });

        let last = resolver.resolve(&d, &location(&["Document"], ChildPosition::Last)).unwrap();
        assert_eq!(last.index, 3);
    }

    #[test]
    fn test_last_in_empty_parent() {
        let d = doc("<Document><Signatures/></Document>");
        let point = LocationResolver::new()
            .resolve(&d, &location(&["Document", "Signatures"], ChildPosition::Last))
            .unwrap();
        assert_eq!(point.index, 0);
        assert_eq!(d.element(point.parent).local_name, "Signatures");
    }

    #[test]
    fn test_before_and_after_use_first_matching_sibling() {
        let d = doc("<Document><A/><B/><A/></Document>");
        let resolver = LocationResolver::new();

        let before = resolver
            .resolve(&d, &location(&["Document"], ChildPosition::Before("A".into())))
            .unwrap();
        assert_eq!(before.index, 0);

        let after = resolver
            .resolve(&d, &location(&["Document"], ChildPosition::After("A".into())))
            .unwrap();
        assert_eq!(after.index, 1);

        let after_b = resolver
            .resolve(&d, &location(&["Document"], ChildPosition::After("B".into())))
            .unwrap();
        assert_eq!(after_b.index, 2);
    }

    #[test]
    fn test_missing_sibling() {
        let d = doc("<Document><A/></Document>");
        let err = LocationResolver::new()
            .resolve(&d, &location(&["Document"], ChildPosition::Before("Z".into())))
            .unwrap_err();
        match err {
            Error::SiblingNotFound {
                parent_path,
                sibling,
            } => {
                assert_eq!(parent_path, "/Document");
                assert_eq!(sibling, "Z");
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_wrong_root_name() {
        let d = doc("<Other><A/></Other>");
        let err = LocationResolver::new()
            .resolve(&d, &location(&["Document"], ChildPosition::Last))
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { matches: 0, .. }));
    }

    #[test]
    fn test_ambiguous_segment_is_rejected() {
        let d = doc("<Document><Part/><Part><X/></Part></Document>");
        let err = LocationResolver::new()
            .resolve(&d, &location(&["Document", "Part"], ChildPosition::Last))
            .unwrap_err();
        match err {
            Error::ElementNotFound {
                segment, matches, ..
            } => {
                assert_eq!(segment, "Part");
                assert_eq!(matches, 2);
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_prefixed_segment() {
        let d = doc(r#"<a:Root xmlns:a="urn:a" xmlns:b="urn:b"><b:Sigs/><a:Sigs/></a:Root>"#);
        let resolver = LocationResolver::new();

        // Unprefixed segment matches both local names
        assert!(resolver
            .resolve(&d, &location(&["Root", "Sigs"], ChildPosition::Last))
            .is_err());

        let point = resolver
            .resolve(&d, &location(&["a:Root", "b:Sigs"], ChildPosition::Last))
            .unwrap();
        assert_eq!(d.element(point.parent).qualified_name, "b:Sigs");
    }
}
