//! Integration tests for XML signature location resolution.

use proptest::prelude::*;
use signservice_integration::document::xml::{
    ChildPosition, LocationResolver, XmlDocument, XmlSignatureLocation,
};
use signservice_integration::Error;

// ============================================================================
// Helpers
// ============================================================================

fn signatures_doc(children: &[&str]) -> XmlDocument {
    let inner: String = children.iter().map(|c| format!("<{}/>", c)).collect();
    let xml = format!(
        "<?xml version=\"1.0\"?>\n<Document><Header>text</Header><Signatures>{}</Signatures></Document>",
        inner
    );
    XmlDocument::parse(xml.as_bytes()).expect("well-formed test document")
}

fn signatures_location(position: ChildPosition) -> XmlSignatureLocation {
    XmlSignatureLocation::new(["Document", "Signatures"], position).unwrap()
}

fn position_strategy() -> impl Strategy<Value = ChildPosition> {
    let name = || prop::sample::select(vec!["A", "B", "C", "D"]);
    prop_oneof![
        Just(ChildPosition::First),
        Just(ChildPosition::Last),
        name().prop_map(|s| ChildPosition::Before(s.to_string())),
        name().prop_map(|s| ChildPosition::After(s.to_string())),
    ]
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_last_after_two_existing_signatures() {
    let doc = signatures_doc(&["ds:Signature", "ds:Signature"]);
    let point = LocationResolver::new()
        .resolve(&doc, &signatures_location(ChildPosition::Last))
        .unwrap();

    assert_eq!(point.index, 2);
    assert_eq!(doc.path_of(point.parent), "/Document/Signatures");
}

#[test]
fn test_before_named_sibling_in_prefixed_document() {
    let xml = br#"<doc:Document xmlns:doc="urn:doc" xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
        <doc:Content/>
        <ds:Signature/>
        <doc:Trailer/>
    </doc:Document>"#;
    let doc = XmlDocument::parse(xml).unwrap();
    let location = XmlSignatureLocation::from_xpath(
        "/Document",
        ChildPosition::before("doc:Trailer").unwrap(),
    )
    .unwrap();

    let point = LocationResolver::new().resolve(&doc, &location).unwrap();
    assert_eq!(point.parent, doc.root());
    assert_eq!(point.index, 2);
}

#[test]
fn test_missing_parent_segment() {
    let doc = signatures_doc(&[]);
    let location =
        XmlSignatureLocation::new(["Document", "Missing"], ChildPosition::First).unwrap();
    let err = LocationResolver::new().resolve(&doc, &location).unwrap_err();

    match err {
        Error::ElementNotFound {
            path,
            segment,
            matches,
        } => {
            assert_eq!(path, "/Document/Missing");
            assert_eq!(segment, "Missing");
            assert_eq!(matches, 0);
        },
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_location_from_json_directive() {
    let location: XmlSignatureLocation = serde_json::from_str(
        r#"{"parentPath": ["Document", "Signatures"], "childPosition": "after:A"}"#,
    )
    .unwrap();
    let doc = signatures_doc(&["A", "B"]);
    let point = LocationResolver::new().resolve(&doc, &location).unwrap();
    assert_eq!(point.index, 1);
}

#[test]
fn test_malformed_documents_are_rejected() {
    for xml in [
        "",
        "<Document>",
        "<Document></Other>",
        "<A/><B/>",
        "text<A/>",
    ] {
        let result = XmlDocument::parse(xml.as_bytes());
        assert!(
            matches!(result, Err(Error::MalformedXml(_))),
            "expected malformed XML for {:?}",
            xml
        );
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn resolve_is_bounded_and_deterministic(
        children in prop::collection::vec(prop::sample::select(vec!["A", "B", "C"]), 0..8),
        position in position_strategy(),
    ) {
        let doc = signatures_doc(&children);
        let location = signatures_location(position.clone());
        let resolver = LocationResolver::new();

        match resolver.resolve(&doc, &location) {
            Ok(point) => {
                prop_assert!(point.index <= children.len());
                prop_assert_eq!(resolver.resolve(&doc, &location).unwrap(), point);

                let expected = match &position {
                    ChildPosition::First => 0,
                    ChildPosition::Last => children.len(),
                    ChildPosition::Before(s) => children.iter().position(|c| *c == s.as_str()).unwrap(),
                    ChildPosition::After(s) => children.iter().position(|c| *c == s.as_str()).unwrap() + 1,
                };
                prop_assert_eq!(point.index, expected);
            },
            Err(Error::SiblingNotFound { sibling, .. }) => {
                prop_assert!(!children.contains(&sibling.as_str()));
            },
            Err(e) => prop_assert!(false, "unexpected error: {:?}", e),
        }
    }

    #[test]
    fn ambiguous_parent_is_never_guessed(
        copies in 2usize..5,
        position in position_strategy(),
    ) {
        let xml = format!("<Document>{}</Document>", "<Signatures><A/></Signatures>".repeat(copies));
        let doc = XmlDocument::parse(xml.as_bytes()).unwrap();
        let result = LocationResolver::new().resolve(&doc, &signatures_location(position));

        match result {
            Err(Error::ElementNotFound { matches, .. }) => prop_assert_eq!(matches, copies),
            other => prop_assert!(false, "expected ElementNotFound, got {:?}", other),
        }
    }
}
