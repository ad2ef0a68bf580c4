//! Document preparation.
//!
//! Preparation dispatches once on the document's processing requirement:
//! XML locations go through the [`LocationResolver`], visible PDF signatures
//! through the [`PageLayoutEngine`], and everything else through the integrity
//! checks of its document type. A failure aborts only the document at hand.

use super::pdf::{
    LayoutSettings, PageLayoutEngine, PdfDocumentHandler, PdfDocumentIssue,
    PdfSignatureImageTemplate, PdfSignatureRequirement, PlacementRequest,
    SignaturePageLayoutState, SignerName, SIGNER_NAME_FIELD_NAME,
};
use super::xml::{LocationResolver, XmlDocument, XmlSignatureLocation};
use super::{AdesRequirement, DocumentType, ProcessingRequirement, TbsDocument};
use crate::config::IntegrationConfig;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::serde_helpers::base64_bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Resolved insertion point of an XML signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XmlInsertion {
    /// Absolute path of the parent element
    pub parent_path: String,
    /// Index among the parent's element children
    pub index: usize,
    /// Number of element children of the parent
    pub child_count: usize,
}

/// Resolved visible signature image of a PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfImagePlacement {
    /// Image template reference
    pub template_ref: String,
    /// 1-based page
    pub page: usize,
    /// Image region on the page
    pub region: Rect,
    /// Grid slot, for ordinal placements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<u32>,
    /// Zoom percentage applied to the template size
    pub scale: i32,
    /// Signature page appended for this image, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_signature_page: Option<String>,
    /// Signer name attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_name: Option<SignerName>,
    /// Template field values
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub field_values: IndexMap<String, String>,
}

/// Concrete location metadata of a prepared document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PreparedPlacement {
    /// No signature placement
    #[default]
    None,
    /// XML insertion point
    Xml(XmlInsertion),
    /// PDF signature image
    Pdf(PdfImagePlacement),
}

/// Condition found while preparing a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "camelCase")]
pub enum PrepareWarning {
    /// The visible signature was dropped because its page was full
    SignPageFull {
        /// The full page
        page: usize,
    },
    /// The PDF is encrypted
    EncryptedDocument,
    /// The PDF has an unsigned form
    UnsignedAcroForm,
}

/// Warnings collected during preparation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrepareReport {
    /// Warnings in discovery order
    pub warnings: Vec<PrepareWarning>,
}

impl PrepareReport {
    /// Whether preparation produced no warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// A document ready to be put in a sign request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedDocument {
    id: String,
    document_type: DocumentType,
    #[serde(with = "base64_bytes")]
    content: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ades_requirement: Option<AdesRequirement>,
    placement: PreparedPlacement,
    #[serde(default)]
    report: PrepareReport,
}

impl PreparedDocument {
    fn new(document: &TbsDocument, content: Vec<u8>) -> Self {
        Self {
            id: document.id().to_string(),
            document_type: document.document_type(),
            content,
            ades_requirement: document.ades_requirement().cloned(),
            placement: PreparedPlacement::None,
            report: PrepareReport::default(),
        }
    }

    /// Identifier of the source document.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Document type.
    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    /// Prepared bytes, possibly with an appended signature page.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// AdES requirement of the source document.
    pub fn ades_requirement(&self) -> Option<&AdesRequirement> {
        self.ades_requirement.as_ref()
    }

    /// Resolved placement.
    pub fn placement(&self) -> &PreparedPlacement {
        &self.placement
    }

    /// Preparation warnings.
    pub fn report(&self) -> &PrepareReport {
        &self.report
    }

    /// Consume the document, returning its bytes.
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

/// Prepares documents against an integration configuration.
///
/// # Example
///
/// ```
/// use signservice_integration::config::IntegrationConfig;
/// use signservice_integration::document::pdf::PageTreePdfHandler;
/// use signservice_integration::document::{DocumentPreparer, DocumentType, TbsDocument};
///
/// let config = IntegrationConfig::default();
/// let handler = PageTreePdfHandler::new();
/// let preparer = DocumentPreparer::new(&config, &handler);
///
/// let doc = TbsDocument::new("doc-1", b"{\"a\": 1}".to_vec(), DocumentType::Json)?;
/// let prepared = preparer.prepare(&doc)?;
/// assert_eq!(prepared.content(), doc.content());
/// # Ok::<(), signservice_integration::Error>(())
/// ```
pub struct DocumentPreparer<'a, H> {
    config: &'a IntegrationConfig,
    pdf_handler: &'a H,
    resolver: LocationResolver,
}

impl<'a, H: PdfDocumentHandler> DocumentPreparer<'a, H> {
    /// Create a preparer.
    pub fn new(config: &'a IntegrationConfig, pdf_handler: &'a H) -> Self {
        Self {
            config,
            pdf_handler,
            resolver: LocationResolver::new(),
        }
    }

    /// Prepare one document with a fresh layout state.
    pub fn prepare(&self, document: &TbsDocument) -> Result<PreparedDocument> {
        let mut state = SignaturePageLayoutState::new();
        self.prepare_with_state(document, &mut state)
    }

    /// Prepare one document, continuing from a layout state kept by the
    /// caller across calls for the same document.
    ///
    /// Failures are reported as [`Error::Preparation`]; the state is only
    /// updated when preparation succeeds.
    pub fn prepare_with_state(
        &self,
        document: &TbsDocument,
        state: &mut SignaturePageLayoutState,
    ) -> Result<PreparedDocument> {
        log::debug!(
            "Preparing {} document '{}' ({} bytes)",
            document.document_type(),
            document.id(),
            document.content().len()
        );
        let result = match (document.document_type(), document.processing()) {
            (DocumentType::Xml, ProcessingRequirement::Xml(location)) => {
                self.prepare_xml(document, Some(location))
            },
            (DocumentType::Xml, ProcessingRequirement::None) => self.prepare_xml(document, None),
            (DocumentType::Pdf, ProcessingRequirement::Pdf(requirement)) => {
                self.prepare_pdf(document, Some(requirement), state)
            },
            (DocumentType::Pdf, ProcessingRequirement::None) => {
                self.prepare_pdf(document, None, state)
            },
            (DocumentType::Json, ProcessingRequirement::None) => self.prepare_json(document),
            (document_type, _) => Err(Error::validation(
                "tbsDocument",
                format!("processing requirement does not apply to {} documents", document_type),
            )),
        };
        result.map_err(|e| Error::preparation(document.id(), e))
    }

    /// Prepare each document independently.
    ///
    /// The batch is not atomic: a failure is reported in that document's slot
    /// and does not affect the others.
    pub fn prepare_batch(&self, documents: &[TbsDocument]) -> Vec<Result<PreparedDocument>> {
        documents.iter().map(|doc| self.prepare(doc)).collect()
    }

    fn prepare_xml(
        &self,
        document: &TbsDocument,
        location: Option<&XmlSignatureLocation>,
    ) -> Result<PreparedDocument> {
        let tree = XmlDocument::parse(document.content())?;
        let mut prepared = PreparedDocument::new(document, document.content().to_vec());

        if let Some(location) = location {
            let point = self.resolver.resolve(&tree, location)?;
            prepared.placement = PreparedPlacement::Xml(XmlInsertion {
                parent_path: tree.path_of(point.parent),
                index: point.index,
                child_count: tree.children(point.parent).len(),
            });
        }
        Ok(prepared)
    }

    fn prepare_json(&self, document: &TbsDocument) -> Result<PreparedDocument> {
        serde_json::from_slice::<serde_json::Value>(document.content()).map_err(|e| {
            Error::validation(
                "tbsDocument",
                format!("document '{}' is not valid JSON: {}", document.id(), e),
            )
        })?;
        Ok(PreparedDocument::new(document, document.content().to_vec()))
    }

    fn prepare_pdf(
        &self,
        document: &TbsDocument,
        requirement: Option<&PdfSignatureRequirement>,
        state: &mut SignaturePageLayoutState,
    ) -> Result<PreparedDocument> {
        let info = self.pdf_handler.inspect(document.content())?;
        let mut report = PrepareReport::default();
        for issue in &info.issues {
            log::warn!("PDF document '{}': {:?}", document.id(), issue);
            report.warnings.push(match issue {
                PdfDocumentIssue::EncryptionDictionary => PrepareWarning::EncryptedDocument,
                PdfDocumentIssue::AcroformInUnsignedPdf => PrepareWarning::UnsignedAcroForm,
            });
        }

        let Some(requirement) = requirement else {
            let mut prepared = PreparedDocument::new(document, document.content().to_vec());
            prepared.report = report;
            return Ok(prepared);
        };

        let visible = &requirement.visible;
        let template = self
            .config
            .signature_image_template(visible.template_ref())
            .ok_or_else(|| {
                Error::validation(
                    "visiblePdfSignatureRequirement",
                    format!("unknown signature image template '{}'", visible.template_ref()),
                )
            })?;
        check_field_values(template, requirement)?;

        let reference = requirement.preferences.signature_page_reference.as_deref();
        let sign_page = self.config.signature_page(reference).ok_or_else(|| {
            Error::validation(
                "pdfSignaturePagePreferences",
                match reference {
                    Some(id) => format!("unknown signature page '{}'", id),
                    None => "no signature page is configured".to_string(),
                },
            )
        })?;

        let engine = PageLayoutEngine::new(LayoutSettings {
            grid: sign_page.grid()?,
            page_size: self.config.page_bounds,
        });
        let scale = visible.scale().unwrap_or(sign_page.image_placement.scale);
        let request = PlacementRequest {
            size: template.size().scaled(scale),
            position: visible.position(),
            page: visible.page(),
        };

        let snapshot = state.clone();
        let placement = match engine.place(state, info.page_count, &request) {
            Ok(placement) => Some(placement),
            Err(Error::PageFull { page }) if !requirement.preferences.fail_when_sign_page_full => {
                log::warn!(
                    "Signature page {} of document '{}' is full, continuing without visible signature",
                    page,
                    document.id()
                );
                report.warnings.push(PrepareWarning::SignPageFull { page });
                None
            },
            Err(e) => return Err(e),
        };

        // The layout state may remember signature pages these bytes lack
        let missing_pages = placement.map_or(0, |p| p.page.saturating_sub(info.page_count));
        let mut content = document.content().to_vec();
        for _ in 0..missing_pages {
            content = match self.pdf_handler.add_signature_page(&content, sign_page) {
                Ok(bytes) => bytes,
                Err(e) => {
                    *state = snapshot;
                    return Err(e);
                },
            };
        }
        let added_signature_page = if missing_pages > 0 {
            log::debug!(
                "Appended {} signature page(s) '{}' to document '{}'",
                missing_pages,
                sign_page.id,
                document.id()
            );
            Some(sign_page.id.clone())
        } else {
            None
        };

        let mut prepared = PreparedDocument::new(document, content);
        prepared.report = report;
        if let Some(placement) = placement {
            log::info!(
                "Visible signature for '{}' placed on page {}",
                document.id(),
                placement.page
            );
            prepared.placement = PreparedPlacement::Pdf(PdfImagePlacement {
                template_ref: template.reference.clone(),
                page: placement.page,
                region: placement.region,
                ordinal: placement.ordinal,
                scale,
                added_signature_page,
                signer_name: visible.signer_name().cloned(),
                field_values: visible.field_values().clone(),
            });
        }
        Ok(prepared)
    }
}

/// Field values must name template fields, and templates rendering the
/// signer name need the signer name attributes.
fn check_field_values(
    template: &PdfSignatureImageTemplate,
    requirement: &PdfSignatureRequirement,
) -> Result<()> {
    let visible = &requirement.visible;
    let unknown: std::collections::BTreeMap<String, String> = visible
        .field_values()
        .keys()
        .filter(|field| !template.accepts_field(field))
        .map(|field| (field.clone(), "not a field of the template".to_string()))
        .collect();
    if !unknown.is_empty() {
        return Err(Error::validation_with_details(
            "visiblePdfSignatureRequirement",
            format!("invalid field values for template '{}'", template.reference),
            unknown,
        ));
    }
    if template.include_signer_name && visible.signer_name().is_none() {
        return Err(Error::validation(
            "visiblePdfSignatureRequirement",
            format!(
                "template '{}' renders '{}' but no signer name is given",
                template.reference, SIGNER_NAME_FIELD_NAME
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::pdf::{
        ImagePosition, PagePlacement, PdfDocumentInfo, PdfSignaturePage,
        PdfSignaturePagePreferences, VisiblePdfSignatureRequirement,
    };
    use crate::document::xml::ChildPosition;

    /// Handler reporting a fixed page count and appending a marker per page.
    struct FakePdf {
        pages: usize,
    }

    impl PdfDocumentHandler for FakePdf {
        fn inspect(&self, pdf: &[u8]) -> Result<PdfDocumentInfo> {
            if !pdf.starts_with(b"%PDF-") {
                return Err(Error::InvalidHeader(String::from_utf8_lossy(pdf).into_owned()));
            }
            Ok(PdfDocumentInfo {
                version: "1.7".into(),
                page_count: self.pages,
                signed: false,
                issues: Vec::new(),
            })
        }

        fn add_signature_page(&self, pdf: &[u8], page: &PdfSignaturePage) -> Result<Vec<u8>> {
            let mut out = pdf.to_vec();
            out.extend_from_slice(format!("\n%sign-page {}", page.id).as_bytes());
            Ok(out)
        }
    }

    fn config() -> IntegrationConfig {
        IntegrationConfig::default()
            .with_signature_image_template(PdfSignatureImageTemplate::new("logo", 100, 50))
            .with_signature_page(
                PdfSignaturePage::new("grid", 50.0, 600.0).with_grid(1, 2, 150.0, 0.0),
            )
    }

    fn pdf_doc(id: &str, page: PagePlacement, fail_when_full: bool) -> TbsDocument {
        let visible =
            VisiblePdfSignatureRequirement::new("logo", ImagePosition::Ordinal(None), page)
                .unwrap();
        let requirement = PdfSignatureRequirement::new(visible).with_preferences(
            PdfSignaturePagePreferences {
                signature_page_reference: None,
                fail_when_sign_page_full: fail_when_full,
            },
        );
        TbsDocument::new(id, b"%PDF-1.7".to_vec(), DocumentType::Pdf)
            .unwrap()
            .with_processing(ProcessingRequirement::Pdf(requirement))
            .unwrap()
    }

    #[test]
    fn test_xml_insertion_metadata() {
        let config = config();
        let handler = FakePdf { pages: 1 };
        let preparer = DocumentPreparer::new(&config, &handler);
        let location =
            XmlSignatureLocation::new(["Document", "Signatures"], ChildPosition::Last).unwrap();
        let doc = TbsDocument::new(
            "x",
            b"<Document><Signatures><A/><B/></Signatures></Document>".to_vec(),
            DocumentType::Xml,
        )
        .unwrap()
        .with_processing(ProcessingRequirement::Xml(location))
        .unwrap();

        let prepared = preparer.prepare(&doc).unwrap();
        assert_eq!(prepared.content(), doc.content());
        assert_eq!(
            prepared.placement(),
            &PreparedPlacement::Xml(XmlInsertion {
                parent_path: "/Document/Signatures".into(),
                index: 2,
                child_count: 2,
            })
        );
    }

    #[test]
    fn test_malformed_xml_is_preparation_error() {
        let config = config();
        let handler = FakePdf { pages: 1 };
        let preparer = DocumentPreparer::new(&config, &handler);
        let doc = TbsDocument::new("broken", b"<Document>".to_vec(), DocumentType::Xml).unwrap();

        let err = preparer.prepare(&doc).unwrap_err();
        match &err {
            Error::Preparation { document_id, .. } => assert_eq!(document_id, "broken"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(matches!(err.root_cause(), Error::MalformedXml(_)));
    }

    #[test]
    fn test_pdf_allocates_signature_page_when_full() {
        let config = config();
        let handler = FakePdf { pages: 1 };
        let preparer = DocumentPreparer::new(&config, &handler);
        let doc = pdf_doc("p", PagePlacement::NextAvailable, true);

        let mut state = SignaturePageLayoutState::new();
        let first = preparer.prepare_with_state(&doc, &mut state).unwrap();
        let second = preparer.prepare_with_state(&doc, &mut state).unwrap();
        let third = preparer.prepare_with_state(&doc, &mut state).unwrap();

        let page_of = |p: &PreparedDocument| match p.placement() {
            PreparedPlacement::Pdf(img) => (img.page, img.added_signature_page.clone()),
            other => panic!("unexpected placement: {:?}", other),
        };
        assert_eq!(page_of(&first), (1, None));
        assert_eq!(page_of(&second), (1, None));
        assert_eq!(page_of(&third), (2, Some("grid".to_string())));
        assert!(third.content().ends_with(b"%sign-page grid"));
    }

    #[test]
    fn test_pages_remembered_by_state_are_appended_again() {
        let config = config();
        let handler = FakePdf { pages: 1 };
        let preparer = DocumentPreparer::new(&config, &handler);
        let doc = pdf_doc("p", PagePlacement::NextAvailable, true);

        let mut state = SignaturePageLayoutState::new();
        let prepared: Vec<_> = (0..6)
            .map(|_| preparer.prepare_with_state(&doc, &mut state).unwrap())
            .collect();

        // Every call starts from the original one-page bytes
        let appended = |p: &PreparedDocument| {
            p.content().windows(b"%sign-page".len()).filter(|w| w == b"%sign-page").count()
        };
        let summary: Vec<_> = prepared
            .iter()
            .map(|p| match p.placement() {
                PreparedPlacement::Pdf(img) => {
                    (img.page, img.added_signature_page.is_some(), appended(p))
                },
                other => panic!("unexpected placement: {:?}", other),
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, false, 0),
                (1, false, 0),
                (2, true, 1),
                (2, true, 1),
                (3, true, 2),
                (3, true, 2),
            ]
        );
    }

    #[test]
    fn test_full_page_downgrades_when_allowed() {
        let config = config();
        let handler = FakePdf { pages: 1 };
        let preparer = DocumentPreparer::new(&config, &handler);
        let doc = pdf_doc("p", PagePlacement::Explicit(1), false);

        let mut state = SignaturePageLayoutState::new();
        preparer.prepare_with_state(&doc, &mut state).unwrap();
        preparer.prepare_with_state(&doc, &mut state).unwrap();
        let third = preparer.prepare_with_state(&doc, &mut state).unwrap();

        assert_eq!(third.placement(), &PreparedPlacement::None);
        assert_eq!(third.report().warnings, vec![PrepareWarning::SignPageFull { page: 1 }]);
    }

    #[test]
    fn test_full_page_fails_by_default() {
        let config = config();
        let handler = FakePdf { pages: 1 };
        let preparer = DocumentPreparer::new(&config, &handler);
        let doc = pdf_doc("p", PagePlacement::Explicit(1), true);

        let mut state = SignaturePageLayoutState::new();
        preparer.prepare_with_state(&doc, &mut state).unwrap();
        preparer.prepare_with_state(&doc, &mut state).unwrap();
        let err = preparer.prepare_with_state(&doc, &mut state).unwrap_err();
        assert!(matches!(err.root_cause(), Error::PageFull { page: 1 }));
        assert_eq!(state.placement_count(), 2);
    }

    #[test]
    fn test_unknown_template_and_fields() {
        let config = config();
        let handler = FakePdf { pages: 1 };
        let preparer = DocumentPreparer::new(&config, &handler);

        let visible = VisiblePdfSignatureRequirement::new(
            "missing",
            ImagePosition::Ordinal(None),
            PagePlacement::NextAvailable,
        )
        .unwrap();
        let doc = TbsDocument::new("p", b"%PDF-1.7".to_vec(), DocumentType::Pdf)
            .unwrap()
            .with_processing(ProcessingRequirement::Pdf(PdfSignatureRequirement::new(visible)))
            .unwrap();
        let err = preparer.prepare(&doc).unwrap_err();
        assert!(matches!(err.root_cause(), Error::InputValidation { .. }));

        let visible = VisiblePdfSignatureRequirement::new(
            "logo",
            ImagePosition::Ordinal(None),
            PagePlacement::NextAvailable,
        )
        .unwrap()
        .with_field_value("nope", "value");
        let doc = doc
            .with_processing(ProcessingRequirement::Pdf(PdfSignatureRequirement::new(visible)))
            .unwrap();
        let err = preparer.prepare(&doc).unwrap_err();
        assert!(err.to_string().contains("nope=not a field of the template"));
    }

    #[test]
    fn test_invalid_json() {
        let config = config();
        let handler = FakePdf { pages: 1 };
        let preparer = DocumentPreparer::new(&config, &handler);
        let doc = TbsDocument::new("j", b"{not json".to_vec(), DocumentType::Json).unwrap();
        let err = preparer.prepare(&doc).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_batch_is_not_atomic() {
        let config = config();
        let handler = FakePdf { pages: 1 };
        let preparer = DocumentPreparer::new(&config, &handler);
        let docs = vec![
            TbsDocument::new("ok", b"<a/>".to_vec(), DocumentType::Xml).unwrap(),
            TbsDocument::new("bad", b"not a pdf".to_vec(), DocumentType::Pdf).unwrap(),
            TbsDocument::new("ok2", b"[]".to_vec(), DocumentType::Json).unwrap(),
        ];

        let results = preparer.prepare_batch(&docs);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1].as_ref().unwrap_err().root_cause(),
            Error::InvalidHeader(_)
        ));
        assert!(results[2].is_ok());
    }
}
