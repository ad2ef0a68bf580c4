//! To-be-signed documents and their preparation.
//!
//! A [`TbsDocument`] carries the document bytes, its type, the AdES
//! requirement and an optional [`ProcessingRequirement`]: where an XML
//! signature goes, or what visible signature a PDF gets. The
//! [`DocumentPreparer`] turns it into a [`PreparedDocument`].

pub mod pdf;
mod prepare;
pub mod xml;

pub use prepare::{
    DocumentPreparer, PdfImagePlacement, PrepareReport, PrepareWarning, PreparedDocument,
    PreparedPlacement, XmlInsertion,
};

use crate::error::{Error, Result};
use crate::serde_helpers::base64_bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use self::pdf::PdfSignatureRequirement;
use self::xml::XmlSignatureLocation;

/// Type of a to-be-signed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    /// XML document, signed with an XML signature
    Xml,
    /// PDF document, signed with a PDF signature
    Pdf,
    /// JSON document
    Json,
}

impl DocumentType {
    /// The document MIME type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentType::Xml => "application/xml",
            DocumentType::Pdf => "application/pdf",
            DocumentType::Json => "application/json",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

impl FromStr for DocumentType {
    type Err = Error;

    /// Accepts a MIME type (`application/pdf`, `text/xml`) or a type name
    /// (`pdf`, `XML`).
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower
            .rsplit_once('/')
            .map(|(_, subtype)| subtype)
            .unwrap_or(&lower);
        match name {
            "xml" => Ok(DocumentType::Xml),
            "pdf" => Ok(DocumentType::Pdf),
            "json" => Ok(DocumentType::Json),
            _ => Err(Error::validation(
                "tbsDocument",
                format!("unsupported document type '{}'", s),
            )),
        }
    }
}

impl Serialize for DocumentType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.mime_type())
    }
}

impl<'de> Deserialize<'de> for DocumentType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// AdES signature form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdesType {
    /// Basic electronic signature
    Bes,
    /// Explicit policy-based electronic signature
    Epes,
}

/// How the signature relates to the signed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignaturePacking {
    /// Signature inside the signed document
    #[default]
    Enveloped,
    /// Signed content inside the signature
    Enveloping,
    /// Signature separate from the content
    Detached,
}

/// AdES requirement of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAdesRequirement", rename_all = "camelCase")]
pub struct AdesRequirement {
    format: AdesType,
    packing: SignaturePacking,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature_policy: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAdesRequirement {
    format: AdesType,
    #[serde(default)]
    packing: SignaturePacking,
    #[serde(default)]
    signature_policy: Option<String>,
}

impl TryFrom<RawAdesRequirement> for AdesRequirement {
    type Error = Error;

    fn try_from(raw: RawAdesRequirement) -> Result<Self> {
        Self::new(raw.format, raw.packing, raw.signature_policy)
    }
}

impl AdesRequirement {
    /// Create a requirement; EPES needs a signature policy.
    pub fn new(
        format: AdesType,
        packing: SignaturePacking,
        signature_policy: Option<String>,
    ) -> Result<Self> {
        let signature_policy = signature_policy.filter(|p| !p.trim().is_empty());
        if format == AdesType::Epes && signature_policy.is_none() {
            return Err(Error::validation(
                "adesRequirement",
                "EPES requires a signature policy",
            ));
        }
        Ok(Self {
            format,
            packing,
            signature_policy,
        })
    }

    /// Enveloped BES.
    pub fn bes() -> Self {
        Self {
            format: AdesType::Bes,
            packing: SignaturePacking::Enveloped,
            signature_policy: None,
        }
    }

    /// Signature form.
    pub fn format(&self) -> AdesType {
        self.format
    }

    /// Signature packing.
    pub fn packing(&self) -> SignaturePacking {
        self.packing
    }

    /// Signature policy identifier.
    pub fn signature_policy(&self) -> Option<&str> {
        self.signature_policy.as_deref()
    }
}

/// Type-specific processing a document asks for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProcessingRequirement {
    /// Integrity checks only
    #[default]
    None,
    /// Place the XML signature at the given location
    Xml(XmlSignatureLocation),
    /// Add a visible signature to the PDF
    Pdf(PdfSignatureRequirement),
}

impl ProcessingRequirement {
    fn accepts(&self, document_type: DocumentType) -> bool {
        match self {
            ProcessingRequirement::None => true,
            ProcessingRequirement::Xml(_) => document_type == DocumentType::Xml,
            ProcessingRequirement::Pdf(_) => document_type == DocumentType::Pdf,
        }
    }
}

/// A document to be signed.
///
/// # Example
///
/// ```
/// use signservice_integration::document::{DocumentType, ProcessingRequirement, TbsDocument};
/// use signservice_integration::document::xml::{ChildPosition, XmlSignatureLocation};
///
/// let location = XmlSignatureLocation::new(["Document"], ChildPosition::Last)?;
/// let doc = TbsDocument::new("doc-1", b"<Document/>".to_vec(), DocumentType::Xml)?
///     .with_processing(ProcessingRequirement::Xml(location))?;
/// assert_eq!(doc.id(), "doc-1");
/// # Ok::<(), signservice_integration::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTbsDocument", rename_all = "camelCase")]
pub struct TbsDocument {
    id: String,
    #[serde(with = "base64_bytes")]
    content: Vec<u8>,
    #[serde(rename = "mimeType")]
    document_type: DocumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    ades_requirement: Option<AdesRequirement>,
    processing: ProcessingRequirement,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTbsDocument {
    id: String,
    #[serde(with = "base64_bytes")]
    content: Vec<u8>,
    mime_type: DocumentType,
    #[serde(default)]
    ades_requirement: Option<AdesRequirement>,
    #[serde(default)]
    processing: ProcessingRequirement,
}

impl TryFrom<RawTbsDocument> for TbsDocument {
    type Error = Error;

    fn try_from(raw: RawTbsDocument) -> Result<Self> {
        let mut doc = Self::new(raw.id, raw.content, raw.mime_type)?;
        doc.ades_requirement = raw.ades_requirement;
        doc.with_processing(raw.processing)
    }
}

impl TbsDocument {
    /// Create a document; the id and content must be non-empty.
    pub fn new(id: impl Into<String>, content: Vec<u8>, document_type: DocumentType) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::validation("tbsDocument", "id must be set"));
        }
        if content.is_empty() {
            return Err(Error::validation(
                "tbsDocument",
                format!("document '{}' has no content", id),
            ));
        }
        Ok(Self {
            id,
            content,
            document_type,
            ades_requirement: None,
            processing: ProcessingRequirement::None,
        })
    }

    /// Attach an AdES requirement.
    pub fn with_ades_requirement(mut self, requirement: AdesRequirement) -> Self {
        self.ades_requirement = Some(requirement);
        self
    }

    /// Attach a processing requirement matching the document type.
    pub fn with_processing(mut self, processing: ProcessingRequirement) -> Result<Self> {
        if !processing.accepts(self.document_type) {
            return Err(Error::validation(
                "tbsDocument",
                format!(
                    "processing requirement does not apply to {} document '{}'",
                    self.document_type, self.id
                ),
            ));
        }
        self.processing = processing;
        Ok(self)
    }

    /// Caller-assigned identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Document bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Declared type.
    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    /// AdES requirement, if any.
    pub fn ades_requirement(&self) -> Option<&AdesRequirement> {
        self.ades_requirement.as_ref()
    }

    /// Processing requirement.
    pub fn processing(&self) -> &ProcessingRequirement {
        &self.processing
    }
}
