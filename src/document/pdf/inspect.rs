//! PDF inspection and signature page insertion.
//!
//! Preparation needs only a few facts about a PDF: that it is one, how many
//! pages it has and whether anything would break a signature. The
//! [`PdfDocumentHandler`] trait isolates those needs. [`PageTreePdfHandler`]
//! answers them from the cross-reference data and page tree parsed by
//! `lopdf`, and appends signature pages by merging their page objects into
//! the document's page tree.

use super::sign_page::PdfSignaturePage;
use crate::error::{Error, Result};
use lazy_static::lazy_static;
use lopdf::{Dictionary, Document, Object, ObjectId};
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Header line and version, e.g. "%PDF-1.7"
    static ref RE_HEADER: Regex = Regex::new(r"^%PDF-(\d+\.\d+)").unwrap();
}

/// Page attributes a page inherits from its ancestors in the page tree.
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Bound on walks up the page tree and down the form field tree.
const MAX_TREE_DEPTH: usize = 32;

/// Condition of a PDF that may affect signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PdfDocumentIssue {
    /// The document is encrypted
    EncryptionDictionary,
    /// The document has a form but no signature yet; filling it later would
    /// invalidate the signature
    AcroformInUnsignedPdf,
}

/// Facts about a PDF document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfDocumentInfo {
    /// Version from the header, e.g. "1.7"
    pub version: String,
    /// Number of pages
    pub page_count: usize,
    /// Whether the document already carries signatures
    pub signed: bool,
    /// Conditions that may affect signing
    pub issues: Vec<PdfDocumentIssue>,
}

/// Reads and extends PDF documents during preparation.
pub trait PdfDocumentHandler {
    /// Inspect `pdf`, failing for data that is not a PDF document.
    fn inspect(&self, pdf: &[u8]) -> Result<PdfDocumentInfo>;

    /// Append `sign_page` to `pdf`, returning the new document bytes.
    fn add_signature_page(&self, pdf: &[u8], sign_page: &PdfSignaturePage) -> Result<Vec<u8>>;
}

impl<T: PdfDocumentHandler + ?Sized> PdfDocumentHandler for &T {
    fn inspect(&self, pdf: &[u8]) -> Result<PdfDocumentInfo> {
        (**self).inspect(pdf)
    }

    fn add_signature_page(&self, pdf: &[u8], sign_page: &PdfSignaturePage) -> Result<Vec<u8>> {
        (**self).add_signature_page(pdf, sign_page)
    }
}

/// [`PdfDocumentHandler`] working on the parsed page tree.
///
/// Pages are counted by walking the page tree, so incremental updates and
/// object streams are handled. Signature pages are appended by rewriting the
/// whole document; documents that are encrypted or already signed are left
/// alone, since a rewrite would break them.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageTreePdfHandler;

impl PageTreePdfHandler {
    /// Create a handler.
    pub fn new() -> Self {
        Self
    }
}

impl PdfDocumentHandler for PageTreePdfHandler {
    fn inspect(&self, pdf: &[u8]) -> Result<PdfDocumentInfo> {
        let version = parse_version(pdf)?;
        let document = load(pdf)?;

        let page_count = document.get_pages().len();
        if page_count == 0 {
            return Err(Error::InvalidPdf("page tree has no pages".into()));
        }

        let form = acro_form(&document);
        let signed = form.map_or(false, |form| has_signature_field(&document, form));
        let mut issues = Vec::new();
        if is_encrypted(&document) {
            issues.push(PdfDocumentIssue::EncryptionDictionary);
        }
        if !signed && form.is_some() {
            issues.push(PdfDocumentIssue::AcroformInUnsignedPdf);
        }

        log::debug!(
            "Inspected PDF {} with {} pages (signed: {}, issues: {:?})",
            version,
            page_count,
            signed,
            issues
        );
        Ok(PdfDocumentInfo {
            version,
            page_count,
            signed,
            issues,
        })
    }

    fn add_signature_page(&self, pdf: &[u8], sign_page: &PdfSignaturePage) -> Result<Vec<u8>> {
        let contents = sign_page.contents.as_deref().ok_or_else(|| {
            Error::validation(
                format!("pdfSignaturePage[{}]", sign_page.id),
                "contents are required to append the signature page",
            )
        })?;

        let mut document = load(pdf)?;
        if is_encrypted(&document) {
            return Err(Error::Unsupported(
                "cannot append a signature page to an encrypted document".into(),
            ));
        }
        if acro_form(&document).map_or(false, |form| has_signature_field(&document, form)) {
            return Err(Error::Unsupported(
                "cannot append a signature page to a signed document".into(),
            ));
        }

        let mut addition = load(contents)
            .map_err(|e| Error::InvalidPdf(format!("signature page '{}': {}", sign_page.id, e)))?;
        addition.renumber_objects_with(document.max_id + 1);
        let added_pages: Vec<ObjectId> = addition.get_pages().into_values().collect();
        if added_pages.is_empty() {
            return Err(Error::InvalidPdf(format!(
                "signature page '{}' has no pages",
                sign_page.id
            )));
        }

        // Pages lose their own page tree, so inherited attributes move onto them
        for page_id in &added_pages {
            let inherited = inherited_attributes(&addition, *page_id);
            let page = addition
                .get_object_mut(*page_id)
                .and_then(Object::as_dict_mut)
                .map_err(pdf_error)?;
            for (key, value) in inherited {
                page.set(key, value);
            }
        }

        let pages_root = document
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(pdf_error)?;

        let added_max_id = addition.max_id;
        for (id, object) in addition.objects {
            if !is_tree_node(&object) {
                document.objects.insert(id, object);
            }
        }
        document.max_id = document.max_id.max(added_max_id);

        for page_id in &added_pages {
            let page = document
                .get_object_mut(*page_id)
                .and_then(Object::as_dict_mut)
                .map_err(pdf_error)?;
            page.set("Parent", Object::Reference(pages_root));
        }
        {
            let root = document
                .get_object_mut(pages_root)
                .and_then(Object::as_dict_mut)
                .map_err(pdf_error)?;
            let count = root.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
            let kids = root
                .get_mut(b"Kids")
                .and_then(Object::as_array_mut)
                .map_err(pdf_error)?;
            kids.extend(added_pages.iter().map(|id| Object::Reference(*id)));
            root.set("Count", count + added_pages.len() as i64);
        }

        let mut out = Vec::with_capacity(pdf.len() + contents.len());
        document
            .save_to(&mut out)
            .map_err(|e| Error::InvalidPdf(format!("cannot write document: {}", e)))?;
        log::debug!(
            "Appended {} page(s) of signature page '{}'",
            added_pages.len(),
            sign_page.id
        );
        Ok(out)
    }
}

fn parse_version(pdf: &[u8]) -> Result<String> {
    RE_HEADER
        .captures(pdf)
        .and_then(|caps| caps.get(1))
        .map(|version| String::from_utf8_lossy(version.as_bytes()).into_owned())
        .ok_or_else(|| {
            Error::InvalidHeader(String::from_utf8_lossy(&pdf[..pdf.len().min(8)]).into_owned())
        })
}

fn load(pdf: &[u8]) -> Result<Document> {
    Document::load_mem(pdf).map_err(pdf_error)
}

fn pdf_error(e: lopdf::Error) -> Error {
    Error::InvalidPdf(e.to_string())
}

fn is_encrypted(document: &Document) -> bool {
    document.trailer.has(b"Encrypt")
}

/// Follow one level of indirection.
fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        direct => Some(direct),
    }
}

fn acro_form(document: &Document) -> Option<&Dictionary> {
    let form = document.catalog().ok()?.get(b"AcroForm").ok()?;
    resolve(document, form)?.as_dict().ok()
}

fn has_signature_field(document: &Document, form: &Dictionary) -> bool {
    form.get(b"Fields")
        .ok()
        .and_then(|fields| resolve(document, fields))
        .and_then(|fields| fields.as_array().ok())
        .map_or(false, |fields| any_signed(document, fields, 0))
}

/// Whether a field in `fields`, or one of their descendants, is a filled
/// signature field.
fn any_signed(document: &Document, fields: &[Object], depth: usize) -> bool {
    if depth > MAX_TREE_DEPTH {
        return false;
    }
    fields
        .iter()
        .filter_map(|field| resolve(document, field).and_then(|f| f.as_dict().ok()))
        .any(|field| {
            let is_signature = field
                .get(b"FT")
                .and_then(Object::as_name)
                .map_or(false, |ft| ft == b"Sig");
            if is_signature && field.has(b"V") {
                return true;
            }
            field
                .get(b"Kids")
                .ok()
                .and_then(|kids| resolve(document, kids))
                .and_then(|kids| kids.as_array().ok())
                .map_or(false, |kids| any_signed(document, kids, depth + 1))
        })
}

/// Attributes `page_id` inherits but does not set itself.
fn inherited_attributes(document: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let Ok(page) = document.get_dictionary(page_id) else {
        return Vec::new();
    };
    let mut missing: Vec<&'static [u8]> = INHERITABLE_PAGE_KEYS
        .into_iter()
        .filter(|key| !page.has(key))
        .collect();
    let mut found = Vec::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let Some(node) = parent.and_then(|id| document.get_dictionary(id).ok()) else {
            break;
        };
        if missing.is_empty() {
            break;
        }
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((*key, value.clone()));
                false
            },
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    found
}

/// Catalog and page tree nodes of a merged document are replaced by the
/// target's own.
fn is_tree_node(object: &Object) -> bool {
    object
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|kind| kind.as_name().ok())
        .map_or(false, |kind| kind == b"Catalog" || kind == b"Pages")
}
