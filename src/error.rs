//! Error types for the sign service integration library.
//!
//! Every failure produced while preparing documents, building sign requests or
//! processing sign responses is reported as a typed [`Error`] so callers can
//! branch on it programmatically. Each error also maps onto a stable
//! [`ErrorCode`] (`error.<category>.<code>`) and an HTTP-style status for
//! services that expose this library over a REST interface.

use std::collections::BTreeMap;
use std::fmt;

use crate::pipeline::ResponseStatus;

/// Result type alias for sign service integration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during document preparation and request processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A signature location path segment matched no element, or more than one
    #[error("Element not found: segment '{segment}' of path '{path}' matched {matches} elements")]
    ElementNotFound {
        /// The full parent path, rendered as an absolute path
        path: String,
        /// The segment that could not be resolved uniquely
        segment: String,
        /// Number of elements matching the segment (0 or more than 1)
        matches: usize,
    },

    /// The sibling referenced by a BEFORE/AFTER position is missing
    #[error("Sibling '{sibling}' not found under '{parent_path}'")]
    SiblingNotFound {
        /// The resolved parent path
        parent_path: String,
        /// The sibling element name that was looked up
        sibling: String,
    },

    /// XML document is not well-formed
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    /// The explicitly requested PDF page has no room for the signature image
    #[error("PDF signature page full: page {page} cannot accept another signature image")]
    PageFull {
        /// 1-based page number
        page: usize,
    },

    /// An explicit page number lies beyond the pages that exist or can be allocated
    #[error("Page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange {
        /// Requested 1-based page number
        page: usize,
        /// Page count at the time of the request
        page_count: usize,
    },

    /// A placement that can never fit, regardless of page occupancy
    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Unreadable or structurally broken PDF document
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Preparation of a single document failed
    #[error("Failed to prepare document '{document_id}': {source}")]
    Preparation {
        /// Identifier of the document being prepared
        document_id: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Caller supplied input failed validation
    #[error("{object_name}: {message}{}", details_suffix(.details))]
    InputValidation {
        /// Name of the object that failed validation
        object_name: String,
        /// Human readable message
        message: String,
        /// Per-field validation failures
        details: BTreeMap<String, String>,
    },

    /// The requested policy is not the one this integration is configured for
    #[error("Policy '{0}' does not exist")]
    PolicyNotFound(String),

    /// Response documents do not line up with the request documents
    #[error("Sign response mismatch: {0}")]
    ResponseMismatch(String),

    /// The user declined to sign
    #[error("User cancelled signature operation ({0})")]
    SignResponseCancelled(ResponseStatus),

    /// The signing backend reported a failure
    #[error("Sign response error status: {0}")]
    SignResponseError(ResponseStatus),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error
    #[error("UTF-8 decoding error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn details_suffix(details: &BTreeMap<String, String>) -> String {
    if details.is_empty() {
        return String::new();
    }
    let joined = details
        .iter()
        .map(|(field, reason)| format!("{}={}", field, reason))
        .collect::<Vec<_>>()
        .join(", ");
    format!(". Details: {{{}}}", joined)
}

impl Error {
    /// Create an input validation error without field details.
    pub fn validation(object_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InputValidation {
            object_name: object_name.into(),
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Create an input validation error carrying per-field details.
    pub fn validation_with_details(
        object_name: impl Into<String>,
        message: impl Into<String>,
        details: BTreeMap<String, String>,
    ) -> Self {
        Error::InputValidation {
            object_name: object_name.into(),
            message: message.into(),
            details,
        }
    }

    /// Wrap an error as a preparation failure of the given document.
    ///
    /// Errors that already are preparation failures are returned unchanged.
    pub fn preparation(document_id: impl Into<String>, source: Error) -> Self {
        match source {
            Error::Preparation { .. } => source,
            other => Error::Preparation {
                document_id: document_id.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through [`Error::Preparation`] wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Preparation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this error represents the user declining the signature operation.
    pub fn is_user_cancel(&self) -> bool {
        matches!(self.root_cause(), Error::SignResponseCancelled(_))
    }

    /// The stable error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Error::ElementNotFound { .. } => ErrorCode::new("document", "xml-element-not-found"),
            Error::SiblingNotFound { .. } => ErrorCode::new("document", "xml-sibling-not-found"),
            Error::MalformedXml(_) => ErrorCode::new("document", "invalid-xml"),
            Error::PageFull { .. } => ErrorCode::new("document", "too-many-signimages"),
            Error::PageOutOfRange { .. } | Error::InvalidPlacement(_) => {
                ErrorCode::new("document", "invalid-placement")
            },
            Error::InvalidHeader(_) | Error::InvalidPdf(_) => {
                ErrorCode::new("document", "invalid-pdf")
            },
            Error::Preparation { source, .. } => source.error_code(),
            Error::InputValidation { .. } => ErrorCode::new("bad-request", "validation"),
            Error::PolicyNotFound(_) => ErrorCode::new("bad-request", "missing-policy"),
            Error::ResponseMismatch(_) => ErrorCode::new("sign-response", "mismatch"),
            Error::SignResponseCancelled(_) => ErrorCode::new("sign-response", "user-cancel"),
            Error::SignResponseError(_) => ErrorCode::new("sign-response", "error-status"),
            Error::Unsupported(_) => ErrorCode::new("internal", "unsupported"),
            Error::Io(_) | Error::Utf8Error(_) | Error::Json(_) => {
                ErrorCode::new("internal", "error")
            },
        }
    }

    /// HTTP status a REST front-end should report for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::ElementNotFound { .. }
            | Error::SiblingNotFound { .. }
            | Error::MalformedXml(_)
            | Error::PageOutOfRange { .. }
            | Error::InvalidPlacement(_)
            | Error::InvalidHeader(_)
            | Error::InvalidPdf(_)
            | Error::InputValidation { .. } => 400,
            Error::PageFull { .. } => 403,
            Error::PolicyNotFound(_) => 404,
            Error::Preparation { source, .. } => source.http_status(),
            _ => 500,
        }
    }
}

/// A categorized error code, rendered as `error.<category>.<code>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    category: &'static str,
    code: &'static str,
}

impl ErrorCode {
    /// Prefix shared by all rendered error codes.
    pub const PREFIX: &'static str = "error.";

    /// Create an error code. The category must not contain a '.'.
    pub const fn new(category: &'static str, code: &'static str) -> Self {
        Self { category, code }
    }

    /// The error category (e.g. `document`).
    pub fn category(&self) -> &'static str {
        self.category
    }

    /// The code within the category (e.g. `too-many-signimages`).
    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.{}", Self::PREFIX, self.category, self.code)
    }
}
