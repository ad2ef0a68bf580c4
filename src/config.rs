//! Configuration for the sign service integration.

use crate::document::pdf::{PdfSignatureImageTemplate, PdfSignaturePage, MAX_GRID_DIMENSION};
use crate::error::{Error, Result};
use crate::geometry::Size;
use crate::pipeline::SigningCertificateRequirements;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Policy name used when none is configured.
pub const DEFAULT_POLICY: &str = "default";

/// RSA with SHA-256.
pub const DEFAULT_SIGNATURE_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

/// Policy-level defaults and PDF visible signature resources.
///
/// Values given in a sign request input override these defaults.
///
/// # Example
///
/// ```
/// use signservice_integration::config::IntegrationConfig;
///
/// let config = IntegrationConfig::from_json(r#"{
///     "policy": "my-policy",
///     "defaultReturnUrl": "https://sp.example.com/sign/response"
/// }"#)?;
/// assert_eq!(config.policy, "my-policy");
/// # Ok::<(), signservice_integration::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntegrationConfig {
    /// The policy this configuration applies to
    pub policy: String,

    /// Entity ID of the requesting service
    pub default_sign_requester_id: Option<String>,

    /// Where the signature service posts its response
    pub default_return_url: Option<String>,

    /// Where sign requests are posted
    pub default_destination_url: Option<String>,

    /// Signature algorithm URI
    pub default_signature_algorithm: String,

    /// Default authentication service (identity provider)
    pub default_authn_service_id: Option<String>,

    /// Default authentication context
    pub default_authn_context_ref: Option<String>,

    /// Default signing certificate requirements
    pub default_certificate_requirements: Option<SigningCertificateRequirements>,

    /// Visible signature image templates
    pub pdf_signature_image_templates: Vec<PdfSignatureImageTemplate>,

    /// Signature pages
    pub pdf_signature_pages: Vec<PdfSignaturePage>,

    /// Signature page used when a requirement names none (first page if unset)
    pub default_pdf_signature_page: Option<String>,

    /// Page size visible signature images must fit within
    pub page_bounds: Size,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            policy: DEFAULT_POLICY.to_string(),
            default_sign_requester_id: None,
            default_return_url: None,
            default_destination_url: None,
            default_signature_algorithm: DEFAULT_SIGNATURE_ALGORITHM.to_string(),
            default_authn_service_id: None,
            default_authn_context_ref: None,
            default_certificate_requirements: None,
            pdf_signature_image_templates: Vec::new(),
            pdf_signature_pages: Vec::new(),
            default_pdf_signature_page: None,
            page_bounds: Size::A4,
        }
    }

    /// Parse a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Set the policy name.
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = policy.into();
        self
    }

    /// Set the default sign requester.
    pub fn with_sign_requester_id(mut self, id: impl Into<String>) -> Self {
        self.default_sign_requester_id = Some(id.into());
        self
    }

    /// Set the default return URL.
    pub fn with_return_url(mut self, url: impl Into<String>) -> Self {
        self.default_return_url = Some(url.into());
        self
    }

    /// Set the default destination URL.
    pub fn with_destination_url(mut self, url: impl Into<String>) -> Self {
        self.default_destination_url = Some(url.into());
        self
    }

    /// Set the default authentication service.
    pub fn with_authn_service_id(mut self, id: impl Into<String>) -> Self {
        self.default_authn_service_id = Some(id.into());
        self
    }

    /// Add a signature image template.
    pub fn with_signature_image_template(mut self, template: PdfSignatureImageTemplate) -> Self {
        self.pdf_signature_image_templates.push(template);
        self
    }

    /// Add a signature page.
    pub fn with_signature_page(mut self, page: PdfSignaturePage) -> Self {
        self.pdf_signature_pages.push(page);
        self
    }

    /// Set the default signature page.
    pub fn with_default_signature_page(mut self, id: impl Into<String>) -> Self {
        self.default_pdf_signature_page = Some(id.into());
        self
    }

    /// Set the page bounds.
    pub fn with_page_bounds(mut self, bounds: Size) -> Self {
        self.page_bounds = bounds;
        self
    }

    /// Look up an image template by reference.
    pub fn signature_image_template(&self, reference: &str) -> Option<&PdfSignatureImageTemplate> {
        self.pdf_signature_image_templates
            .iter()
            .find(|t| t.reference == reference)
    }

    /// Look up a signature page; `None` selects the default page.
    pub fn signature_page(&self, id: Option<&str>) -> Option<&PdfSignaturePage> {
        match id.or(self.default_pdf_signature_page.as_deref()) {
            Some(id) => self.pdf_signature_pages.iter().find(|p| p.id == id),
            None => self.pdf_signature_pages.first(),
        }
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        let mut details = BTreeMap::new();
        if self.policy.trim().is_empty() {
            details.insert("policy".to_string(), "missing".to_string());
        }
        if self.default_signature_algorithm.trim().is_empty() {
            details.insert("defaultSignatureAlgorithm".to_string(), "missing".to_string());
        }
        if self.page_bounds.is_empty() {
            details.insert("pageBounds".to_string(), "must have an area".to_string());
        }

        let mut references = HashSet::new();
        for template in &self.pdf_signature_image_templates {
            if !references.insert(template.reference.as_str()) {
                details.insert(
                    format!("pdfSignatureImageTemplates[{}]", template.reference),
                    "duplicate reference".to_string(),
                );
            }
            if template.width == 0 || template.height == 0 {
                details.insert(
                    format!("pdfSignatureImageTemplates[{}]", template.reference),
                    "width and height must be positive".to_string(),
                );
            }
        }

        let mut ids = HashSet::new();
        for page in &self.pdf_signature_pages {
            let key = format!("pdfSignaturePages[{}]", page.id);
            if !ids.insert(page.id.as_str()) {
                details.insert(key.clone(), "duplicate id".to_string());
            }
            if let Some(reference) = &page.signature_image_reference {
                if !references.contains(reference.as_str()) {
                    details.insert(key.clone(), format!("unknown image template '{}'", reference));
                }
            }
            if page.rows > MAX_GRID_DIMENSION || page.columns > MAX_GRID_DIMENSION {
                details.insert(
                    key,
                    format!("rows and columns must not exceed {}", MAX_GRID_DIMENSION),
                );
            } else if let Err(e) = page.grid() {
                details.insert(key, root_message(&e));
            }
        }

        if let Some(id) = &self.default_pdf_signature_page {
            if !ids.contains(id.as_str()) {
                details.insert(
                    "defaultPdfSignaturePage".to_string(),
                    format!("unknown signature page '{}'", id),
                );
            }
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(Error::validation_with_details(
                "integrationConfig",
                format!("Invalid configuration for policy '{}'", self.policy),
                details,
            ))
        }
    }
}

fn root_message(error: &Error) -> String {
    match error {
        Error::InputValidation { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
