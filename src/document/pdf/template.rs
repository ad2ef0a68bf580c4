//! Templates for visible PDF signature images.

use crate::geometry::Size;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Field name under which the signer name is rendered.
pub const SIGNER_NAME_FIELD_NAME: &str = "signerName";

/// Field name under which the signing time is rendered.
pub const SIGNING_TIME_FIELD_NAME: &str = "signingTime";

/// A configured signature image template.
///
/// The image itself (typically SVG markup) is rendered by the signing backend;
/// this library only needs its reference, its dimensions and the fields a
/// caller may supply values for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfSignatureImageTemplate {
    /// Unique reference used by visible signature requirements
    pub reference: String,
    /// Image markup, opaque to this library
    #[serde(default)]
    pub image: String,
    /// Image width in points
    pub width: u32,
    /// Image height in points
    pub height: u32,
    /// Whether the template renders the signer name
    #[serde(default)]
    pub include_signer_name: bool,
    /// Whether the template renders the signing time
    #[serde(default)]
    pub include_signing_time: bool,
    /// Caller-supplied fields: name to description
    #[serde(default)]
    pub fields: IndexMap<String, String>,
}

impl PdfSignatureImageTemplate {
    /// Create a template without fields.
    pub fn new(reference: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            reference: reference.into(),
            image: String::new(),
            width,
            height,
            include_signer_name: false,
            include_signing_time: false,
            fields: IndexMap::new(),
        }
    }

    /// Declare a caller-supplied field.
    pub fn with_field(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.fields.insert(name.into(), description.into());
        self
    }

    /// Render the signer name in the image.
    pub fn with_signer_name(mut self) -> Self {
        self.include_signer_name = true;
        self
    }

    /// Unscaled image size.
    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }

    /// Whether the template accepts a value for `field`.
    pub fn accepts_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
            || (self.include_signer_name && field == SIGNER_NAME_FIELD_NAME)
            || (self.include_signing_time && field == SIGNING_TIME_FIELD_NAME)
    }
}
