//! Per-document visible signature requirements.

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::pipeline::SignerIdentityAttribute;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How the image's lower-left corner is chosen on its page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImagePosition {
    /// Fixed page coordinates
    Coordinates(Point),
    /// A slot of the signature page grid, or the first free slot when `None`
    Ordinal(Option<u32>),
}

/// Which page the image goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePlacement {
    /// The given 1-based page
    Explicit(usize),
    /// The first page with room, allocating a signature page when none has
    NextAvailable,
}

/// Attributes from which the signature service renders the signer name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerName {
    /// Attributes whose values make up the name
    pub signer_attributes: Vec<SignerIdentityAttribute>,
    /// Optional format string, e.g. `%1 %2 (%3)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatting: Option<String>,
}

/// Requirement for a visible signature image in a PDF document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawVisibleRequirement", into = "RawVisibleRequirement")]
pub struct VisiblePdfSignatureRequirement {
    template_ref: String,
    signer_name: Option<SignerName>,
    position: ImagePosition,
    page: PagePlacement,
    scale: Option<i32>,
    field_values: IndexMap<String, String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVisibleRequirement {
    template_image_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signer_name: Option<SignerName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x_position: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y_position: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ordinal: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale: Option<i32>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    field_values: IndexMap<String, String>,
}

impl TryFrom<RawVisibleRequirement> for VisiblePdfSignatureRequirement {
    type Error = Error;

    fn try_from(raw: RawVisibleRequirement) -> Result<Self> {
        let position = match (raw.x_position, raw.y_position, raw.ordinal) {
            (Some(x), Some(y), None) => ImagePosition::Coordinates(Point::new(x, y)),
            (None, None, ordinal) => ImagePosition::Ordinal(ordinal),
            (Some(_), Some(_), Some(_)) => {
                return Err(Error::validation(
                    OBJECT_NAME,
                    "coordinates and ordinal are mutually exclusive",
                ))
            },
            _ => {
                return Err(Error::validation(
                    OBJECT_NAME,
                    "xPosition and yPosition must be given together",
                ))
            },
        };
        let page = match raw.page {
            Some(page) => PagePlacement::Explicit(page),
            None => PagePlacement::NextAvailable,
        };

        let mut requirement = Self::new(raw.template_image_ref, position, page)?;
        if let Some(scale) = raw.scale {
            requirement = requirement.with_scale(scale)?;
        }
        requirement.signer_name = raw.signer_name;
        requirement.field_values = raw.field_values;
        Ok(requirement)
    }
}

impl From<VisiblePdfSignatureRequirement> for RawVisibleRequirement {
    fn from(req: VisiblePdfSignatureRequirement) -> Self {
        let (x_position, y_position, ordinal) = match req.position {
            ImagePosition::Coordinates(p) => (Some(p.x), Some(p.y), None),
            ImagePosition::Ordinal(ordinal) => (None, None, ordinal),
        };
        RawVisibleRequirement {
            template_image_ref: req.template_ref,
            signer_name: req.signer_name,
            x_position,
            y_position,
            ordinal,
            page: match req.page {
                PagePlacement::Explicit(page) => Some(page),
                PagePlacement::NextAvailable => None,
            },
            scale: req.scale,
            field_values: req.field_values,
        }
    }
}

const OBJECT_NAME: &str = "visiblePdfSignatureRequirement";

/// Lowest accepted zoom percentage; it shrinks the image to nothing.
pub const MIN_SCALE: i32 = -100;

impl VisiblePdfSignatureRequirement {
    /// Create a requirement for template `template_ref`.
    ///
    /// Explicit pages are 1-based, and ordinals start at 1.
    pub fn new(
        template_ref: impl Into<String>,
        position: ImagePosition,
        page: PagePlacement,
    ) -> Result<Self> {
        let template_ref = template_ref.into();
        if template_ref.trim().is_empty() {
            return Err(Error::validation(OBJECT_NAME, "templateImageRef must be set"));
        }
        if page == PagePlacement::Explicit(0) {
            return Err(Error::validation(OBJECT_NAME, "page numbers start at 1"));
        }
        match position {
            ImagePosition::Ordinal(Some(0)) => {
                return Err(Error::validation(OBJECT_NAME, "ordinals start at 1"));
            },
            ImagePosition::Coordinates(p) if p.x < 0.0 || p.y < 0.0 => {
                return Err(Error::validation(OBJECT_NAME, "coordinates must not be negative"));
            },
            _ => {},
        }
        Ok(Self {
            template_ref,
            signer_name: None,
            position,
            page,
            scale: None,
            field_values: IndexMap::new(),
        })
    }

    /// Set the zoom percentage (`-100` is zero size, `0` unchanged, `100` double).
    pub fn with_scale(mut self, scale: i32) -> Result<Self> {
        if scale < MIN_SCALE {
            return Err(Error::validation(
                OBJECT_NAME,
                format!("scale {} is below {}", scale, MIN_SCALE),
            ));
        }
        self.scale = Some(scale);
        Ok(self)
    }

    /// Set the signer name attributes.
    pub fn with_signer_name(mut self, signer_name: SignerName) -> Self {
        self.signer_name = Some(signer_name);
        self
    }

    /// Supply a value for a template field.
    pub fn with_field_value(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.field_values.insert(field.into(), value.into());
        self
    }

    /// Referenced image template.
    pub fn template_ref(&self) -> &str {
        &self.template_ref
    }

    /// Signer name attributes, if any.
    pub fn signer_name(&self) -> Option<&SignerName> {
        self.signer_name.as_ref()
    }

    /// Requested image position.
    pub fn position(&self) -> ImagePosition {
        self.position
    }

    /// Requested page.
    pub fn page(&self) -> PagePlacement {
        self.page
    }

    /// Requested zoom percentage, if set.
    pub fn scale(&self) -> Option<i32> {
        self.scale
    }

    /// Values for template fields, in insertion order.
    pub fn field_values(&self) -> &IndexMap<String, String> {
        &self.field_values
    }
}

fn default_fail_when_full() -> bool {
    true
}

/// Caller preferences for signature page handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfSignaturePagePreferences {
    /// Configured signature page to use instead of the default one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_page_reference: Option<String>,
    /// When false, a full page downgrades the signature to an invisible one
    #[serde(default = "default_fail_when_full")]
    pub fail_when_sign_page_full: bool,
}

impl Default for PdfSignaturePagePreferences {
    fn default() -> Self {
        Self {
            signature_page_reference: None,
            fail_when_sign_page_full: true,
        }
    }
}

/// Everything a PDF document needs for its visible signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfSignatureRequirement {
    /// The visible image
    pub visible: VisiblePdfSignatureRequirement,
    /// Signature page handling
    #[serde(default)]
    pub preferences: PdfSignaturePagePreferences,
}

impl PdfSignatureRequirement {
    /// Requirement with default page preferences.
    pub fn new(visible: VisiblePdfSignatureRequirement) -> Self {
        Self {
            visible,
            preferences: PdfSignaturePagePreferences::default(),
        }
    }

    /// Replace the page preferences.
    pub fn with_preferences(mut self, preferences: PdfSignaturePagePreferences) -> Self {
        self.preferences = preferences;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_inputs() {
        assert!(VisiblePdfSignatureRequirement::new(
            " ",
            ImagePosition::Ordinal(None),
            PagePlacement::NextAvailable
        )
        .is_err());
        assert!(VisiblePdfSignatureRequirement::new(
            "t",
            ImagePosition::Ordinal(Some(0)),
            PagePlacement::NextAvailable
        )
        .is_err());
        assert!(VisiblePdfSignatureRequirement::new(
            "t",
            ImagePosition::Ordinal(None),
            PagePlacement::Explicit(0)
        )
        .is_err());
        assert!(VisiblePdfSignatureRequirement::new(
            "t",
            ImagePosition::Coordinates(Point::new(-1.0, 10.0)),
            PagePlacement::Explicit(1)
        )
        .is_err());
    }

    #[test]
    fn test_scale_lower_bound() {
        let req = VisiblePdfSignatureRequirement::new(
            "t",
            ImagePosition::Ordinal(None),
            PagePlacement::NextAvailable,
        )
        .unwrap();
        assert!(req.clone().with_scale(-100).is_ok());
        assert!(req.with_scale(-101).is_err());
    }

    #[test]
    fn test_deserialize_coordinates() {
        let req: VisiblePdfSignatureRequirement = serde_json::from_str(
            r#"{"templateImageRef": "t", "xPosition": 100, "yPosition": 200, "page": 2, "scale": -50,
                "fieldValues": {"idp": "Example IdP"}}"#,
        )
        .unwrap();
        assert_eq!(req.position(), ImagePosition::Coordinates(Point::new(100.0, 200.0)));
        assert_eq!(req.page(), PagePlacement::Explicit(2));
        assert_eq!(req.scale(), Some(-50));
        assert_eq!(req.field_values()["idp"], "Example IdP");
    }

    #[test]
    fn test_deserialize_defaults_to_auto_placement() {
        let req: VisiblePdfSignatureRequirement =
            serde_json::from_str(r#"{"templateImageRef": "t"}"#).unwrap();
        assert_eq!(req.position(), ImagePosition::Ordinal(None));
        assert_eq!(req.page(), PagePlacement::NextAvailable);
        assert_eq!(req.scale(), None);
    }

    #[test]
    fn test_deserialize_rejects_partial_coordinates() {
        let result: std::result::Result<VisiblePdfSignatureRequirement, _> =
            serde_json::from_str(r#"{"templateImageRef": "t", "xPosition": 100}"#);
        assert!(result.is_err());

        let result: std::result::Result<VisiblePdfSignatureRequirement, _> = serde_json::from_str(
            r#"{"templateImageRef": "t", "xPosition": 1, "yPosition": 1, "ordinal": 2}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_keeps_shape() {
        let req = VisiblePdfSignatureRequirement::new(
            "t",
            ImagePosition::Ordinal(Some(3)),
            PagePlacement::NextAvailable,
        )
        .unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["templateImageRef"], "t");
        assert_eq!(json["ordinal"], 3);
        assert!(json.get("page").is_none());
        assert!(json.get("xPosition").is_none());
    }

    #[test]
    fn test_preferences_default_to_failing() {
        let prefs: PdfSignaturePagePreferences = serde_json::from_str("{}").unwrap();
        assert!(prefs.fail_when_sign_page_full);
        assert_eq!(prefs, PdfSignaturePagePreferences::default());
    }
}
