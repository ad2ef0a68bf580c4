//! Signer identity and certificate attribute requirements.

use crate::serde_helpers::base64_bytes_opt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute type used when none is given.
pub const SAML_TYPE: &str = "saml";

/// Default SAML attribute name format (URI).
pub const DEFAULT_NAME_FORMAT: &str = "urn:oasis:names:tc:SAML:2.0:attrname-format:uri";

/// Default attribute value type.
pub const DEFAULT_ATTRIBUTE_VALUE_TYPE: &str = "string";

fn saml_type() -> String {
    SAML_TYPE.to_string()
}

/// Reference to a signer identity attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerIdentityAttribute {
    /// Attribute type, `saml` unless told otherwise
    #[serde(rename = "type", default = "saml_type")]
    pub attribute_type: String,
    /// Attribute name, e.g. `urn:oid:1.2.752.29.4.13`
    pub name: String,
}

impl SignerIdentityAttribute {
    /// A SAML attribute reference.
    pub fn saml(name: impl Into<String>) -> Self {
        Self {
            attribute_type: saml_type(),
            name: name.into(),
        }
    }
}

/// A signer identity attribute with its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerIdentityAttributeValue {
    /// Attribute type, `saml` unless told otherwise
    #[serde(rename = "type", default = "saml_type")]
    pub attribute_type: String,
    /// Attribute name
    pub name: String,
    /// Attribute value
    pub value: String,
    /// SAML name format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_format: Option<String>,
    /// Value type, e.g. `string` or `date`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_value_type: Option<String>,
}

impl SignerIdentityAttributeValue {
    /// A SAML string attribute with the default name format.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute_type: saml_type(),
            name: name.into(),
            value: value.into(),
            name_format: Some(DEFAULT_NAME_FORMAT.to_string()),
            attribute_value_type: Some(DEFAULT_ATTRIBUTE_VALUE_TYPE.to_string()),
        }
    }

    /// Whether this value is for the given attribute.
    pub fn is(&self, attribute: &SignerIdentityAttribute) -> bool {
        self.attribute_type == attribute.attribute_type && self.name == attribute.name
    }
}

/// Authentication requirements for the signer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthnRequirements {
    /// Authentication service (identity provider) entity ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authn_service_id: Option<String>,
    /// Requested authentication context (level of assurance)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authn_context_ref: Option<String>,
    /// Attributes the signer must authenticate with
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requested_signer_attributes: Vec<SignerIdentityAttributeValue>,
}

/// How the signer authenticated for the signature, as reported by the
/// signature service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerAssertionInformation {
    /// Authentication service (identity provider) that authenticated the signer
    pub authn_service_id: String,
    /// Authentication context (level of assurance) of the authentication
    pub authn_context_ref: String,
    /// When the signer was authenticated
    pub authn_instant: DateTime<Utc>,
    /// Authentication type, e.g. `saml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authn_type: Option<String>,
    /// Identifier of the assertion issued for the authentication
    pub assertion_reference: String,
    /// The assertion, when the service passes it back
    #[serde(default, with = "base64_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub assertion: Option<Vec<u8>>,
}

/// Type of signing certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CertificateType {
    /// Public key certificate
    #[default]
    #[serde(rename = "PKC")]
    Pkc,
    /// Qualified certificate
    #[serde(rename = "QC")]
    Qc,
    /// Qualified certificate on a secure signature creation device
    #[serde(rename = "QC/SSCD")]
    QcSscd,
}

/// Where a requested attribute goes in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedCertificateAttributeType {
    /// Subject distinguished name attribute
    Rdn,
    /// Subject alternative name
    San,
    /// Subject directory attribute
    Sda,
}

/// A certificate attribute to populate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedCertificateAttribute {
    /// Attribute location
    #[serde(rename = "type")]
    pub attribute_type: RequestedCertificateAttributeType,
    /// Attribute identifier (OID or SAN type)
    pub name: String,
    /// Value when no source attribute is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    /// Whether the attribute must be present
    #[serde(default)]
    pub required: bool,
}

/// Maps signer attributes onto a certificate attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAttributeMapping {
    /// Source attributes, in order of preference
    #[serde(default)]
    pub sources: Vec<SignerIdentityAttribute>,
    /// Target certificate attribute
    pub destination: RequestedCertificateAttribute,
}

/// Requirements on the signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SigningCertificateRequirements {
    /// Certificate type
    pub certificate_type: CertificateType,
    /// Attribute mappings
    pub attribute_mappings: Vec<CertificateAttributeMapping>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_type_defaults_to_saml() {
        let attr: SignerIdentityAttribute =
            serde_json::from_str(r#"{"name": "urn:oid:2.5.4.42"}"#).unwrap();
        assert_eq!(attr, SignerIdentityAttribute::saml("urn:oid:2.5.4.42"));

        let value = SignerIdentityAttributeValue::new("urn:oid:2.5.4.42", "Kalle");
        assert!(value.is(&attr));
    }

    #[test]
    fn test_certificate_type_names() {
        assert_eq!(serde_json::to_string(&CertificateType::QcSscd).unwrap(), "\"QC/SSCD\"");
        let parsed: CertificateType = serde_json::from_str("\"QC\"").unwrap();
        assert_eq!(parsed, CertificateType::Qc);
    }

    #[test]
    fn test_certificate_requirements_json() {
        let reqs: SigningCertificateRequirements = serde_json::from_str(
            r#"{
                "certificateType": "QC/SSCD",
                "attributeMappings": [{
                    "sources": [{"name": "urn:oid:1.2.752.29.4.13"}],
                    "destination": {"type": "rdn", "name": "2.5.4.5", "required": true}
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(reqs.certificate_type, CertificateType::QcSscd);
        let mapping = &reqs.attribute_mappings[0];
        assert_eq!(mapping.sources[0].attribute_type, SAML_TYPE);
        assert_eq!(mapping.destination.attribute_type, RequestedCertificateAttributeType::Rdn);
        assert!(mapping.destination.required);
    }

    #[test]
    fn test_signer_assertion_information_json() {
        let info: SignerAssertionInformation = serde_json::from_str(
            r#"{
                "authnServiceId": "https://idp.example.com",
                "authnContextRef": "http://id.elegnamnden.se/loa/1.0/loa3",
                "authnInstant": "2024-03-01T10:15:00Z",
                "assertionReference": "_a1b2c3",
                "assertion": "PEFzc2VydGlvbi8+"
            }"#,
        )
        .unwrap();
        assert_eq!(info.authn_instant.to_rfc3339(), "2024-03-01T10:15:00+00:00");
        assert_eq!(info.assertion.as_deref(), Some(&b"<Assertion/>"[..]));
        assert!(info.authn_type.is_none());
    }
}
