//! Sign messages: text the identity provider shows the signer before signing.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Format of a sign message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignMessageMimeType {
    /// Plain text
    #[default]
    Text,
    /// HTML
    Html,
    /// Markdown
    Markdown,
}

impl SignMessageMimeType {
    /// The MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            SignMessageMimeType::Text => "text",
            SignMessageMimeType::Html => "text/html",
            SignMessageMimeType::Markdown => "text/markdown",
        }
    }
}

impl fmt::Display for SignMessageMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

impl FromStr for SignMessageMimeType {
    type Err = Error;

    /// Accepts the MIME type in any case, or the upper-case type name.
    fn from_str(s: &str) -> Result<Self> {
        let by_mime_type = match s.to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "text/html" => Some(Self::Html),
            "text/markdown" => Some(Self::Markdown),
            _ => None,
        };
        let by_name = match s {
            "HTML" => Some(Self::Html),
            "MARKDOWN" => Some(Self::Markdown),
            _ => None,
        };
        by_mime_type.or(by_name).ok_or_else(|| {
            Error::validation(
                "signMessageParameters",
                format!("{} is not a valid MIME type for sign messages", s),
            )
        })
    }
}

impl Serialize for SignMessageMimeType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.mime_type())
    }
}

impl<'de> Deserialize<'de> for SignMessageMimeType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Sign message to include in a sign request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignMessageParameters {
    /// Message content, unencrypted, in the given MIME type
    pub sign_message: String,
    /// Encrypt the message for the display entity
    pub perform_encryption: bool,
    /// Message format; plain text when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<SignMessageMimeType>,
    /// The identity provider must refuse to proceed if it cannot show the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_show: Option<bool>,
    /// Entity ID of the identity provider displaying the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_entity: Option<String>,
}

impl SignMessageParameters {
    /// A plain text message.
    pub fn new(sign_message: impl Into<String>) -> Self {
        Self {
            sign_message: sign_message.into(),
            ..Default::default()
        }
    }

    /// Set the message format.
    pub fn with_mime_type(mut self, mime_type: SignMessageMimeType) -> Self {
        self.mime_type = Some(mime_type);
        self
    }

    /// Require the identity provider to show the message.
    pub fn with_must_show(mut self, must_show: bool) -> Self {
        self.must_show = Some(must_show);
        self
    }

    /// Encrypt the message for `display_entity`, or for the authentication
    /// service of the request when `None`.
    pub fn with_encryption(mut self, display_entity: Option<String>) -> Self {
        self.perform_encryption = true;
        self.display_entity = display_entity;
        self
    }

    /// Effective message format.
    pub fn effective_mime_type(&self) -> SignMessageMimeType {
        self.mime_type.unwrap_or_default()
    }

    /// Whether the message must be shown.
    pub fn is_must_show(&self) -> bool {
        self.must_show.unwrap_or(false)
    }

    /// Fill the display entity from `authn_service_id` and record problems
    /// in `details`.
    pub(crate) fn resolve(
        &self,
        authn_service_id: Option<&str>,
        details: &mut BTreeMap<String, String>,
    ) -> SignMessageParameters {
        let mut resolved = self.clone();
        if self.sign_message.trim().is_empty() {
            let problem = if self.is_must_show() {
                "required when mustShow is set"
            } else {
                "missing"
            };
            details.insert("signMessageParameters.signMessage".to_string(), problem.to_string());
        }
        if self.perform_encryption {
            let entity = self
                .display_entity
                .as_deref()
                .filter(|e| !e.trim().is_empty())
                .or(authn_service_id.filter(|e| !e.trim().is_empty()));
            match entity {
                Some(entity) => resolved.display_entity = Some(entity.to_string()),
                None => {
                    details.insert(
                        "signMessageParameters.displayEntity".to_string(),
                        "required for encryption when no authnServiceId is set".to_string(),
                    );
                },
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_parsing() {
        assert_eq!("TEXT/HTML".parse::<SignMessageMimeType>().unwrap(), SignMessageMimeType::Html);
        assert_eq!("MARKDOWN".parse::<SignMessageMimeType>().unwrap(), SignMessageMimeType::Markdown);
        assert_eq!("text".parse::<SignMessageMimeType>().unwrap(), SignMessageMimeType::Text);
        assert!("text/plain".parse::<SignMessageMimeType>().is_err());
    }

    #[test]
    fn test_json_shape() {
        let params: SignMessageParameters = serde_json::from_str(
            r#"{"signMessage": "I approve", "mimeType": "text/markdown", "mustShow": true}"#,
        )
        .unwrap();
        assert_eq!(params.effective_mime_type(), SignMessageMimeType::Markdown);
        assert!(params.is_must_show());
        assert!(!params.perform_encryption);

        let json = serde_json::to_string(&SignMessageParameters::new("Hi")).unwrap();
        assert_eq!(json, r#"{"signMessage":"Hi","performEncryption":false}"#);
    }

    #[test]
    fn test_resolve_display_entity() {
        let mut details = BTreeMap::new();
        let resolved = SignMessageParameters::new("I approve")
            .with_encryption(None)
            .resolve(Some("https://idp.example.com"), &mut details);
        assert!(details.is_empty());
        assert_eq!(resolved.display_entity.as_deref(), Some("https://idp.example.com"));

        let explicit = SignMessageParameters::new("I approve")
            .with_encryption(Some("https://proxy.example.com".into()))
            .resolve(Some("https://idp.example.com"), &mut details);
        assert_eq!(explicit.display_entity.as_deref(), Some("https://proxy.example.com"));

        SignMessageParameters::new("I approve")
            .with_encryption(None)
            .resolve(None, &mut details);
        assert!(details.contains_key("signMessageParameters.displayEntity"));
    }

    #[test]
    fn test_resolve_requires_message_to_show() {
        let mut details = BTreeMap::new();
        SignMessageParameters::new("  ")
            .with_must_show(true)
            .resolve(None, &mut details);
        assert_eq!(
            details.get("signMessageParameters.signMessage").map(String::as_str),
            Some("required when mustShow is set")
        );
    }
}
