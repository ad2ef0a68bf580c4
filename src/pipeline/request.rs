//! Sign request construction.

use super::attributes::{AuthnRequirements, SigningCertificateRequirements};
use super::sign_message::SignMessageParameters;
use crate::config::IntegrationConfig;
use crate::document::{AdesRequirement, DocumentType, PreparedDocument, PreparedPlacement, TbsDocument};
use crate::error::{Error, Result};
use crate::serde_helpers::{base64_bytes, encode_base64};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Binding identifier of the sign request message.
pub const DEFAULT_BINDING: &str = "POST/XML/1.0";

/// Caller input for a sign request. Unset values come from the configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignRequestInput {
    /// Caller correlation identifier, generated when absent
    pub correlation_id: Option<String>,
    /// Policy to use; must match the configured policy
    pub policy: Option<String>,
    /// Entity ID of the requesting service
    pub sign_requester_id: Option<String>,
    /// Where the signature service posts its response
    pub return_url: Option<String>,
    /// Where the request is posted
    pub destination_url: Option<String>,
    /// Signature algorithm URI
    pub signature_algorithm: Option<String>,
    /// Signer authentication requirements
    pub authn_requirements: Option<AuthnRequirements>,
    /// Signing certificate requirements
    pub certificate_requirements: Option<SigningCertificateRequirements>,
    /// Documents to sign
    pub tbs_documents: Vec<TbsDocument>,
    /// Message shown to the signer
    pub sign_message_parameters: Option<SignMessageParameters>,
}

/// Request-level values after defaulting and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SignRequestParameters {
    /// Correlation identifier
    pub correlation_id: String,
    /// Policy
    pub policy: String,
    /// Requesting service
    pub sign_requester_id: String,
    /// Response URL
    pub return_url: String,
    /// Request URL
    pub destination_url: String,
    /// Signature algorithm URI
    pub signature_algorithm: String,
    /// Signer authentication requirements
    pub authn_requirements: AuthnRequirements,
    /// Signing certificate requirements
    pub certificate_requirements: Option<SigningCertificateRequirements>,
    /// Message shown to the signer, with its display entity resolved
    pub sign_message_parameters: Option<SignMessageParameters>,
}

/// One document of a sign request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequestEntry {
    /// Caller-assigned document identifier
    pub id: String,
    /// Document type
    #[serde(rename = "mimeType")]
    pub document_type: DocumentType,
    /// Prepared document bytes
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    /// AdES requirement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ades_requirement: Option<AdesRequirement>,
    /// Resolved signature placement
    #[serde(default)]
    pub placement: PreparedPlacement,
}

impl From<PreparedDocument> for SignRequestEntry {
    fn from(doc: PreparedDocument) -> Self {
        let id = doc.id().to_string();
        let document_type = doc.document_type();
        let ades_requirement = doc.ades_requirement().cloned();
        let placement = doc.placement().clone();
        SignRequestEntry {
            id,
            document_type,
            content: doc.into_content(),
            ades_requirement,
            placement,
        }
    }
}

/// A sign request for the signature service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    /// Unique request identifier
    pub request_id: String,
    /// Caller correlation identifier
    pub correlation_id: String,
    /// Policy
    pub policy: String,
    /// Requesting service
    pub sign_requester_id: String,
    /// Response URL
    pub return_url: String,
    /// Signature algorithm URI
    pub signature_algorithm: String,
    /// Issue instant (RFC 3339)
    pub issue_instant: String,
    /// Signer authentication requirements
    pub authn_requirements: AuthnRequirements,
    /// Signing certificate requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_requirements: Option<SigningCertificateRequirements>,
    /// Message shown to the signer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_message_parameters: Option<SignMessageParameters>,
    /// One entry per document, in input order
    pub entries: Vec<SignRequestEntry>,
}

impl SignRequest {
    /// Document identifiers in request order.
    pub fn document_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }
}

/// State the caller keeps between request and response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureState {
    /// The request identifier
    pub id: String,
    /// Caller correlation identifier
    pub correlation_id: String,
    /// Document identifiers in request order
    pub document_ids: Vec<String>,
    /// Requested authentication service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authn_service_id: Option<String>,
    /// Requested authentication context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authn_context_ref: Option<String>,
}

/// What the caller posts to the signature service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequestData {
    /// State to keep for response processing
    pub state: SignatureState,
    /// Base64-encoded sign request
    pub sign_request: String,
    /// Relay state, equal to the request identifier
    pub relay_state: String,
    /// Message binding
    pub binding: String,
    /// Where to post the request
    pub destination_url: String,
}

impl SignRequestData {
    /// Encode `request` for posting to `destination_url`.
    pub fn new(request: &SignRequest, destination_url: impl Into<String>) -> Result<Self> {
        let encoded = encode_base64(&serde_json::to_vec(request)?);
        Ok(Self {
            state: SignatureState {
                id: request.request_id.clone(),
                correlation_id: request.correlation_id.clone(),
                document_ids: request.document_ids().map(str::to_string).collect(),
                authn_service_id: request.authn_requirements.authn_service_id.clone(),
                authn_context_ref: request.authn_requirements.authn_context_ref.clone(),
            },
            sign_request: encoded,
            relay_state: request.request_id.clone(),
            binding: DEFAULT_BINDING.to_string(),
            destination_url: destination_url.into(),
        })
    }

    /// Decode the carried sign request.
    pub fn decode_sign_request(&self) -> Result<SignRequest> {
        let bytes = STANDARD.decode(self.sign_request.as_bytes()).map_err(|e| {
            Error::validation("signRequestData", format!("signRequest is not base64: {}", e))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Builds sign requests from caller input and prepared documents.
pub struct SignRequestBuilder<'a> {
    config: &'a IntegrationConfig,
}

impl<'a> SignRequestBuilder<'a> {
    /// Create a builder for `config`.
    pub fn new(config: &'a IntegrationConfig) -> Self {
        Self { config }
    }

    /// Fill unset input values from the configuration and validate the result.
    ///
    /// All missing or invalid fields are reported together in the details of
    /// a single [`Error::InputValidation`].
    pub fn resolve(&self, input: &SignRequestInput) -> Result<SignRequestParameters> {
        let config = self.config;
        let policy = input.policy.clone().unwrap_or_else(|| config.policy.clone());
        if policy != config.policy {
            return Err(Error::PolicyNotFound(policy));
        }

        let mut details = BTreeMap::new();
        let non_blank = |v: &&String| !v.trim().is_empty();
        let mut required = |field: &str, value: Option<&String>, fallback: Option<&String>| {
            match value.filter(non_blank).or(fallback.filter(non_blank)) {
                Some(v) => v.clone(),
                None => {
                    details.insert(field.to_string(), "missing".to_string());
                    String::new()
                },
            }
        };
        let sign_requester_id = required(
            "signRequesterId",
            input.sign_requester_id.as_ref(),
            config.default_sign_requester_id.as_ref(),
        );
        let return_url = required(
            "returnUrl",
            input.return_url.as_ref(),
            config.default_return_url.as_ref(),
        );
        let destination_url = required(
            "destinationUrl",
            input.destination_url.as_ref(),
            config.default_destination_url.as_ref(),
        );
        let signature_algorithm = required(
            "signatureAlgorithm",
            input.signature_algorithm.as_ref(),
            Some(&config.default_signature_algorithm),
        );

        if input.tbs_documents.is_empty() {
            details.insert("tbsDocuments".to_string(), "at least one document is required".to_string());
        }
        let mut seen = HashSet::new();
        for doc in &input.tbs_documents {
            if !seen.insert(doc.id()) {
                details.insert(
                    format!("tbsDocuments[{}]", doc.id()),
                    "duplicate document id".to_string(),
                );
            }
        }

        let mut authn_requirements = input.authn_requirements.clone().unwrap_or_default();
        if authn_requirements.authn_service_id.is_none() {
            authn_requirements.authn_service_id = config.default_authn_service_id.clone();
        }
        if authn_requirements.authn_context_ref.is_none() {
            authn_requirements.authn_context_ref = config.default_authn_context_ref.clone();
        }

        let sign_message_parameters = input.sign_message_parameters.as_ref().map(|params| {
            params.resolve(authn_requirements.authn_service_id.as_deref(), &mut details)
        });

        if !details.is_empty() {
            return Err(Error::validation_with_details(
                "signRequestInput",
                "Invalid sign request input",
                details,
            ));
        }

        Ok(SignRequestParameters {
            correlation_id: input
                .correlation_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            policy,
            sign_requester_id,
            return_url,
            destination_url,
            signature_algorithm,
            authn_requirements,
            certificate_requirements: input
                .certificate_requirements
                .clone()
                .or_else(|| config.default_certificate_requirements.clone()),
            sign_message_parameters,
        })
    }

    /// Assemble the request; entries keep the order and identifiers of
    /// `documents`.
    pub fn build(
        &self,
        parameters: &SignRequestParameters,
        documents: Vec<PreparedDocument>,
    ) -> Result<SignRequest> {
        if documents.is_empty() {
            return Err(Error::validation("signRequest", "no documents to sign"));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = documents.iter().find(|doc| !seen.insert(doc.id().to_string())) {
            return Err(Error::validation(
                "signRequest",
                format!("duplicate document id '{}'", duplicate.id()),
            ));
        }

        let request = SignRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            correlation_id: parameters.correlation_id.clone(),
            policy: parameters.policy.clone(),
            sign_requester_id: parameters.sign_requester_id.clone(),
            return_url: parameters.return_url.clone(),
            signature_algorithm: parameters.signature_algorithm.clone(),
            issue_instant: chrono::Utc::now().to_rfc3339(),
            authn_requirements: parameters.authn_requirements.clone(),
            certificate_requirements: parameters.certificate_requirements.clone(),
            sign_message_parameters: parameters.sign_message_parameters.clone(),
            entries: documents.into_iter().map(SignRequestEntry::from).collect(),
        };
        log::info!(
            "Created sign request {} with {} documents (correlation {})",
            request.request_id,
            request.entries.len(),
            request.correlation_id
        );
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IntegrationConfig {
        IntegrationConfig::default()
            .with_sign_requester_id("https://sp.example.com")
            .with_return_url("https://sp.example.com/response")
            .with_destination_url("https://sig.example.com/request")
    }

    fn xml(id: &str) -> TbsDocument {
        TbsDocument::new(id, b"<Document/>".to_vec(), DocumentType::Xml).unwrap()
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let config = config().with_authn_service_id("https://idp.example.com");
        let input = SignRequestInput {
            return_url: Some("https://other.example.com".into()),
            tbs_documents: vec![xml("a")],
            ..Default::default()
        };

        let params = SignRequestBuilder::new(&config).resolve(&input).unwrap();
        assert_eq!(params.policy, config.policy);
        assert_eq!(params.sign_requester_id, "https://sp.example.com");
        assert_eq!(params.return_url, "https://other.example.com");
        assert_eq!(params.signature_algorithm, config.default_signature_algorithm);
        assert_eq!(
            params.authn_requirements.authn_service_id.as_deref(),
            Some("https://idp.example.com")
        );
        assert!(!params.correlation_id.is_empty());
    }

    #[test]
    fn test_blank_input_values_fall_back_to_defaults() {
        let config = config();
        let input = SignRequestInput {
            sign_requester_id: Some(String::new()),
            return_url: Some("   ".into()),
            tbs_documents: vec![xml("a")],
            ..Default::default()
        };

        let params = SignRequestBuilder::new(&config).resolve(&input).unwrap();
        assert_eq!(params.sign_requester_id, "https://sp.example.com");
        assert_eq!(params.return_url, "https://sp.example.com/response");
    }

    #[test]
    fn test_sign_message_is_carried_into_request() {
        let config = config().with_authn_service_id("https://idp.example.com");
        let builder = SignRequestBuilder::new(&config);
        let input = SignRequestInput {
            tbs_documents: vec![xml("a")],
            sign_message_parameters: Some(
                SignMessageParameters::new("I approve this contract")
                    .with_must_show(true)
                    .with_encryption(None),
            ),
            ..Default::default()
        };

        let params = builder.resolve(&input).unwrap();
        let message = params.sign_message_parameters.as_ref().unwrap();
        assert_eq!(message.display_entity.as_deref(), Some("https://idp.example.com"));

        let handler = crate::document::pdf::PageTreePdfHandler::new();
        let prepared = crate::document::DocumentPreparer::new(&config, &handler)
            .prepare(&input.tbs_documents[0])
            .unwrap();
        let request = builder.build(&params, vec![prepared]).unwrap();
        assert_eq!(request.sign_message_parameters.as_ref(), Some(message));
    }

    #[test]
    fn test_sign_message_must_show_requires_text() {
        let config = config();
        let input = SignRequestInput {
            tbs_documents: vec![xml("a")],
            sign_message_parameters: Some(SignMessageParameters::new("").with_must_show(true)),
            ..Default::default()
        };
        match SignRequestBuilder::new(&config).resolve(&input).unwrap_err() {
            Error::InputValidation { details, .. } => {
                assert_eq!(
                    details["signMessageParameters.signMessage"],
                    "required when mustShow is set"
                );
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_unknown_policy() {
        let config = config();
        let input = SignRequestInput {
            policy: Some("other".into()),
            tbs_documents: vec![xml("a")],
            ..Default::default()
        };
        let err = SignRequestBuilder::new(&config).resolve(&input).unwrap_err();
        assert!(matches!(err, Error::PolicyNotFound(p) if p == "other"));
    }

    #[test]
    fn test_resolve_collects_all_problems() {
        let config = IntegrationConfig::default();
        let input = SignRequestInput {
            tbs_documents: vec![xml("a"), xml("a")],
            ..Default::default()
        };
        let err = SignRequestBuilder::new(&config).resolve(&input).unwrap_err();
        match err {
            Error::InputValidation { details, .. } => {
                let fields: Vec<_> = details.keys().map(String::as_str).collect();
                assert_eq!(
                    fields,
                    vec!["destinationUrl", "returnUrl", "signRequesterId", "tbsDocuments[a]"]
                );
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sign_request_data_round_trip() {
        let config = config();
        let builder = SignRequestBuilder::new(&config);
        let input = SignRequestInput {
            correlation_id: Some("corr-1".into()),
            tbs_documents: vec![xml("a")],
            ..Default::default()
        };
        let params = builder.resolve(&input).unwrap();
        let handler = crate::document::pdf::PageTreePdfHandler::new();
        let prepared = crate::document::DocumentPreparer::new(&config, &handler)
            .prepare(&input.tbs_documents[0])
            .unwrap();

        let request = builder.build(&params, vec![prepared]).unwrap();
        let data = SignRequestData::new(&request, &params.destination_url).unwrap();

        assert_eq!(data.relay_state, request.request_id);
        assert_eq!(data.state.id, request.request_id);
        assert_eq!(data.state.correlation_id, "corr-1");
        assert_eq!(data.state.document_ids, vec!["a".to_string()]);
        assert_eq!(data.binding, DEFAULT_BINDING);
        assert_eq!(data.decode_sign_request().unwrap(), request);
        assert!(chrono::DateTime::parse_from_rfc3339(&request.issue_instant).is_ok());
    }
}
