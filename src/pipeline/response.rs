//! Sign response processing.

use super::attributes::{SignerAssertionInformation, SignerIdentityAttributeValue};
use super::request::SignatureState;
use crate::error::{Error, Result};
use crate::serde_helpers::{base64_bytes, base64_bytes_opt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Major status code of a successful response.
pub const RESULT_MAJOR_SUCCESS: &str = "urn:oasis:names:tc:dss:1.0:resultmajor:Success";

/// Major status code of a failure on the signature service side.
pub const RESULT_MAJOR_RESPONDER_ERROR: &str = "urn:oasis:names:tc:dss:1.0:resultmajor:ResponderError";

/// Minor status code of a user declining to sign.
pub const RESULT_MINOR_USER_CANCEL: &str = "http://id.elegnamnden.se/sig-status/1.0/user-cancel";

/// Status of a sign response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatus {
    /// Major result code
    pub major_code: String,
    /// Minor result code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor_code: Option<String>,
    /// Status message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResponseStatus {
    /// A success status.
    pub fn success() -> Self {
        Self {
            major_code: RESULT_MAJOR_SUCCESS.to_string(),
            minor_code: None,
            message: None,
        }
    }

    /// The status of a user declining to sign.
    pub fn user_cancel() -> Self {
        Self::error(
            RESULT_MAJOR_RESPONDER_ERROR,
            Some(RESULT_MINOR_USER_CANCEL.to_string()),
            Some("User cancelled".to_string()),
        )
    }

    /// A failure status.
    pub fn error(
        major_code: impl Into<String>,
        minor_code: Option<String>,
        message: Option<String>,
    ) -> Self {
        Self {
            major_code: major_code.into(),
            minor_code,
            message,
        }
    }

    /// Whether the status reports success.
    pub fn is_success(&self) -> bool {
        self.major_code == RESULT_MAJOR_SUCCESS
    }

    /// Whether the status reports the user declining to sign.
    pub fn is_user_cancel(&self) -> bool {
        self.minor_code.as_deref() == Some(RESULT_MINOR_USER_CANCEL)
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major_code)?;
        if let Some(minor) = &self.minor_code {
            write!(f, ", {}", minor)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

/// Signature over one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSignature {
    /// Identifier of the signed document
    pub document_id: String,
    /// Signature bytes
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    /// Signed document, for enveloped signatures
    #[serde(default, with = "base64_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub signed_content: Option<Vec<u8>>,
}

/// A sign response from the signature service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    /// Request identifier this responds to
    pub in_response_to: String,
    /// Result status
    pub status: ResponseStatus,
    /// Attributes the signer authenticated with
    #[serde(default)]
    pub signer_attributes: Vec<SignerIdentityAttributeValue>,
    /// The signer's authentication for the signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_assertion_information: Option<SignerAssertionInformation>,
    /// One signature per document
    #[serde(default)]
    pub signatures: Vec<ResponseSignature>,
}

/// A signed document, correlated with its request entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedDocument {
    /// Document identifier
    pub id: String,
    /// Signature bytes
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    /// Signed document bytes
    #[serde(default, with = "base64_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub signed_content: Option<Vec<u8>>,
}

/// Outcome of a successful signature operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureResult {
    /// Request identifier
    pub state_id: String,
    /// Caller correlation identifier
    pub correlation_id: String,
    /// Attributes the signer authenticated with
    pub signer_attributes: Vec<SignerIdentityAttributeValue>,
    /// The signer's authentication for the signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_assertion_information: Option<SignerAssertionInformation>,
    /// Signed documents in request order
    pub signed_documents: Vec<SignedDocument>,
}

/// Validates sign responses against the state of their request.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignResponseProcessor;

impl SignResponseProcessor {
    /// Create a processor.
    pub fn new() -> Self {
        Self
    }

    /// Check status and correlate signatures with the request documents.
    ///
    /// A cancelled operation fails with [`Error::SignResponseCancelled`], any
    /// other non-success with [`Error::SignResponseError`]. Signer assertion
    /// information, when present, must be complete and name the
    /// authentication service and context the request asked for.
    pub fn process(&self, state: &SignatureState, response: &SignResponse) -> Result<SignatureResult> {
        if response.in_response_to != state.id {
            return Err(Error::ResponseMismatch(format!(
                "response is for request '{}', expected '{}'",
                response.in_response_to, state.id
            )));
        }

        let status = &response.status;
        if !status.is_success() {
            if status.is_user_cancel() {
                log::info!("Sign request {} was cancelled by the user", state.id);
                return Err(Error::SignResponseCancelled(status.clone()));
            }
            log::warn!("Sign request {} failed: {}", state.id, status);
            return Err(Error::SignResponseError(status.clone()));
        }

        if let Some(info) = &response.signer_assertion_information {
            check_assertion(state, info)?;
        }
        let signed_documents = self.correlate(&state.document_ids, &response.signatures)?;
        log::info!(
            "Sign response for {} correlated {} documents",
            state.id,
            signed_documents.len()
        );
        Ok(SignatureResult {
            state_id: state.id.clone(),
            correlation_id: state.correlation_id.clone(),
            signer_attributes: response.signer_attributes.clone(),
            signer_assertion_information: response.signer_assertion_information.clone(),
            signed_documents,
        })
    }

    /// Pair each requested document, in request order, with its signature.
    ///
    /// Requested identifiers are checked in order, so the first requested
    /// document without exactly one signature is the one reported. Fails with
    /// [`Error::ResponseMismatch`] for a missing or repeated signature, and
    /// then for a signature naming a document that was not requested.
    pub fn correlate(
        &self,
        document_ids: &[String],
        signatures: &[ResponseSignature],
    ) -> Result<Vec<SignedDocument>> {
        let mut by_id: IndexMap<&str, Vec<&ResponseSignature>> =
            IndexMap::with_capacity(signatures.len());
        for signature in signatures {
            by_id.entry(signature.document_id.as_str()).or_default().push(signature);
        }

        let mut signed = Vec::with_capacity(document_ids.len());
        for id in document_ids {
            let matches = by_id.shift_remove(id.as_str()).unwrap_or_default();
            let signature = match matches.as_slice() {
                [signature] => *signature,
                [] => {
                    return Err(Error::ResponseMismatch(format!(
                        "no signature for document '{}'",
                        id
                    )))
                },
                repeated => {
                    return Err(Error::ResponseMismatch(format!(
                        "document '{}' appears {} times in the response",
                        id,
                        repeated.len()
                    )))
                },
            };
            signed.push(SignedDocument {
                id: id.clone(),
                signature: signature.signature.clone(),
                signed_content: signature.signed_content.clone(),
            });
        }

        if let Some((unknown, _)) = by_id.first() {
            return Err(Error::ResponseMismatch(format!(
                "response contains document '{}' that was not requested",
                unknown
            )));
        }
        Ok(signed)
    }
}

fn check_assertion(state: &SignatureState, info: &SignerAssertionInformation) -> Result<()> {
    let details: BTreeMap<String, String> = [
        ("authnServiceId", &info.authn_service_id),
        ("authnContextRef", &info.authn_context_ref),
        ("assertionReference", &info.assertion_reference),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| (field.to_string(), "missing".to_string()))
    .collect();
    if !details.is_empty() {
        return Err(Error::validation_with_details(
            "signerAssertionInformation",
            "Incomplete signer assertion information",
            details,
        ));
    }

    let expected = [
        ("authentication service", &state.authn_service_id, &info.authn_service_id),
        ("authentication context", &state.authn_context_ref, &info.authn_context_ref),
    ];
    for (what, requested, actual) in expected {
        if let Some(requested) = requested {
            if requested != actual {
                return Err(Error::ResponseMismatch(format!(
                    "signer authenticated with {} '{}', requested '{}'",
                    what, actual, requested
                )));
            }
        }
    }
    log::debug!(
        "Signer of {} authenticated by {} ({}) at {}",
        state.id,
        info.authn_service_id,
        info.authn_context_ref,
        info.authn_instant.to_rfc3339()
    );
    Ok(())
}
