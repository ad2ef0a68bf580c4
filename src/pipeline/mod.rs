//! Sign request construction and sign response processing.
//!
//! Prepared documents become [`SignRequestEntry`] values of a [`SignRequest`],
//! which is encoded into [`SignRequestData`] for the signature service. The
//! caller keeps the [`SignatureState`] and hands it back with the
//! [`SignResponse`], whose signatures are correlated with the requested
//! documents by identifier.

mod attributes;
mod request;
mod response;
mod sign_message;

pub use attributes::{
    AuthnRequirements, CertificateAttributeMapping, CertificateType,
    RequestedCertificateAttribute, RequestedCertificateAttributeType, SignerAssertionInformation,
    SignerIdentityAttribute, SignerIdentityAttributeValue, SigningCertificateRequirements,
    DEFAULT_ATTRIBUTE_VALUE_TYPE, DEFAULT_NAME_FORMAT, SAML_TYPE,
};
pub use request::{
    SignRequest, SignRequestBuilder, SignRequestData, SignRequestEntry, SignRequestInput,
    SignRequestParameters, SignatureState, DEFAULT_BINDING,
};
pub use response::{
    ResponseSignature, ResponseStatus, SignResponse, SignResponseProcessor, SignatureResult,
    SignedDocument, RESULT_MAJOR_RESPONDER_ERROR, RESULT_MAJOR_SUCCESS, RESULT_MINOR_USER_CANCEL,
};
pub use sign_message::{SignMessageMimeType, SignMessageParameters};
