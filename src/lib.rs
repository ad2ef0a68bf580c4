// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::new_without_default)]
#![allow(clippy::result_large_err)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # SignService Integration
//!
//! Client-side core for integrating with a remote signature service: prepares
//! documents for signing, builds sign requests and interprets sign responses.
//!
//! ## Core Features
//!
//! ### Document Preparation
//! - **XML Signature Location**: resolve FIRST / LAST / BEFORE / AFTER directives
//!   against a named parent path, rejecting missing and ambiguous paths
//! - **Visible PDF Signatures**: grid-based auto-placement, explicit coordinates,
//!   overlap checks and signature page allocation when pages run full
//! - **Integrity Checks**: well-formedness for XML and JSON, header and page
//!   tree inspection for PDF
//!
//! ### Request/Response Pipeline
//! - **Sign Requests**: policy defaults, input validation with per-field details,
//!   base64-encoded request data with relay state
//! - **Sign Responses**: identifier correlation in request order, and distinct
//!   outcomes for user cancellation and service errors
//!
//! ## Quick Start
//!
//! ```
//! use signservice_integration::config::IntegrationConfig;
//! use signservice_integration::document::pdf::PageTreePdfHandler;
//! use signservice_integration::document::xml::{ChildPosition, XmlSignatureLocation};
//! use signservice_integration::document::{DocumentType, ProcessingRequirement, TbsDocument};
//! use signservice_integration::pipeline::{ResponseSignature, ResponseStatus, SignRequestInput, SignResponse};
//! use signservice_integration::SignServiceIntegration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IntegrationConfig::default()
//!     .with_sign_requester_id("https://sp.example.com")
//!     .with_return_url("https://sp.example.com/response")
//!     .with_destination_url("https://sig.example.com/request");
//! let service = SignServiceIntegration::new(config, PageTreePdfHandler::new())?;
//!
//! let location = XmlSignatureLocation::from_xpath("/Order/Signatures", ChildPosition::Last)?;
//! let document = TbsDocument::new(
//!     "order-1",
//!     b"<Order><Signatures/></Order>".to_vec(),
//!     DocumentType::Xml,
//! )?
//! .with_processing(ProcessingRequirement::Xml(location))?;
//!
//! let input = SignRequestInput {
//!     tbs_documents: vec![document],
//!     ..Default::default()
//! };
//! let data = service.create_sign_request(&input)?;
//!
//! // ... post `data` to the signature service and receive a response ...
//! let response = SignResponse {
//!     in_response_to: data.state.id.clone(),
//!     status: ResponseStatus::success(),
//!     signer_attributes: Vec::new(),
//!     signer_assertion_information: None,
//!     signatures: vec![ResponseSignature {
//!         document_id: "order-1".into(),
//!         signature: vec![1, 2, 3],
//!         signed_content: None,
//!     }],
//! };
//! let result = service.process_sign_response(&response, &data.state)?;
//! assert_eq!(result.signed_documents[0].id, "order-1");
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 (<http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license (<http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Geometry primitives
pub mod geometry;

// Documents and preparation
pub mod document;

// Sign request / response pipeline
pub mod pipeline;

// High-level API
pub mod service;

/// Serde adapters for base64 fields
pub mod serde_helpers;

// Re-exports
pub use error::{Error, Result};
pub use service::SignServiceIntegration;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
