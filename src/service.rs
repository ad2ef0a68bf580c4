//! High-level sign service integration API.

use crate::config::IntegrationConfig;
use crate::document::pdf::PdfDocumentHandler;
use crate::document::{DocumentPreparer, PreparedDocument, TbsDocument};
use crate::error::Result;
use crate::pipeline::{
    SignRequestBuilder, SignRequestData, SignRequestInput, SignResponse, SignResponseProcessor,
    SignatureResult, SignatureState,
};

/// Entry point tying document preparation and the request/response pipeline
/// to one configuration.
///
/// # Example
///
/// ```
/// use signservice_integration::config::IntegrationConfig;
/// use signservice_integration::document::pdf::PageTreePdfHandler;
/// use signservice_integration::document::{DocumentType, TbsDocument};
/// use signservice_integration::pipeline::SignRequestInput;
/// use signservice_integration::SignServiceIntegration;
///
/// let config = IntegrationConfig::default()
///     .with_sign_requester_id("https://sp.example.com")
///     .with_return_url("https://sp.example.com/response")
///     .with_destination_url("https://sig.example.com/request");
/// let service = SignServiceIntegration::new(config, PageTreePdfHandler::new())?;
///
/// let input = SignRequestInput {
///     tbs_documents: vec![TbsDocument::new("doc-1", b"<Doc/>".to_vec(), DocumentType::Xml)?],
///     ..Default::default()
/// };
/// let data = service.create_sign_request(&input)?;
/// assert_eq!(data.state.document_ids, vec!["doc-1".to_string()]);
/// # Ok::<(), signservice_integration::Error>(())
/// ```
pub struct SignServiceIntegration<H> {
    config: IntegrationConfig,
    pdf_handler: H,
}

impl<H: PdfDocumentHandler> SignServiceIntegration<H> {
    /// Create the service; the configuration is validated.
    pub fn new(config: IntegrationConfig, pdf_handler: H) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pdf_handler,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    /// Prepare documents independently; see [`DocumentPreparer::prepare_batch`].
    pub fn prepare_documents(&self, documents: &[TbsDocument]) -> Vec<Result<PreparedDocument>> {
        self.preparer().prepare_batch(documents)
    }

    /// Validate the input, prepare every document and build the sign request.
    ///
    /// The first document that fails preparation fails the request.
    pub fn create_sign_request(&self, input: &SignRequestInput) -> Result<SignRequestData> {
        let builder = SignRequestBuilder::new(&self.config);
        let parameters = builder.resolve(input)?;

        let prepared = self
            .prepare_documents(&input.tbs_documents)
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        for doc in &prepared {
            for warning in &doc.report().warnings {
                log::warn!("Document '{}': {:?}", doc.id(), warning);
            }
        }

        let request = builder.build(&parameters, prepared)?;
        SignRequestData::new(&request, parameters.destination_url)
    }

    /// Process the response to a request created by this service.
    pub fn process_sign_response(
        &self,
        response: &SignResponse,
        state: &SignatureState,
    ) -> Result<SignatureResult> {
        SignResponseProcessor::new().process(state, response)
    }

    fn preparer(&self) -> DocumentPreparer<'_, H> {
        DocumentPreparer::new(&self.config, &self.pdf_handler)
    }
}
