//! Visible PDF signatures.
//!
//! A PDF document may request a visible signature image rendered from a
//! configured [`PdfSignatureImageTemplate`]. The image is placed on an
//! existing page or on a [`PdfSignaturePage`] appended to the document, by
//! the [`PageLayoutEngine`].

mod inspect;
mod layout;
mod requirement;
mod sign_page;
mod template;

pub use inspect::{PageTreePdfHandler, PdfDocumentHandler, PdfDocumentInfo, PdfDocumentIssue};
pub use layout::{
    GridLayout, LayoutSettings, PageLayoutEngine, PageState, Placement, PlacementRequest,
    SignaturePageLayoutState, MAX_GRID_SLOTS,
};
pub use requirement::{
    ImagePosition, PagePlacement, PdfSignaturePagePreferences, PdfSignatureRequirement,
    SignerName, VisiblePdfSignatureRequirement, MIN_SCALE,
};
pub use sign_page::{ImagePlacementConfiguration, PdfSignaturePage, MAX_GRID_DIMENSION};
pub use template::{PdfSignatureImageTemplate, SIGNER_NAME_FIELD_NAME, SIGNING_TIME_FIELD_NAME};
