//! PDF signature pages and their image grids.

use super::layout::GridLayout;
use crate::error::Result;
use crate::geometry::Point;
use crate::serde_helpers::base64_bytes_opt;
use serde::{Deserialize, Serialize};

/// Largest number of rows or columns a signature page may declare.
pub const MAX_GRID_DIMENSION: u32 = 100;

fn one() -> u32 {
    1
}

/// Where the first signature image goes and how subsequent images advance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePlacementConfiguration {
    /// X coordinate of the first image
    pub x_position: f32,
    /// Y coordinate of the first image
    pub y_position: f32,
    /// Added to the x coordinate for each new column
    #[serde(default)]
    pub x_increment: Option<f32>,
    /// Added to the y coordinate for each new row (negative moves down the page)
    #[serde(default)]
    pub y_increment: Option<f32>,
    /// Default zoom percentage for images on this page
    #[serde(default)]
    pub scale: i32,
}

/// A signature page that is appended to documents when visible signature
/// images no longer fit on the existing pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfSignaturePage {
    /// Unique page identifier
    pub id: String,
    /// The PDF holding the signature page, handed to the page writer
    #[serde(default, with = "base64_bytes_opt")]
    pub contents: Option<Vec<u8>>,
    /// Image rows the page supports
    #[serde(default = "one")]
    pub rows: u32,
    /// Image columns the page supports
    #[serde(default = "one")]
    pub columns: u32,
    /// Default image template for this page
    #[serde(default)]
    pub signature_image_reference: Option<String>,
    /// Grid origin and increments
    #[serde(default)]
    pub image_placement: ImagePlacementConfiguration,
}

impl PdfSignaturePage {
    /// Create a single-slot page placing its image at `(x, y)`.
    pub fn new(id: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            contents: None,
            rows: 1,
            columns: 1,
            signature_image_reference: None,
            image_placement: ImagePlacementConfiguration {
                x_position: x,
                y_position: y,
                ..Default::default()
            },
        }
    }

    /// Use a `rows` x `columns` grid advancing by the given increments.
    pub fn with_grid(mut self, rows: u32, columns: u32, x_increment: f32, y_increment: f32) -> Self {
        self.rows = rows;
        self.columns = columns;
        self.image_placement.x_increment = Some(x_increment);
        self.image_placement.y_increment = Some(y_increment);
        self
    }

    /// Attach the PDF contents of the page.
    pub fn with_contents(mut self, contents: Vec<u8>) -> Self {
        self.contents = Some(contents);
        self
    }

    /// Set the default image template.
    pub fn with_image_reference(mut self, reference: impl Into<String>) -> Self {
        self.signature_image_reference = Some(reference.into());
        self
    }

    /// Maximum number of signature images the page holds.
    pub fn max_signature_images(&self) -> u32 {
        self.rows.max(1).saturating_mul(self.columns.max(1))
    }

    /// The auto-placement grid described by this page.
    ///
    /// Increments are ignored for a single row or column; a grid with more
    /// rows (columns) than one needs the corresponding increment.
    pub fn grid(&self) -> Result<GridLayout> {
        let placement = &self.image_placement;
        let origin = Point::new(placement.x_position, placement.y_position);
        let x_increment = if self.columns > 1 { placement.x_increment } else { Some(0.0) };
        let y_increment = if self.rows > 1 { placement.y_increment } else { Some(0.0) };

        GridLayout::new(origin, self.rows, self.columns)?.with_increments(
            x_increment.ok_or_else(|| missing_increment(&self.id, "xIncrement"))?,
            y_increment.ok_or_else(|| missing_increment(&self.id, "yIncrement"))?,
        )
    }
}

fn missing_increment(id: &str, field: &str) -> crate::error::Error {
    crate::error::Error::validation(
        format!("pdfSignaturePage[{}]", id),
        format!("{} is required for a multi-slot grid", field),
    )
}
