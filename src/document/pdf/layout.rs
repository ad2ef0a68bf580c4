//! Placement of visible signature images on PDF pages.
//!
//! The [`PageLayoutEngine`] decides where each signature image goes: on an
//! explicit page or the next page with room, at fixed coordinates or in a
//! slot of the signature page grid. Occupied regions are tracked per document
//! in a [`SignaturePageLayoutState`], so images never overlap. A placement
//! that fails leaves the state untouched.

use super::requirement::{ImagePosition, PagePlacement};
use crate::error::{Error, Result};
use crate::geometry::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest number of slots a grid may have.
pub const MAX_GRID_SLOTS: u32 = 10_000;

/// Row-major grid of image slots on a signature page.
///
/// Slot `k` (1-based) lies in column `(k - 1) % columns` and row
/// `(k - 1) / columns`, offset from the origin by the increments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    origin: Point,
    x_increment: f32,
    y_increment: f32,
    columns: u32,
    capacity: u32,
}

impl GridLayout {
    /// Create a grid without increments.
    ///
    /// Fails when either dimension is zero or the grid has more than
    /// [`MAX_GRID_SLOTS`] slots.
    pub fn new(origin: Point, rows: u32, columns: u32) -> Result<Self> {
        if rows == 0 || columns == 0 {
            return Err(Error::InvalidPlacement(format!(
                "grid must have at least one row and column, got {}x{}",
                rows, columns
            )));
        }
        let capacity = rows
            .checked_mul(columns)
            .filter(|capacity| *capacity <= MAX_GRID_SLOTS)
            .ok_or_else(|| {
                Error::InvalidPlacement(format!(
                    "grid of {}x{} exceeds {} slots",
                    rows, columns, MAX_GRID_SLOTS
                ))
            })?;
        Ok(Self {
            origin,
            x_increment: 0.0,
            y_increment: 0.0,
            columns,
            capacity,
        })
    }

    /// A grid with a single slot at `origin`.
    pub fn single(origin: Point) -> Self {
        Self {
            origin,
            x_increment: 0.0,
            y_increment: 0.0,
            columns: 1,
            capacity: 1,
        }
    }

    /// Set the per-column and per-row offsets.
    pub fn with_increments(mut self, x_increment: f32, y_increment: f32) -> Result<Self> {
        if !x_increment.is_finite() || !y_increment.is_finite() {
            return Err(Error::InvalidPlacement("grid increments must be finite".into()));
        }
        self.x_increment = x_increment;
        self.y_increment = y_increment;
        Ok(self)
    }

    /// Number of slots.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Lower-left corner of slot `ordinal`, or `None` outside `[1, capacity]`.
    pub fn slot_origin(&self, ordinal: u32) -> Option<Point> {
        if ordinal == 0 || ordinal > self.capacity() {
            return None;
        }
        let k = ordinal - 1;
        let column = (k % self.columns) as f32;
        let row = (k / self.columns) as f32;
        Some(Point::new(
            self.origin.x + column * self.x_increment,
            self.origin.y + row * self.y_increment,
        ))
    }
}

/// Static inputs of the layout engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSettings {
    /// Auto-placement grid
    pub grid: GridLayout,
    /// Page bounds every image must lie within
    pub page_size: Size,
}

/// One image to place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRequest {
    /// Image size after scaling
    pub size: Size,
    /// Requested position
    pub position: ImagePosition,
    /// Requested page
    pub page: PagePlacement,
}

/// Where an image ended up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// 1-based page number
    pub page: usize,
    /// Occupied region
    pub region: Rect,
    /// Grid slot, when the position was given by ordinal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<u32>,
    /// Whether a new signature page had to be allocated
    pub allocated_page: bool,
}

/// Occupancy of a page for a given request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// The page does not exist yet
    Unallocated,
    /// The request fits on the page
    Open,
    /// The request does not fit on the page
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PlacedRegion {
    region: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ordinal: Option<u32>,
}

/// Per-document record of placed images.
///
/// The page count only grows; pages allocated for earlier images stay
/// allocated. The state serializes so callers can persist it between
/// preparations of the same document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePageLayoutState {
    pages: BTreeMap<usize, Vec<PlacedRegion>>,
    page_count: usize,
}

impl SignaturePageLayoutState {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest page count seen or allocated.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Occupied regions on `page`, in placement order.
    pub fn regions(&self, page: usize) -> impl Iterator<Item = &Rect> {
        self.placed(page).iter().map(|placed| &placed.region)
    }

    /// Number of images placed across all pages.
    pub fn placement_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    fn placed(&self, page: usize) -> &[PlacedRegion] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Places signature images without overlap.
#[derive(Debug, Clone)]
pub struct PageLayoutEngine {
    settings: LayoutSettings,
}

impl PageLayoutEngine {
    /// Create an engine.
    pub fn new(settings: LayoutSettings) -> Self {
        Self { settings }
    }

    /// Engine settings.
    pub fn settings(&self) -> &LayoutSettings {
        &self.settings
    }

    /// Place one image and record it in `state`.
    ///
    /// `current_page_count` is the document's page count before any signature
    /// page is added. An explicit page that exists but has no room fails with
    /// [`Error::PageFull`]; the page right after the last one is allocated,
    /// anything beyond fails with [`Error::PageOutOfRange`]. Auto-placement
    /// scans the pages in order and allocates a new page when none has room.
    /// On error `state` is unchanged.
    pub fn place(
        &self,
        state: &mut SignaturePageLayoutState,
        current_page_count: usize,
        request: &PlacementRequest,
    ) -> Result<Placement> {
        self.validate(request)?;
        let page_count = current_page_count.max(state.page_count);

        let (page, (region, ordinal)) = match request.page {
            PagePlacement::Explicit(page) => {
                if page == 0 || page > page_count + 1 {
                    return Err(Error::PageOutOfRange { page, page_count });
                }
                let fit = self.fit(state, page, request).ok_or(Error::PageFull { page })?;
                (page, fit)
            },
            PagePlacement::NextAvailable => {
                let existing = (1..=page_count)
                    .find_map(|page| self.fit(state, page, request).map(|fit| (page, fit)));
                match existing {
                    Some(found) => found,
                    None => {
                        let page = page_count + 1;
                        let fit = self.fit(state, page, request).ok_or_else(|| {
                            Error::InvalidPlacement("image does not fit on an empty page".into())
                        })?;
                        (page, fit)
                    },
                }
            },
        };

        let allocated_page = page > page_count;
        state.page_count = page_count.max(page);
        state
            .pages
            .entry(page)
            .or_default()
            .push(PlacedRegion { region, ordinal });

        log::debug!(
            "Placed {}x{} image on page {} at ({}, {}){}",
            region.width,
            region.height,
            page,
            region.x,
            region.y,
            if allocated_page { " on a new page" } else { "" }
        );
        Ok(Placement {
            page,
            region,
            ordinal,
            allocated_page,
        })
    }

    /// Whether `request` would fit on `page`.
    pub fn page_state(
        &self,
        state: &SignaturePageLayoutState,
        current_page_count: usize,
        page: usize,
        request: &PlacementRequest,
    ) -> PageState {
        if page == 0 || page > current_page_count.max(state.page_count) {
            return PageState::Unallocated;
        }
        match self.fit(state, page, request) {
            Some(_) => PageState::Open,
            None => PageState::Full,
        }
    }

    /// Reject requests that could never be placed on any page.
    fn validate(&self, request: &PlacementRequest) -> Result<()> {
        let size = request.size;
        if size.is_empty() {
            return Err(Error::InvalidPlacement(format!(
                "image size {}x{} has no area",
                size.width, size.height
            )));
        }
        let bounds = &self.settings.page_size;
        match request.position {
            ImagePosition::Coordinates(origin) => {
                if !Rect::at(origin, size).fits_within(bounds) {
                    return Err(Error::InvalidPlacement(format!(
                        "image at ({}, {}) exceeds the page bounds",
                        origin.x, origin.y
                    )));
                }
            },
            ImagePosition::Ordinal(Some(ordinal)) => match self.slot(ordinal, size) {
                None => {
                    return Err(Error::InvalidPlacement(format!(
                        "ordinal {} exceeds the grid capacity {}",
                        ordinal,
                        self.settings.grid.capacity()
                    )))
                },
                Some(region) if !region.fits_within(bounds) => {
                    return Err(Error::InvalidPlacement(format!(
                        "grid slot {} exceeds the page bounds",
                        ordinal
                    )))
                },
                Some(_) => {},
            },
            ImagePosition::Ordinal(None) => {
                let any_slot = (1..=self.settings.grid.capacity())
                    .filter_map(|ordinal| self.slot(ordinal, size))
                    .any(|region| region.fits_within(bounds));
                if !any_slot {
                    return Err(Error::InvalidPlacement(
                        "no grid slot can hold the image within the page bounds".into(),
                    ));
                }
            },
        }
        Ok(())
    }

    /// Region (and slot) for `request` on `page`, if it is free.
    fn fit(
        &self,
        state: &SignaturePageLayoutState,
        page: usize,
        request: &PlacementRequest,
    ) -> Option<(Rect, Option<u32>)> {
        let occupied = state.placed(page);
        let is_free = |candidate: &Rect| !occupied.iter().any(|p| p.region.intersects(candidate));

        match request.position {
            ImagePosition::Coordinates(origin) => {
                let region = Rect::at(origin, request.size);
                is_free(&region).then_some((region, None))
            },
            ImagePosition::Ordinal(Some(ordinal)) => {
                let region = self.slot(ordinal, request.size)?;
                is_free(&region).then_some((region, Some(ordinal)))
            },
            ImagePosition::Ordinal(None) => (1..=self.settings.grid.capacity())
                .filter_map(|ordinal| self.slot(ordinal, request.size).map(|r| (r, ordinal)))
                .filter(|(region, _)| region.fits_within(&self.settings.page_size))
                .find(|(region, _)| is_free(region))
                .map(|(region, ordinal)| (region, Some(ordinal))),
        }
    }

    fn slot(&self, ordinal: u32, size: Size) -> Option<Rect> {
        self.settings
            .grid
            .slot_origin(ordinal)
            .map(|origin| Rect::at(origin, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(rows: u32, columns: u32) -> PageLayoutEngine {
        let grid = GridLayout::new(Point::new(50.0, 600.0), rows, columns)
            .unwrap()
            .with_increments(200.0, -100.0)
            .unwrap();
        PageLayoutEngine::new(LayoutSettings {
            grid,
            page_size: Size::A4,
        })
    }

    fn request(position: ImagePosition, page: PagePlacement) -> PlacementRequest {
        PlacementRequest {
            size: Size::new(150.0, 60.0),
            position,
            page,
        }
    }

    #[test]
    fn test_grid_slot_origins_are_row_major() {
        let grid = GridLayout::new(Point::new(10.0, 500.0), 2, 3)
            .unwrap()
            .with_increments(100.0, -50.0)
            .unwrap();
        assert_eq!(grid.capacity(), 6);
        assert_eq!(grid.slot_origin(1), Some(Point::new(10.0, 500.0)));
        assert_eq!(grid.slot_origin(3), Some(Point::new(210.0, 500.0)));
        assert_eq!(grid.slot_origin(4), Some(Point::new(10.0, 450.0)));
        assert_eq!(grid.slot_origin(0), None);
        assert_eq!(grid.slot_origin(7), None);
    }

    #[test]
    fn test_grid_rejects_empty_dimensions() {
        assert!(GridLayout::new(Point::new(0.0, 0.0), 0, 2).is_err());
        assert!(GridLayout::new(Point::new(0.0, 0.0), 2, 0).is_err());
    }

    #[test]
    fn test_grid_rejects_oversized_dimensions() {
        let err = GridLayout::new(Point::new(0.0, 0.0), 70_000, 70_000).unwrap_err();
        assert!(matches!(err, Error::InvalidPlacement(_)));
        assert!(GridLayout::new(Point::new(0.0, 0.0), u32::MAX, 2).is_err());
        assert!(GridLayout::new(Point::new(0.0, 0.0), 101, 100).is_err());

        let largest = GridLayout::new(Point::new(0.0, 0.0), 100, 100).unwrap();
        assert_eq!(largest.capacity(), MAX_GRID_SLOTS);
    }

    #[test]
    fn test_auto_placement_tiles_the_grid() {
        let engine = engine(2, 2);
        let mut state = SignaturePageLayoutState::new();
        let req = request(ImagePosition::Ordinal(None), PagePlacement::Explicit(1));

        let ordinals: Vec<_> = (0..4)
            .map(|_| engine.place(&mut state, 1, &req).unwrap().ordinal)
            .collect();
        assert_eq!(ordinals, vec![Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(state.placement_count(), 4);

        let err = engine.place(&mut state, 1, &req).unwrap_err();
        assert!(matches!(err, Error::PageFull { page: 1 }));
        assert_eq!(state.placement_count(), 4);
    }

    #[test]
    fn test_next_available_allocates_new_page() {
        let engine = engine(1, 1);
        let mut state = SignaturePageLayoutState::new();
        let req = request(ImagePosition::Ordinal(None), PagePlacement::NextAvailable);

        let first = engine.place(&mut state, 2, &req).unwrap();
        assert_eq!(first.page, 1);
        assert!(!first.allocated_page);

        let second = engine.place(&mut state, 2, &req).unwrap();
        assert_eq!(second.page, 2);

        let third = engine.place(&mut state, 2, &req).unwrap();
        assert_eq!(third.page, 3);
        assert!(third.allocated_page);
        assert_eq!(state.page_count(), 3);
    }

    #[test]
    fn test_explicit_page_bounds() {
        let engine = engine(1, 1);
        let mut state = SignaturePageLayoutState::new();

        let next = request(ImagePosition::Ordinal(Some(1)), PagePlacement::Explicit(3));
        let placed = engine.place(&mut state, 2, &next).unwrap();
        assert!(placed.allocated_page);

        let beyond = request(ImagePosition::Ordinal(Some(1)), PagePlacement::Explicit(5));
        let err = engine.place(&mut state, 2, &beyond).unwrap_err();
        assert!(matches!(
            err,
            Error::PageOutOfRange {
                page: 5,
                page_count: 3
            }
        ));
    }

    #[test]
    fn test_coordinates_overlap_is_page_full() {
        let engine = engine(1, 1);
        let mut state = SignaturePageLayoutState::new();
        let at = |x| request(ImagePosition::Coordinates(Point::new(x, 100.0)), PagePlacement::Explicit(1));

        engine.place(&mut state, 1, &at(100.0)).unwrap();
        // Touching the right edge is not an overlap
        engine.place(&mut state, 1, &at(250.0)).unwrap();

        let snapshot = state.clone();
        let err = engine.place(&mut state, 1, &at(200.0)).unwrap_err();
        assert!(matches!(err, Error::PageFull { page: 1 }));
        assert_eq!(state, snapshot);
    }

    #[test]
    fn test_invalid_placements_never_touch_state() {
        let engine = engine(2, 2);
        let mut state = SignaturePageLayoutState::new();

        let outside = request(
            ImagePosition::Coordinates(Point::new(500.0, 100.0)),
            PagePlacement::NextAvailable,
        );
        assert!(matches!(
            engine.place(&mut state, 1, &outside),
            Err(Error::InvalidPlacement(_))
        ));

        let bad_ordinal = request(ImagePosition::Ordinal(Some(5)), PagePlacement::NextAvailable);
        assert!(matches!(
            engine.place(&mut state, 1, &bad_ordinal),
            Err(Error::InvalidPlacement(_))
        ));

        let mut empty = request(ImagePosition::Ordinal(None), PagePlacement::NextAvailable);
        empty.size = Size::new(0.0, 0.0);
        assert!(engine.place(&mut state, 1, &empty).is_err());

        assert_eq!(state, SignaturePageLayoutState::new());
    }

    #[test]
    fn test_page_state() {
        let engine = engine(1, 1);
        let mut state = SignaturePageLayoutState::new();
        let req = request(ImagePosition::Ordinal(None), PagePlacement::Explicit(1));

        assert_eq!(engine.page_state(&state, 1, 1, &req), PageState::Open);
        assert_eq!(engine.page_state(&state, 1, 2, &req), PageState::Unallocated);
        engine.place(&mut state, 1, &req).unwrap();
        assert_eq!(engine.page_state(&state, 1, 1, &req), PageState::Full);
    }

    #[test]
    fn test_state_page_count_wins_over_stale_document_count() {
        let engine = engine(1, 1);
        let mut state = SignaturePageLayoutState::new();
        let req = request(ImagePosition::Ordinal(None), PagePlacement::NextAvailable);

        engine.place(&mut state, 1, &req).unwrap();
        engine.place(&mut state, 1, &req).unwrap();
        // Document bytes still report one page; the allocated page is remembered
        let third = engine.place(&mut state, 1, &req).unwrap();
        assert_eq!(third.page, 3);
    }
}
