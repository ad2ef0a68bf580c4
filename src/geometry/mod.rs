//! Geometric primitives for signature image placement.
//!
//! Coordinates are expressed in PDF user space units (points). A [`Rect`] is
//! anchored at its lower-left corner `(x, y)` and extends `width` to the right
//! and `height` upwards, matching how visible signature images are positioned
//! on a page.

use serde::{Deserialize, Serialize};

/// A 2D point in page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point.
    ///
    /// # Examples
    ///
    /// ```
    /// use signservice_integration::geometry::Point;
    ///
    /// let point = Point::new(10.0, 20.0);
    /// assert_eq!(point.x, 10.0);
    /// assert_eq!(point.y, 20.0);
    /// ```
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Width and height of a page or an image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width in points
    pub width: f32,
    /// Height in points
    pub height: f32,
}

impl Size {
    /// ISO A4 portrait, in points.
    pub const A4: Size = Size {
        width: 595.0,
        height: 842.0,
    };

    /// Create a new size.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Apply a zoom percentage to this size.
    ///
    /// `-100` yields a zero size, `0` leaves the size unchanged and `100`
    /// doubles it.
    ///
    /// # Examples
    ///
    /// ```
    /// use signservice_integration::geometry::Size;
    ///
    /// let size = Size::new(100.0, 50.0);
    /// assert_eq!(size.scaled(0), size);
    /// assert_eq!(size.scaled(100), Size::new(200.0, 100.0));
    /// assert_eq!(size.scaled(-50), Size::new(50.0, 25.0));
    /// ```
    pub fn scaled(&self, percent: i32) -> Size {
        let factor = (100 + percent).max(0) as f32 / 100.0;
        Size {
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Whether either dimension is zero or negative.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// An axis-aligned rectangle in page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// X coordinate of the lower-left corner
    pub x: f32,
    /// Y coordinate of the lower-left corner
    pub y: f32,
    /// Width of rectangle
    pub width: f32,
    /// Height of rectangle
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle from position and dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use signservice_integration::geometry::Rect;
    ///
    /// let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
    /// assert_eq!(rect.width, 100.0);
    /// assert_eq!(rect.height, 50.0);
    /// ```
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle of the given size anchored at `origin`.
    pub fn at(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// Get the left edge x-coordinate.
    pub fn left(&self) -> f32 {
        self.x
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Get the lower edge y-coordinate.
    pub fn bottom(&self) -> f32 {
        self.y
    }

    /// Get the upper edge y-coordinate.
    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    /// Check if this rectangle overlaps another.
    ///
    /// Two rectangles overlap iff both their x intervals and their y intervals
    /// intersect. Rectangles that only share an edge do not overlap.
    ///
    /// # Examples
    ///
    /// ```
    /// use signservice_integration::geometry::Rect;
    ///
    /// let r1 = Rect::new(0.0, 0.0, 100.0, 100.0);
    /// let r2 = Rect::new(50.0, 50.0, 100.0, 100.0);
    /// let r3 = Rect::new(100.0, 0.0, 100.0, 100.0);
    ///
    /// assert!(r1.intersects(&r2));
    /// assert!(!r1.intersects(&r3));
    /// ```
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && self.right() > other.left()
            && self.bottom() < other.top()
            && self.top() > other.bottom()
    }

    /// Check if this rectangle lies completely inside a page of the given size.
    ///
    /// # Examples
    ///
    /// ```
    /// use signservice_integration::geometry::{Rect, Size};
    ///
    /// let page = Size::new(595.0, 842.0);
    /// assert!(Rect::new(0.0, 0.0, 595.0, 842.0).fits_within(&page));
    /// assert!(!Rect::new(500.0, 0.0, 100.0, 50.0).fits_within(&page));
    /// ```
    pub fn fits_within(&self, page: &Size) -> bool {
        self.left() >= 0.0
            && self.bottom() >= 0.0
            && self.right() <= page.width
            && self.top() <= page.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges() {
        let r = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(r.left(), 10.0);
        assert_eq!(r.right(), 110.0);
        assert_eq!(r.bottom(), 20.0);
        assert_eq!(r.top(), 70.0);
    }

    #[test]
    fn test_rect_intersects_is_symmetric() {
        let r1 = Rect::new(0.0, 0.0, 100.0, 100.0);
        let r2 = Rect::new(50.0, 50.0, 100.0, 100.0);
        let r3 = Rect::new(200.0, 200.0, 100.0, 100.0);

        assert!(r1.intersects(&r2));
        assert!(r2.intersects(&r1));
        assert!(!r1.intersects(&r3));
        assert!(!r3.intersects(&r1));
    }

    #[test]
    fn test_rect_touching_edges_do_not_overlap() {
        let base = Rect::new(0.0, 0.0, 100.0, 50.0);
        let right = Rect::new(100.0, 0.0, 100.0, 50.0);
        let above = Rect::new(0.0, 50.0, 100.0, 50.0);

        assert!(!base.intersects(&right));
        assert!(!base.intersects(&above));
    }

    #[test]
    fn test_rect_overlap_requires_both_intervals() {
        // x intervals intersect, y intervals do not
        let a = Rect::new(0.0, 0.0, 100.0, 50.0);
        let b = Rect::new(50.0, 60.0, 100.0, 50.0);
        assert!(!a.intersects(&b));

        // y intervals intersect, x intervals do not
        let c = Rect::new(150.0, 10.0, 100.0, 50.0);
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_rect_contained_overlaps() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        let inner = Rect::new(10.0, 10.0, 10.0, 10.0);
        assert!(outer.intersects(&inner));
        assert!(inner.intersects(&outer));
    }

    #[test]
    fn test_fits_within() {
        let page = Size::A4;
        assert!(Rect::new(10.0, 10.0, 100.0, 50.0).fits_within(&page));
        assert!(!Rect::new(-1.0, 10.0, 100.0, 50.0).fits_within(&page));
        assert!(!Rect::new(10.0, 800.0, 100.0, 50.0).fits_within(&page));
    }

    #[test]
    fn test_size_scaled() {
        let size = Size::new(100.0, 50.0);
        assert_eq!(size.scaled(-100), Size::new(0.0, 0.0));
        assert!(size.scaled(-100).is_empty());
        assert_eq!(size.scaled(50), Size::new(150.0, 75.0));
        assert!(!size.is_empty());
    }
}
