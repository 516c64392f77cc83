//! Points and rectangles in world and screen space.

use serde::{Deserialize, Serialize};

/// A point in the canvas's unbounded world space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    /// X in world units.
    pub x: f64,
    /// Y in world units.
    pub y: f64,
}

impl WorldPoint {
    /// Create a new world point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether both components are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(&self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A point in CSS pixels relative to the canvas surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    /// X in CSS pixels.
    pub x: f64,
    /// Y in CSS pixels.
    pub y: f64,
}

impl ScreenPoint {
    /// Create a new screen point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether both components are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Size of the rendering surface in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSize {
    /// Width in CSS pixels.
    pub width: f64,
    /// Height in CSS pixels.
    pub height: f64,
}

impl SurfaceSize {
    /// Create a new surface size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A surface with no usable area (zero, negative or non-finite).
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0)
    }
}

/// An axis-aligned rectangle in world units.
///
/// Width and height are never negative; constructors clamp them to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width (>= 0).
    pub width: f64,
    /// Height (>= 0).
    pub height: f64,
}

impl WorldRect {
    /// Create a rectangle, clamping negative sizes to zero.
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Create from two corners in any order.
    #[must_use]
    pub fn from_corners(a: WorldPoint, b: WorldPoint) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        Self::new(min_x, min_y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> WorldPoint {
        WorldPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the rectangle encloses no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Whether every coordinate is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Check if a point lies inside (edges inclusive).
    #[must_use]
    pub fn contains(&self, p: WorldPoint) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Check if two rectangles overlap.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// Smallest rectangle covering both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Self::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Union of an iterator of rectangles, `None` when empty.
    pub fn union_all<I>(rects: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        rects.into_iter().reduce(|acc, r| acc.union(&r))
    }

    /// Grow every side by the given amounts.
    #[must_use]
    pub fn expand(&self, dx: f64, dy: f64) -> Self {
        Self::new(
            self.x - dx,
            self.y - dy,
            self.width + 2.0 * dx,
            self.height + 2.0 * dy,
        )
    }

    /// Shrink to at most `max_width` x `max_height`, keeping the center.
    #[must_use]
    pub fn clamp_size_around(&self, center: WorldPoint, max_width: f64, max_height: f64) -> Self {
        if self.width <= max_width && self.height <= max_height {
            return *self;
        }
        let width = self.width.min(max_width);
        let height = self.height.min(max_height);
        Self::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }

    /// Aspect-preserving placement of a `content_w` x `content_h` box inside
    /// `self`, centered with letterbox bars on the short axis.
    ///
    /// Returns `None` when either box is empty.
    #[must_use]
    pub fn fit_centered(&self, content_w: f64, content_h: f64) -> Option<Self> {
        if self.is_empty() || content_w <= 0.0 || content_h <= 0.0 {
            return None;
        }
        let scale = (self.width / content_w).min(self.height / content_h);
        let w = content_w * scale;
        let h = content_h * scale;
        Some(Self::new(
            self.x + (self.width - w) / 2.0,
            self.y + (self.height - h) / 2.0,
            w,
            h,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_size_clamped() {
        let r = WorldRect::new(0.0, 0.0, -5.0, 10.0);
        assert_eq!(r.width, 0.0);
        assert!(r.is_empty());
    }

    #[test]
    fn test_union_and_contains() {
        let a = WorldRect::new(0.0, 0.0, 10.0, 10.0);
        let b = WorldRect::new(20.0, -5.0, 5.0, 5.0);
        let u = a.union(&b);
        assert_eq!(u, WorldRect::new(0.0, -5.0, 25.0, 15.0));
        assert!(u.contains(WorldPoint::new(22.0, -4.0)));
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_union_all_empty() {
        assert!(WorldRect::union_all(Vec::new()).is_none());
    }

    #[test]
    fn test_fit_centered_letterbox() {
        let frame = WorldRect::new(0.0, 0.0, 64.0, 64.0);
        let placed = frame.fit_centered(200.0, 100.0).expect("non-empty");
        assert!((placed.width - 64.0).abs() < 1e-9);
        assert!((placed.height - 32.0).abs() < 1e-9);
        assert!((placed.y - 16.0).abs() < 1e-9);
        assert!(frame.fit_centered(0.0, 10.0).is_none());
    }

    #[test]
    fn test_clamp_size_around_center() {
        let r = WorldRect::new(-500.0, 0.0, 1000.0, 10.0);
        let c = r.clamp_size_around(WorldPoint::new(0.0, 5.0), 600.0, 600.0);
        assert_eq!(c.width, 600.0);
        assert_eq!(c.x, -300.0);
        assert_eq!(c.height, 10.0);
    }

    #[test]
    fn test_degenerate_surface() {
        assert!(SurfaceSize::new(0.0, 600.0).is_degenerate());
        assert!(SurfaceSize::new(f64::NAN, 600.0).is_degenerate());
        assert!(!SurfaceSize::new(800.0, 600.0).is_degenerate());
    }
}
