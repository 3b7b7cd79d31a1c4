//! Rectangle and point primitives in image pixel space.
//!
//! All rectangle operations return new values; nothing mutates in place.
//! Coordinates are signed so that [`Rect::expand`] can move an origin past
//! zero; [`Rect::clip`] snaps back into image bounds.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangular region of interest in full-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Rect {
    /// Constructs a rectangle from origin and size.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Constructs a rectangle from two corner points in any order.
    pub fn from_points(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    /// Right edge coordinate (`x + width`).
    pub fn x2(&self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge coordinate (`y + height`).
    pub fn y2(&self) -> i32 {
        self.y + self.height
    }

    /// Area in pixels.
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Center point with integer truncation.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Returns `true` when the rectangle has no extent in either axis.
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Point containment, half-open on the right/bottom edge.
    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        self.x <= px && px < self.x2() && self.y <= py && py < self.y2()
    }

    /// Overlap test; edge-only touches do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.x2() <= other.x
            || other.x2() <= self.x
            || self.y2() <= other.y
            || other.y2() <= self.y)
    }

    /// Overlapping region, or `None` when the rectangles are disjoint.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }

        Some(Rect::from_points(
            self.x.max(other.x),
            self.y.max(other.y),
            self.x2().min(other.x2()),
            self.y2().min(other.y2()),
        ))
    }

    /// Smallest rectangle containing both inputs.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_points(
            self.x.min(other.x),
            self.y.min(other.y),
            self.x2().max(other.x2()),
            self.y2().max(other.y2()),
        )
    }

    /// Scales width and height by `factor`, anchored at the top-left corner
    /// or at the center.
    pub fn scale(&self, factor: f64, from_center: bool) -> Rect {
        let new_width = (self.width as f64 * factor) as i32;
        let new_height = (self.height as f64 * factor) as i32;

        if from_center {
            let (cx, cy) = self.center();
            Rect::new(cx - new_width / 2, cy - new_height / 2, new_width, new_height)
        } else {
            Rect::new(self.x, self.y, new_width, new_height)
        }
    }

    /// Grows the rectangle by `pixels` in every direction. The origin may go
    /// negative; callers clip before use.
    pub fn expand(&self, pixels: i32) -> Rect {
        Rect::new(
            self.x - pixels,
            self.y - pixels,
            self.width + 2 * pixels,
            self.height + 2 * pixels,
        )
    }

    /// Snaps the rectangle into `[0, image_width] x [0, image_height]`.
    ///
    /// The result may collapse to zero width or height; callers treat a
    /// collapsed rectangle as an empty region and short-circuit.
    pub fn clip(&self, image_width: u32, image_height: u32) -> Rect {
        let iw = image_width as i32;
        let ih = image_height as i32;

        let x = self.x.clamp(0, iw);
        let y = self.y.clamp(0, ih);
        let x2 = self.x2().clamp(0, iw);
        let y2 = self.y2().clamp(0, ih);

        Rect::from_points(x, y, x2, y2)
    }

    /// Validates positive dimensions, non-negative origin, and (when bounds
    /// are given) containment within the image.
    pub fn is_valid(&self, bounds: Option<(u32, u32)>) -> bool {
        if self.width <= 0 || self.height <= 0 {
            return false;
        }

        if self.x < 0 || self.y < 0 {
            return false;
        }

        if let Some((image_width, image_height)) = bounds {
            if self.x2() > image_width as i32 || self.y2() > image_height as i32 {
                return false;
            }
        }

        true
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// 2D point in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Constructs a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for rectangle edge policies.

    use super::*;

    #[test]
    fn contains_point_is_half_open() {
        let rect = Rect::new(10, 10, 5, 5);
        assert!(rect.contains_point(10, 10));
        assert!(rect.contains_point(14, 14));
        assert!(!rect.contains_point(15, 10));
        assert!(!rect.contains_point(10, 15));
    }

    #[test]
    fn edge_touch_does_not_intersect() {
        let left = Rect::new(0, 0, 10, 10);
        let right = Rect::new(10, 0, 10, 10);
        assert!(!left.intersects(&right));
        assert!(left.intersection(&right).is_none());
    }

    #[test]
    fn intersection_of_overlapping_rects() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        let overlap = a.intersection(&b).expect("rects overlap");
        assert_eq!(overlap, Rect::new(5, 5, 5, 5));
    }

    #[test]
    fn union_is_bounding_rectangle() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(10, 10, 4, 4);
        assert_eq!(a.union(&b), Rect::new(0, 0, 14, 14));
    }

    #[test]
    fn clip_collapses_out_of_bounds_rect() {
        let rect = Rect::new(200, 200, 50, 50);
        let clipped = rect.clip(100, 100);
        assert!(clipped.is_empty());
    }

    #[test]
    fn clip_is_idempotent() {
        let rect = Rect::new(-10, -10, 200, 50);
        let once = rect.clip(100, 100);
        assert_eq!(once, once.clip(100, 100));
        assert_eq!(once, Rect::new(0, 0, 100, 40));
    }

    #[test]
    fn expand_may_go_negative_and_clip_recovers() {
        let rect = Rect::new(2, 2, 4, 4).expand(5);
        assert_eq!(rect, Rect::new(-3, -3, 14, 14));
        assert_eq!(rect.clip(100, 100), Rect::new(0, 0, 11, 11));
    }

    #[test]
    fn scale_from_center_keeps_midpoint() {
        let rect = Rect::new(10, 10, 10, 10);
        let scaled = rect.scale(2.0, true);
        assert_eq!(scaled.center(), rect.center());
        assert_eq!(scaled.width, 20);
    }

    #[test]
    fn serde_round_trip_preserves_rect() {
        let rect = Rect::new(3, 4, 20, 30);
        let json = serde_json::to_string(&rect).expect("rect should serialize");
        let back: Rect = serde_json::from_str(&json).expect("rect should deserialize");
        assert_eq!(back, rect);
    }

    #[test]
    fn is_valid_rejects_out_of_bounds() {
        let rect = Rect::new(90, 90, 20, 20);
        assert!(rect.is_valid(None));
        assert!(!rect.is_valid(Some((100, 100))));
        assert!(rect.is_valid(Some((110, 110))));
    }
}
