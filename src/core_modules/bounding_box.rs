// THEORY:
// The `bounding_box` module holds the one value type every stage of the board
// reconstruction engine speaks: an axis-aligned rectangle in integer pixel
// coordinates. Boxes are split, merged and replaced by new values all the way
// down the pipeline, so they are never referenced by identity, only by value.
//
// Key architectural principles:
// 1.  **Validated at the Boundary**: A `BoundingBox` can only be built through
//     `BoundingBox::new`, which rejects non-positive widths and heights. Once a
//     box exists, `area() > 0` holds for its whole lifetime.
// 2.  **One Numeric Type**: Coordinates are `i32` everywhere. Statistics derived
//     from boxes are `f64`, and the conversion back to pixels happens in exactly
//     one place (virtual box placement in the gap filler).
// 3.  **Provenance Tag**: `TaggedBox` pairs a box with whether it was observed in
//     the mask or inferred by the gap filler, so the render stage can draw
//     virtual boards differently.

use crate::error::BoardError;

/// A 2D pixel coordinate, as produced by contour tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle with a top-left origin and strictly positive size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl BoundingBox {
    /// Builds a box, rejecting zero or negative sizes.
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Result<Self, BoardError> {
        if w <= 0 || h <= 0 {
            return Err(BoardError::MalformedBox { x, y, w, h });
        }
        Ok(Self { x, y, w, h })
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.w
    }

    pub fn height(&self) -> i32 {
        self.h
    }

    /// Exclusive right edge (`x + w`).
    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    /// Exclusive bottom edge (`y + h`).
    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn area(&self) -> i64 {
        self.w as i64 * self.h as i64
    }

    /// Horizontal center, using integer division.
    pub fn center_x(&self) -> i32 {
        self.x + self.w / 2
    }

    /// Vertical center, using integer division.
    pub fn center_y(&self) -> i32 {
        self.y + self.h / 2
    }

    /// Area of the overlap between two boxes, zero when they are disjoint.
    pub fn intersection_area(&self, other: &BoundingBox) -> i64 {
        let ix = (self.right().min(other.right()) - self.x.max(other.x)).max(0);
        let iy = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0);
        ix as i64 * iy as i64
    }

    /// The minimal rectangle enclosing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        BoundingBox {
            x,
            y,
            w: self.right().max(other.right()) - x,
            h: self.bottom().max(other.bottom()) - y,
        }
    }

    /// True when `other` lies entirely inside this box (edges may touch).
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }
}

/// Whether a box was seen in the mask or estimated to fill a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxOrigin {
    Observed,
    Virtual,
}

/// A board region together with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaggedBox {
    pub bbox: BoundingBox,
    pub origin: BoxOrigin,
}

impl TaggedBox {
    pub fn observed(bbox: BoundingBox) -> Self {
        Self { bbox, origin: BoxOrigin::Observed }
    }

    pub fn synthetic(bbox: BoundingBox) -> Self {
        Self { bbox, origin: BoxOrigin::Virtual }
    }

    pub fn is_virtual(&self) -> bool {
        self.origin == BoxOrigin::Virtual
    }
}
