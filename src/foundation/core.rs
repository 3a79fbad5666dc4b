use crate::foundation::math::floor_div2;

/// Integer rectangle `[x, x + width) x [y, y + height)` in a shared pixel frame.
///
/// Widths and heights are never negative; a box with zero area carries no pixels.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PixelBox {
    /// Minimum (left) column, inclusive.
    pub x: i32,
    /// Minimum (top) row, inclusive.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl PixelBox {
    /// Create a box from its minimum corner and size. Negative sizes clamp to zero.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width: width.max(0),
            height: height.max(0),
        }
    }

    /// Create a box from inclusive minimum and exclusive maximum corners.
    pub fn from_corners(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Box of a `width x height` buffer placed at the origin.
    pub fn from_size(width: usize, height: usize) -> Self {
        Self::new(0, 0, to_i32(width), to_i32(height))
    }

    /// Exclusive maximum column.
    pub fn max_x(self) -> i32 {
        self.x + self.width
    }

    /// Exclusive maximum row.
    pub fn max_y(self) -> i32 {
        self.y + self.height
    }

    /// Return `true` when the box contains no pixels.
    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of pixels covered.
    pub fn area(self) -> usize {
        let (w, h) = self.size();
        w.saturating_mul(h)
    }

    /// Size as buffer dimensions.
    pub fn size(self) -> (usize, usize) {
        (self.width.max(0) as usize, self.height.max(0) as usize)
    }

    /// Return `true` when pixel `(x, y)` lies inside the box.
    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.max_x() && y >= self.y && y < self.max_y()
    }

    /// Return `true` when `other` lies entirely inside this box. Empty boxes are contained
    /// everywhere.
    pub fn contains_box(self, other: Self) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.max_x() <= self.max_x()
                && other.max_y() <= self.max_y())
    }

    /// Return `true` when the two boxes share at least one pixel.
    pub fn intersects(self, other: Self) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Overlap of the two boxes (possibly empty).
    pub fn intersect(self, other: Self) -> Self {
        Self::from_corners(
            self.x.max(other.x),
            self.y.max(other.y),
            self.max_x().min(other.max_x()),
            self.max_y().min(other.max_y()),
        )
    }

    /// Smallest box covering both boxes. Empty boxes do not contribute.
    pub fn grow(self, other: Self) -> Self {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other;
        }
        Self::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.max_x().max(other.max_x()),
            self.max_y().max(other.max_y()),
        )
    }

    /// Shift the box by `(dx, dy)`.
    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// The box one pyramid level down.
    ///
    /// A 3-tap blur sampled at even coordinates touches coarse pixel `X` iff some fine pixel in
    /// `[2X - 1, 2X + 1]` lies in the box, so `min -> floor(min / 2)` and
    /// `max -> floor(max / 2) + 1`. The same rule maps a patch box to the box its next level
    /// must cover for reconstruction.
    pub fn reduced(self) -> Self {
        if self.is_empty() {
            return Self::new(floor_div2(self.x), floor_div2(self.y), 0, 0);
        }
        Self::from_corners(
            floor_div2(self.x),
            floor_div2(self.y),
            floor_div2(self.max_x()) + 1,
            floor_div2(self.max_y()) + 1,
        )
    }

    /// The box one pyramid level up, padded by one pixel on the minimum side.
    ///
    /// Conservative inverse of [`PixelBox::reduced`]: any box whose reduction meets `self`
    /// meets `self.expanded()`.
    pub fn expanded(self) -> Self {
        Self::from_corners(
            2 * self.x - 1,
            2 * self.y - 1,
            2 * self.max_x(),
            2 * self.max_y(),
        )
    }
}

impl std::fmt::Display for PixelBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

pub(crate) fn to_i32(v: usize) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
