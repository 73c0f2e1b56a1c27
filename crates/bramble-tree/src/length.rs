use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use text_size::{TextRange, TextSize};

/// Zero-based row and byte column.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub const ZERO: Self = Self { row: 0, column: 0 };

    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// Appends an extent: a later point on a new row resets the column.
impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if rhs.row > 0 {
            Self { row: self.row + rhs.row, column: rhs.column }
        } else {
            Self { row: self.row, column: self.column + rhs.column }
        }
    }
}

/// The extent from `rhs` to `self`; saturates at zero.
impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        if self.row > rhs.row {
            Self { row: self.row - rhs.row, column: self.column }
        } else {
            Self { row: 0, column: self.column.saturating_sub(rhs.column) }
        }
    }
}

/// A span of text measured both in bytes and in rows and columns.
///
/// Subtrees store lengths rather than absolute positions so that they stay
/// valid wherever an edit moves them.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Length {
    pub bytes: TextSize,
    pub extent: Point,
}

impl Length {
    pub const ZERO: Self = Self { bytes: TextSize::new(0), extent: Point::ZERO };

    pub const fn new(bytes: TextSize, extent: Point) -> Self {
        Self { bytes, extent }
    }

    /// Measures a byte string.
    pub fn of(text: &[u8]) -> Self {
        text.iter().fold(Self::ZERO, |length, &byte| length.advance(byte))
    }

    /// Extends the length by one byte.
    #[inline]
    #[must_use]
    pub fn advance(self, byte: u8) -> Self {
        let extent = if byte == b'\n' {
            Point::new(self.extent.row + 1, 0)
        } else {
            Point::new(self.extent.row, self.extent.column + 1)
        };
        Self { bytes: self.bytes + TextSize::new(1), extent }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.bytes == TextSize::new(0)
    }

    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if self.bytes <= rhs.bytes { Self::ZERO } else { self - rhs }
    }

    pub fn min(self, rhs: Self) -> Self {
        if rhs.bytes < self.bytes { rhs } else { self }
    }

    pub fn max(self, rhs: Self) -> Self {
        if rhs.bytes > self.bytes { rhs } else { self }
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}b/{:?}", u32::from(self.bytes), self.extent)
    }
}

impl Add for Length {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self { bytes: self.bytes + rhs.bytes, extent: self.extent + rhs.extent }
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Length {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            bytes: self.bytes.checked_sub(rhs.bytes).unwrap_or_default(),
            extent: self.extent - rhs.extent,
        }
    }
}

/// A region of the source in bytes and points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Range {
    pub bytes: TextRange,
    pub start_point: Point,
    pub end_point: Point,
}

impl Range {
    pub(crate) fn new(start: Length, end: Length) -> Self {
        Self {
            bytes: TextRange::new(start.bytes, end.bytes.max(start.bytes)),
            start_point: start.extent,
            end_point: end.extent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_arithmetic() {
        assert_eq!(Point::new(1, 4) + Point::new(0, 3), Point::new(1, 7));
        assert_eq!(Point::new(1, 4) + Point::new(2, 3), Point::new(3, 3));
        assert_eq!(Point::new(3, 3) - Point::new(1, 4), Point::new(2, 3));
        assert_eq!(Point::new(1, 7) - Point::new(1, 4), Point::new(0, 3));
        assert_eq!(Point::new(1, 2) - Point::new(1, 4), Point::ZERO);
    }

    #[test]
    fn measures_text() {
        let length = Length::of(b"ab\ncd\ne");
        assert_eq!(length.bytes, TextSize::new(7));
        assert_eq!(length.extent, Point::new(2, 1));
        assert_eq!(Length::of(b"ab") + Length::of(b"\nc"), Length::of(b"ab\nc"));
        assert_eq!(Length::of(b"ab\nc") - Length::of(b"ab"), Length::of(b"\nc"));
    }
}
