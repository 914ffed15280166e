use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("bounding box must have positive extent, got {width}x{height}")]
    EmptyBox { width: i32, height: i32 },
    #[error("bounding box at ({x}, {y}) with size {width}x{height} exceeds the pixel range")]
    OutOfRange { x: i32, y: i32, width: i32, height: i32 },
    #[error("screen size must be positive, got {width}x{height}")]
    EmptyScreen { width: i32, height: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

impl ScreenSize {
    pub fn new(width: i32, height: i32) -> Result<Self, GeometryError> {
        if width <= 0 || height <= 0 {
            return Err(GeometryError::EmptyScreen { width, height });
        }
        Ok(Self { width, height })
    }
}

/// Axis-aligned pixel rectangle produced by a detector.
///
/// Width and height are always positive and the far edges fit in `i32`;
/// use [`BoundingBox::new`] to build one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Result<Self, GeometryError> {
        if width <= 0 || height <= 0 {
            return Err(GeometryError::EmptyBox { width, height });
        }
        if x.checked_add(width).is_none() || y.checked_add(height).is_none() {
            return Err(GeometryError::OutOfRange {
                x,
                y,
                width,
                height,
            });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }

    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    pub fn is_within(&self, screen: ScreenSize) -> bool {
        self.x >= 0 && self.y >= 0 && self.right() <= screen.width && self.bottom() <= screen.height
    }

    /// Same box moved down by `dy` pixels, stopping where the bottom edge
    /// would leave the pixel range.
    pub fn shifted_down(&self, dy: i32) -> Self {
        Self {
            y: self.y.saturating_add(dy).min(i32::MAX - self.height),
            ..*self
        }
    }
}
