use serde::{Deserialize, Serialize};

use crate::detection::ElementLocation;

use super::geometry::{BoundingBox, Point, ScreenSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizontalPosition {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalPosition {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativePosition {
    pub horizontal: HorizontalPosition,
    pub vertical: VerticalPosition,
}

/// Geometry derived from a single detection. Recomputed on every call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialInfo {
    pub center: Point,
    pub relative_position: RelativePosition,
    /// Box area in square pixels.
    pub size: i64,
    pub is_visible: bool,
    pub is_accessible: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SpatialAnalyzer;

impl SpatialAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, location: &ElementLocation) -> SpatialInfo {
        let bbox = &location.bounding_box;
        let center = bbox.center();
        let is_visible = bbox.is_within(location.screen_size);

        SpatialInfo {
            center,
            relative_position: relative_position(center, location.screen_size),
            size: bbox.area(),
            is_visible,
            // No occlusion model: anything fully on screen counts as reachable.
            is_accessible: is_visible,
        }
    }

    /// Euclidean distance between the centers of two detections.
    pub fn distance(&self, from: &ElementLocation, to: &ElementLocation) -> f64 {
        center_distance(&from.bounding_box, &to.bounding_box)
    }
}

pub(crate) fn center_distance(a: &BoundingBox, b: &BoundingBox) -> f64 {
    a.center().distance_to(b.center())
}

fn relative_position(center: Point, screen: ScreenSize) -> RelativePosition {
    let third_w = f64::from(screen.width) / 3.0;
    let third_h = f64::from(screen.height) / 3.0;
    let x = f64::from(center.x);
    let y = f64::from(center.y);

    let horizontal = if x < third_w {
        HorizontalPosition::Left
    } else if x < third_w * 2.0 {
        HorizontalPosition::Center
    } else {
        HorizontalPosition::Right
    };

    let vertical = if y < third_h {
        VerticalPosition::Top
    } else if y < third_h * 2.0 {
        VerticalPosition::Middle
    } else {
        VerticalPosition::Bottom
    };

    RelativePosition {
        horizontal,
        vertical,
    }
}
