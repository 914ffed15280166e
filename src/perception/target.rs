use serde::{Deserialize, Serialize};

use crate::detection::ElementLocation;

use super::geometry::Point;
use super::spatial::SpatialInfo;

pub const DEFAULT_SAFETY_MARGIN: i32 = 10;

const SWIPE_BASE_MS: f64 = 300.0;
const SWIPE_MIN_MS: f64 = 200.0;
const SWIPE_MAX_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TapTarget {
    pub x: i32,
    pub y: i32,
    pub confidence: f64,
    pub safety_margin: i32,
}

impl TapTarget {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipePath {
    pub start: Point,
    pub end: Point,
    pub duration_ms: u64,
}

/// Turns detections into touch coordinates that stay clear of element edges.
#[derive(Debug, Clone, Copy)]
pub struct ActionTargetCalculator {
    margin: i32,
}

impl Default for ActionTargetCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_SAFETY_MARGIN)
    }
}

impl ActionTargetCalculator {
    pub fn new(margin: i32) -> Self {
        Self {
            margin: margin.max(0),
        }
    }

    pub fn margin(&self) -> i32 {
        self.margin
    }

    /// Center of the element, pulled at least `margin` pixels inside its box.
    ///
    /// On an axis where the box is narrower than twice the margin, the safe
    /// range collapses to the box's own bounds.
    pub fn calculate_tap_target(&self, location: &ElementLocation, spatial: &SpatialInfo) -> TapTarget {
        self.target_at(location, spatial.center)
    }

    /// Input fields are tapped in their left third, where typed text begins.
    pub fn calculate_input_field_target(
        &self,
        location: &ElementLocation,
        spatial: &SpatialInfo,
    ) -> TapTarget {
        let bbox = &location.bounding_box;
        let biased = Point::new(bbox.x + bbox.width / 3, spatial.center.y);
        self.target_at(location, biased)
    }

    /// Swipe between two elements. Longer swipes take longer, within
    /// [200, 1000] ms.
    pub fn calculate_swipe_path(
        &self,
        from: &ElementLocation,
        from_spatial: &SpatialInfo,
        to: &ElementLocation,
        to_spatial: &SpatialInfo,
    ) -> SwipePath {
        let start = self.calculate_tap_target(from, from_spatial);
        let end = self.calculate_tap_target(to, to_spatial);
        let distance = from_spatial.center.distance_to(to_spatial.center);

        SwipePath {
            start: start.point(),
            end: end.point(),
            duration_ms: swipe_duration_ms(distance),
        }
    }

    fn target_at(&self, location: &ElementLocation, point: Point) -> TapTarget {
        let bbox = &location.bounding_box;
        TapTarget {
            x: clamp_axis(point.x, bbox.x, bbox.width, self.margin),
            y: clamp_axis(point.y, bbox.y, bbox.height, self.margin),
            confidence: location.confidence,
            safety_margin: self.margin,
        }
    }
}

pub fn swipe_duration_ms(distance: f64) -> u64 {
    (SWIPE_BASE_MS + distance.max(0.0) / 10.0).clamp(SWIPE_MIN_MS, SWIPE_MAX_MS) as u64
}

fn clamp_axis(value: i32, start: i32, extent: i32, margin: i32) -> i32 {
    let (lo, hi) = if extent >= margin.saturating_mul(2) {
        (start + margin, start + extent - margin)
    } else {
        (start, start + extent)
    };
    value.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionMethod;
    use crate::perception::{BoundingBox, ScreenSize, SpatialAnalyzer};

    fn located(x: i32, y: i32, w: i32, h: i32) -> (ElementLocation, SpatialInfo) {
        let location = ElementLocation::new(
            BoundingBox::new(x, y, w, h).unwrap(),
            0.8,
            DetectionMethod::Text,
            ScreenSize::new(1080, 1920).unwrap(),
        );
        let spatial = SpatialAnalyzer::new().analyze(&location);
        (location, spatial)
    }

    #[test]
    fn tap_on_square_box_hits_center() {
        let (location, spatial) = located(100, 100, 40, 40);
        let target = ActionTargetCalculator::default().calculate_tap_target(&location, &spatial);
        assert_eq!((target.x, target.y), (120, 120));
        assert_eq!(target.safety_margin, 10);
        assert!((target.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn tiny_box_collapses_to_box_bounds() {
        let (location, spatial) = located(50, 50, 12, 6);
        let target = ActionTargetCalculator::default().calculate_tap_target(&location, &spatial);
        assert!(location.bounding_box.contains(target.point()));
    }

    #[test]
    fn input_field_target_sits_in_left_third() {
        let (location, spatial) = located(0, 500, 600, 60);
        let target =
            ActionTargetCalculator::default().calculate_input_field_target(&location, &spatial);
        assert_eq!(target.x, 200);
        assert_eq!(target.y, 530);
    }

    #[test]
    fn swipe_duration_scales_with_distance() {
        assert_eq!(swipe_duration_ms(700.0), 370);
        assert_eq!(swipe_duration_ms(0.0), 300);
        assert_eq!(swipe_duration_ms(50_000.0), 1000);
    }

    #[test]
    fn swipe_path_uses_both_tap_targets() {
        let (from, from_spatial) = located(100, 1500, 200, 100);
        let (to, to_spatial) = located(100, 300, 200, 100);
        let path = ActionTargetCalculator::default()
            .calculate_swipe_path(&from, &from_spatial, &to, &to_spatial);
        assert_eq!(path.start, Point::new(200, 1550));
        assert_eq!(path.end, Point::new(200, 350));
        assert_eq!(path.duration_ms, 420);
    }
}
