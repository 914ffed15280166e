pub mod geometry;
pub mod spatial;
pub mod target;

pub use geometry::{BoundingBox, GeometryError, Point, ScreenSize};
pub use spatial::{
    HorizontalPosition, RelativePosition, SpatialAnalyzer, SpatialInfo, VerticalPosition,
};
pub use target::{ActionTargetCalculator, SwipePath, TapTarget, DEFAULT_SAFETY_MARGIN};
