use crate::perception::BoundingBox;

pub const MIN_ICON_SIDE_PX: i32 = 16;
pub const MAX_ICON_SIDE_PX: i32 = 48;
pub const MIN_ICON_ASPECT: f64 = 0.7;
pub const MAX_ICON_ASPECT: f64 = 1.4;

/// Size and shape gate deciding whether a region looks like an icon.
///
/// Only regions that pass are allowed into the runtime discovery pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct SemanticIconFilter;

impl SemanticIconFilter {
    pub fn new() -> Self {
        Self
    }

    pub fn is_valid_icon(&self, region: &BoundingBox) -> bool {
        let side_ok = |side: i32| (MIN_ICON_SIDE_PX..=MAX_ICON_SIDE_PX).contains(&side);
        if !side_ok(region.width) || !side_ok(region.height) {
            return false;
        }

        let aspect = region.aspect_ratio();
        (MIN_ICON_ASPECT..=MAX_ICON_ASPECT).contains(&aspect)
    }
}
