use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbaImage};
use uuid::Uuid;

use crate::perception::{BoundingBox, ScreenSize};

/// A decoded device frame. Cloning shares the pixel buffer.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub id: String,
    pub image: Arc<RgbaImage>,
    pub screen_size: ScreenSize,
    pub captured_at: DateTime<Utc>,
    /// Set once the frame has been written to disk.
    pub path: Option<PathBuf>,
}

impl Screenshot {
    pub fn new(image: RgbaImage, captured_at: DateTime<Utc>) -> Result<Self> {
        let screen_size = ScreenSize::new(image.width() as i32, image.height() as i32)
            .context("screenshot has no pixels")?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            image: Arc::new(image),
            screen_size,
            captured_at,
            path: None,
        })
    }

    pub fn from_png(png_bytes: &[u8], captured_at: DateTime<Utc>) -> Result<Self> {
        let decoded = image::load_from_memory_with_format(png_bytes, ImageFormat::Png)
            .context("failed to decode screenshot PNG")?;
        Self::new(decoded.to_rgba8(), captured_at)
    }

    /// Pixels under `bounds`, clipped to the frame. `None` when nothing overlaps.
    pub fn crop(&self, bounds: &BoundingBox) -> Option<RgbaImage> {
        let left = bounds.x.max(0);
        let top = bounds.y.max(0);
        let right = bounds.right().min(self.screen_size.width);
        let bottom = bounds.bottom().min(self.screen_size.height);
        if right <= left || bottom <= top {
            return None;
        }

        let view = image::imageops::crop_imm(
            self.image.as_ref(),
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        );
        Some(view.to_image())
    }

    pub fn save_png(&mut self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create screenshot directory {}", dir.display()))?;
        let path = dir.join(format!(
            "{}_{}.png",
            self.captured_at.format("%Y%m%dT%H%M%S%3f"),
            &self.id[..8]
        ));
        self.image
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("failed to write screenshot {}", path.display()))?;
        self.path = Some(path.clone());
        Ok(path)
    }
}
