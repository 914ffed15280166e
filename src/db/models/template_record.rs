use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::templates::{ElementType, Template, TemplateSource};

/// Catalog row for a persisted runtime template. The image itself lives
/// on disk at `image_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub signature: String,
    pub name: String,
    pub element_type: ElementType,
    pub image_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl TemplateRecord {
    /// Catalog row for a runtime template already written to disk. `None`
    /// when the template has no signature or no file.
    pub fn from_template(template: &Template) -> Option<Self> {
        Some(Self {
            signature: template.signature.clone()?,
            name: template.name.clone(),
            element_type: template.element_type,
            image_path: template.path.clone()?,
            created_at: template.created_at,
        })
    }

    /// Reads the image back from disk and rebuilds the runtime template.
    pub fn load_template(&self) -> Result<Template> {
        let image = image::open(&self.image_path)
            .with_context(|| format!("failed to read template image {}", self.image_path.display()))?
            .to_rgba8();
        Ok(Template {
            name: self.name.clone(),
            element_type: self.element_type,
            source: TemplateSource::Runtime,
            image: Arc::new(image),
            signature: Some(self.signature.clone()),
            path: Some(self.image_path.clone()),
            created_at: self.created_at,
        })
    }
}
