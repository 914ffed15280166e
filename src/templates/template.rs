use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    Icon,
    Button,
    Indicator,
    Other,
}

impl ElementType {
    /// Reference templates declare their type through a file-name prefix.
    pub fn from_file_stem(stem: &str) -> Self {
        let lowered = stem.to_lowercase();
        if lowered.starts_with("icon_") {
            ElementType::Icon
        } else if lowered.starts_with("button_") || lowered.starts_with("btn_") {
            ElementType::Button
        } else if lowered.starts_with("indicator_") {
            ElementType::Indicator
        } else {
            ElementType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Icon => "ICON",
            ElementType::Button => "BUTTON",
            ElementType::Indicator => "INDICATOR",
            ElementType::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "ICON" => ElementType::Icon,
            "BUTTON" => ElementType::Button,
            "INDICATOR" => ElementType::Indicator,
            _ => ElementType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateSource {
    /// Shipped with the agent and loaded once at startup.
    Reference,
    /// Learned from live screenshots after passing the stability gate.
    Runtime,
}

/// A reusable image patch matched against screenshots.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub element_type: ElementType,
    pub source: TemplateSource,
    pub image: Arc<RgbaImage>,
    pub signature: Option<String>,
    pub path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl Template {
    pub fn reference(name: impl Into<String>, element_type: ElementType, image: RgbaImage) -> Self {
        Self {
            name: name.into(),
            element_type,
            source: TemplateSource::Reference,
            image: Arc::new(image),
            signature: None,
            path: None,
            created_at: Utc::now(),
        }
    }

    /// Lowercase name tokens split on `_`, `-` and whitespace.
    pub fn name_tokens(&self) -> Vec<String> {
        tokenize(&self.name)
    }
}

pub fn tokenize(name: &str) -> Vec<String> {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}
