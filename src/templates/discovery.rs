use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbaImage};

use crate::bridge::{RegionDetector, Screenshot};
use crate::perception::Point;

use super::filter::SemanticIconFilter;
use super::signature::compute_signature;
use super::template::{ElementType, Template, TemplateSource};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Rule a signature must satisfy before it is trusted as a template.
#[derive(Debug, Clone, Copy)]
pub struct StabilityGate {
    pub min_appearances: usize,
    pub min_span_ms: i64,
    pub max_deviation_px: f64,
}

impl Default for StabilityGate {
    fn default() -> Self {
        Self {
            min_appearances: 3,
            min_span_ms: 2000,
            max_deviation_px: 10.0,
        }
    }
}

/// A history with no consistent sighting for this long is dropped.
pub const STALE_HISTORY_MS: i64 = 10_000;
/// Sightings kept per signature; the first and latest always stay.
pub const MAX_TRACKED_APPEARANCES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Appearance {
    pub location: Point,
    pub seen_at: DateTime<Utc>,
}

/// Sightings of one signature near the place it was first seen.
#[derive(Debug, Clone)]
pub struct ElementHistory {
    pub signature: String,
    pub appearances: Vec<Appearance>,
    pub first_seen: DateTime<Utc>,
    latest_crop: Arc<RgbaImage>,
}

impl ElementHistory {
    fn new(signature: String, appearance: Appearance, crop: RgbaImage) -> Self {
        Self {
            signature,
            first_seen: appearance.seen_at,
            appearances: vec![appearance],
            latest_crop: Arc::new(crop),
        }
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.appearances
            .last()
            .map(|last| last.seen_at)
            .unwrap_or(self.first_seen)
    }

    fn is_stale_at(&self, at: DateTime<Utc>) -> bool {
        (at - self.last_seen()).num_milliseconds() >= STALE_HISTORY_MS
    }

    fn is_near_first(&self, location: Point, max_deviation_px: f64) -> bool {
        self.appearances
            .first()
            .is_some_and(|first| first.location.distance_to(location) <= max_deviation_px)
    }

    fn push(&mut self, appearance: Appearance, crop: RgbaImage) {
        if self.appearances.len() >= MAX_TRACKED_APPEARANCES {
            self.appearances.remove(1);
        }
        self.appearances.push(appearance);
        self.latest_crop = Arc::new(crop);
    }

    pub fn span_ms(&self) -> i64 {
        self.appearances
            .last()
            .map(|last| (last.seen_at - self.first_seen).num_milliseconds())
            .unwrap_or(0)
    }

    pub fn is_stable(&self, gate: &StabilityGate) -> bool {
        let Some(first) = self.appearances.first() else {
            return false;
        };

        self.appearances.len() >= gate.min_appearances
            && self.span_ms() >= gate.min_span_ms
            && self
                .appearances
                .iter()
                .all(|a| a.location.distance_to(first.location) <= gate.max_deviation_px)
    }
}

/// Learns icon templates from live screenshots.
///
/// Candidates accumulate per signature and are promoted once, only after the
/// [`StabilityGate`] holds. The validated set only ever grows.
pub struct RuntimeTemplateDiscovery {
    detector: Arc<dyn RegionDetector>,
    filter: SemanticIconFilter,
    gate: StabilityGate,
    histories: HashMap<String, ElementHistory>,
    promoted: HashSet<String>,
    validated: Vec<Arc<Template>>,
    output_dir: Option<PathBuf>,
}

impl RuntimeTemplateDiscovery {
    pub fn new(detector: Arc<dyn RegionDetector>) -> Self {
        Self {
            detector,
            filter: SemanticIconFilter::new(),
            gate: StabilityGate::default(),
            histories: HashMap::new(),
            promoted: HashSet::new(),
            validated: Vec::new(),
            output_dir: None,
        }
    }

    /// Promoted templates are also written as PNGs into `dir`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn validated_templates(&self) -> &[Arc<Template>] {
        &self.validated
    }

    pub fn pending_count(&self) -> usize {
        self.histories.len()
    }

    pub fn history(&self, signature: &str) -> Option<&ElementHistory> {
        self.histories.get(signature)
    }

    /// Seeds templates validated in an earlier run.
    pub fn restore(&mut self, templates: Vec<Template>) {
        for template in templates {
            let Some(signature) = template.signature.clone() else {
                continue;
            };
            if self.promoted.insert(signature) {
                self.validated.push(Arc::new(template));
            }
        }
    }

    /// Feeds one screenshot through detection, filtering and the gate.
    /// Returns only templates promoted by this call.
    pub fn discover_templates(&mut self, screenshot: &Screenshot) -> Vec<Arc<Template>> {
        let regions = match self.detector.detect(&screenshot.image) {
            Ok(regions) => regions,
            Err(err) => {
                log_warn!("region detection failed on screenshot {}: {err:#}", screenshot.id);
                return Vec::new();
            }
        };

        let mut promoted = Vec::new();
        for region in regions {
            if !self.filter.is_valid_icon(&region) {
                continue;
            }
            let Some(crop) = screenshot.crop(&region) else {
                continue;
            };
            let signature = compute_signature(&crop);
            if let Some(template) =
                self.record_appearance(signature, region.origin(), screenshot.captured_at, crop)
            {
                promoted.push(template);
            }
        }
        self.evict_stale(screenshot.captured_at);
        promoted
    }

    /// Drops histories whose signature has not been seen for a while.
    pub fn evict_stale(&mut self, now: DateTime<Utc>) {
        let before = self.histories.len();
        self.histories.retain(|_, history| !history.is_stale_at(now));
        let evicted = before - self.histories.len();
        if evicted > 0 {
            log::debug!("evicted {evicted} stale template candidates");
        }
    }

    /// Adds one sighting and promotes the signature if it is now stable.
    ///
    /// A sighting away from the history's first location is ignored, unless
    /// the history went stale, in which case it starts over there.
    pub fn record_appearance(
        &mut self,
        signature: String,
        location: Point,
        seen_at: DateTime<Utc>,
        crop: RgbaImage,
    ) -> Option<Arc<Template>> {
        if self.promoted.contains(&signature) {
            return None;
        }

        let appearance = Appearance { location, seen_at };
        match self.histories.get_mut(&signature) {
            Some(history) if history.is_stale_at(seen_at) => {
                *history = ElementHistory::new(signature.clone(), appearance, crop);
            }
            Some(history) => {
                if !history.is_near_first(location, self.gate.max_deviation_px) {
                    log::debug!(
                        "ignoring sighting of {signature} at ({}, {}), away from where it was first seen",
                        location.x,
                        location.y
                    );
                    return None;
                }
                history.push(appearance, crop);
            }
            None => {
                self.histories
                    .insert(signature.clone(), ElementHistory::new(signature.clone(), appearance, crop));
            }
        }

        let stable = self
            .histories
            .get(&signature)
            .is_some_and(|history| history.is_stable(&self.gate));
        if !stable {
            return None;
        }

        let history = self.histories.remove(&signature)?;
        self.promoted.insert(signature);
        let template = Arc::new(self.promote(history));
        self.validated.push(Arc::clone(&template));
        Some(template)
    }

    fn promote(&self, history: ElementHistory) -> Template {
        let name = format!(
            "runtime_icon_{:03}_{}",
            self.validated.len() + 1,
            short_tag(&history.signature)
        );

        let mut template = Template {
            name,
            element_type: ElementType::Icon,
            source: TemplateSource::Runtime,
            image: Arc::clone(&history.latest_crop),
            signature: Some(history.signature.clone()),
            path: None,
            created_at: Utc::now(),
        };

        if let Some(dir) = &self.output_dir {
            match persist_template(&template, dir) {
                Ok(path) => template.path = Some(path),
                Err(err) => log_warn!("failed to persist template {}: {err:#}", template.name),
            }
        }

        log_info!(
            "promoted runtime template {} after {} sightings over {}ms",
            template.name,
            history.appearances.len(),
            history.span_ms()
        );
        template
    }
}

/// Writes a template image as `<dir>/<name>.png`.
pub fn persist_template(template: &Template, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create template directory {}", dir.display()))?;
    let path = dir.join(format!("{}.png", template.name));
    template
        .image
        .save_with_format(&path, ImageFormat::Png)
        .with_context(|| format!("failed to write template {}", path.display()))?;
    Ok(path)
}

fn short_tag(signature: &str) -> String {
    signature
        .rsplit(':')
        .next()
        .unwrap_or(signature)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(8)
        .collect()
}
