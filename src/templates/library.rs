use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};

use crate::bridge::Screenshot;

use super::discovery::RuntimeTemplateDiscovery;
use super::template::{tokenize, ElementType, Template};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Runtime templates overlapping a reference name by more than this are dropped.
pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Owns the reference templates and the runtime discovery that grows the
/// learned set. The only writer of either; readers get `Arc` snapshots.
pub struct HybridTemplateManager {
    reference: Vec<Arc<Template>>,
    discovery: Mutex<RuntimeTemplateDiscovery>,
}

impl HybridTemplateManager {
    pub fn new(reference: Vec<Template>, discovery: RuntimeTemplateDiscovery) -> Self {
        Self {
            reference: reference.into_iter().map(Arc::new).collect(),
            discovery: Mutex::new(discovery),
        }
    }

    /// Loads reference templates from `dir`. A missing or unreadable
    /// directory leaves the reference set empty.
    pub fn load(dir: &Path, discovery: RuntimeTemplateDiscovery) -> Self {
        let reference = match load_reference_templates(dir) {
            Ok(templates) => {
                log_info!("loaded {} reference templates from {}", templates.len(), dir.display());
                templates
            }
            Err(err) => {
                log_warn!("no reference templates loaded from {}: {err:#}", dir.display());
                Vec::new()
            }
        };
        Self::new(reference, discovery)
    }

    pub fn reference_templates(&self) -> &[Arc<Template>] {
        &self.reference
    }

    /// Reference templates plus validated runtime templates that do not
    /// duplicate a reference one. Recomputed on every call.
    pub fn get_templates(&self) -> Vec<Arc<Template>> {
        let discovery = self.lock_discovery();
        let mut templates = self.reference.clone();
        templates.extend(
            discovery
                .validated_templates()
                .iter()
                .filter(|runtime| !self.shadows_reference(runtime))
                .cloned(),
        );
        templates
    }

    pub fn discover_templates(&self, screenshot: &Screenshot) -> Vec<Arc<Template>> {
        self.lock_discovery().discover_templates(screenshot)
    }

    pub fn restore_runtime(&self, templates: Vec<Template>) {
        self.lock_discovery().restore(templates);
    }

    pub fn runtime_count(&self) -> usize {
        self.lock_discovery().validated_templates().len()
    }

    fn shadows_reference(&self, runtime: &Template) -> bool {
        self.reference
            .iter()
            .any(|reference| is_similar(reference, runtime))
    }

    fn lock_discovery(&self) -> MutexGuard<'_, RuntimeTemplateDiscovery> {
        match self.discovery.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Same element type and name tokens overlapping above the threshold.
pub fn is_similar(a: &Template, b: &Template) -> bool {
    a.element_type == b.element_type
        && name_overlap(&a.name, &b.name) > NAME_SIMILARITY_THRESHOLD
}

/// Shared tokens over the larger token count.
pub fn name_overlap(a: &str, b: &str) -> f64 {
    let a: HashSet<String> = tokenize(a).into_iter().collect();
    let b: HashSet<String> = tokenize(b).into_iter().collect();
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / larger as f64
}

fn load_reference_templates(dir: &Path) -> Result<Vec<Template>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read template directory {}", dir.display()))?;

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    paths.sort();

    let mut templates = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match image::open(&path) {
            Ok(decoded) => {
                let mut template =
                    Template::reference(stem, ElementType::from_file_stem(stem), decoded.to_rgba8());
                template.path = Some(path.clone());
                templates.push(template);
            }
            Err(err) => log_warn!("skipping unreadable template {}: {err}", path.display()),
        }
    }
    Ok(templates)
}
