use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::perception::DEFAULT_SAFETY_MARGIN;

/// Tunables of one agent run. Missing keys fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub reference_template_dir: PathBuf,
    /// Where promoted runtime templates are written; `None` keeps them in memory.
    pub runtime_template_dir: Option<PathBuf>,
    pub screenshot_dir: Option<PathBuf>,
    pub journal_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub tap_margin_px: i32,
    pub settle_delay_ms: u64,
    pub transport_timeout_secs: u64,
    pub max_iterations: u32,
    pub stuck_threshold: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            reference_template_dir: PathBuf::from("templates"),
            runtime_template_dir: None,
            screenshot_dir: None,
            journal_dir: None,
            database_path: None,
            tap_margin_px: DEFAULT_SAFETY_MARGIN,
            settle_delay_ms: 500,
            transport_timeout_secs: 10,
            max_iterations: 50,
            stuck_threshold: 3,
        }
    }
}

impl AgentSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn transport_timeout(&self) -> Duration {
        Duration::from_secs(self.transport_timeout_secs.max(1))
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AgentSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring malformed settings in {}: {err}", path.display());
                AgentSettings::default()
            })
        } else {
            AgentSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> AgentSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: AgentSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &AgentSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.settings();
        assert_eq!(settings.settle_delay_ms, 500);
        assert_eq!(settings.tap_margin_px, 10);
        assert_eq!(settings.stuck_threshold, 3);
    }

    #[test]
    fn partial_file_fills_in_defaults_and_update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "max_iterations": 7 }"#).unwrap();

        let store = SettingsStore::new(path.clone()).unwrap();
        let mut settings = store.settings();
        assert_eq!(settings.max_iterations, 7);
        assert_eq!(settings.transport_timeout_secs, 10);

        settings.settle_delay_ms = 250;
        store.update(settings).unwrap();

        let reloaded = SettingsStore::new(path).unwrap().settings();
        assert_eq!(reloaded.settle_delay_ms, 250);
        assert_eq!(reloaded.max_iterations, 7);
    }
}
