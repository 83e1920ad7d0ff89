use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    capture::CaptureConfig,
    matching::{ClassificationPolicy, SimilarityMetric},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchingSettings {
    pub metric: SimilarityMetric,
    pub top_k: usize,
    /// Attach a classification verdict to backend responses.
    pub classify: bool,
    pub policy: ClassificationPolicy,
    /// Rank against per-label prototypes instead of individual records.
    pub use_prototypes: bool,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            metric: SimilarityMetric::Cosine,
            top_k: 5,
            classify: true,
            policy: ClassificationPolicy::default(),
            use_prototypes: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    /// Perceptual-hash model descriptor; `extract` refuses to run without it.
    pub asset_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub capture: CaptureConfig,
    pub matching: MatchingSettings,
    pub model: ModelSettings,
    pub database_path: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            matching: MatchingSettings::default(),
            model: ModelSettings::default(),
            database_path: PathBuf::from("train_features.db"),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring malformed settings in {}: {err}",
                    path.display()
                );
                AppSettings::default()
            })
        } else {
            AppSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> AppSettings {
        self.read().clone()
    }

    pub fn capture(&self) -> CaptureConfig {
        self.read().capture
    }

    pub fn matching(&self) -> MatchingSettings {
        self.read().matching.clone()
    }

    pub fn update_matching(&self, matching: MatchingSettings) -> Result<()> {
        let mut guard = self.write();
        guard.matching = matching;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, AppSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AppSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &AppSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
