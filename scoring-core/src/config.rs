//! Engine configuration

use std::path::PathBuf;

use crate::constants;
use crate::features::FeatureLayout;

/// Where the artifact lives and which layout it was trained against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    pub feature_layout: FeatureLayout,
}

impl EngineConfig {
    pub fn new(model_path: impl Into<PathBuf>, feature_layout: FeatureLayout) -> Self {
        Self {
            model_path: model_path.into(),
            feature_layout,
        }
    }

    /// Load from `TAMS_MODEL_PATH` / `TAMS_FEATURE_LAYOUT`
    ///
    /// An unrecognised layout name falls back to the default with a warning.
    pub fn from_env() -> Self {
        let layout_name = constants::get_feature_layout();
        let feature_layout = layout_name.parse().unwrap_or_else(|e| {
            log::warn!("{}; using {}", e, FeatureLayout::default());
            FeatureLayout::default()
        });

        Self::new(constants::get_model_path(), feature_layout)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(constants::DEFAULT_MODEL_PATH, FeatureLayout::default())
    }
}
