//! Plugin configuration, loaded from TOML.
//!
//! ```toml
//! [augment]
//! category = "platform_adhesion"
//! i18n_catalog = "FadeHeightSettingPlugin"
//!
//! [annotate]
//! skip_when_inactive = false
//!
//! [log]
//! filter = "info"
//! ```

use std::fs;
use std::path::Path;

use fadeheight_gcode::GcodeAnnotator;
use fadeheight_settings::{DefinitionAugmenter, DEFAULT_CATEGORY_KEY};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Complete plugin configuration. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Definition augmentation.
    pub augment: AugmentConfig,
    /// G-code annotation.
    pub annotate: AnnotateConfig,
    /// Logging.
    pub log: LogConfig,
}

/// Definition augmentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Category key the settings are attached under.
    pub category: String,
    /// Translation catalog attached nodes are tagged with.
    pub i18n_catalog: Option<String>,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            category: DEFAULT_CATEGORY_KEY.into(),
            i18n_catalog: None,
        }
    }
}

/// G-code annotation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateConfig {
    /// Don't inject when leveling is off and the fade height is zero.
    pub skip_when_inactive: bool,
}

/// Logging settings, used by front ends that install a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` env-filter directive.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

impl PluginConfig {
    /// Parse from a TOML string.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Augmenter configured from the `[augment]` section.
    pub fn augmenter(&self) -> DefinitionAugmenter {
        let augmenter = DefinitionAugmenter::new(self.augment.category.clone());
        match &self.augment.i18n_catalog {
            Some(catalog) => augmenter.with_i18n_catalog(catalog.clone()),
            None => augmenter,
        }
    }

    /// Annotator configured from the `[annotate]` section.
    pub fn annotator(&self) -> GcodeAnnotator {
        GcodeAnnotator::new().with_skip_when_inactive(self.annotate.skip_when_inactive)
    }
}
