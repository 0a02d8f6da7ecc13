#![warn(missing_docs)]

//! Fade height and bed leveling settings for slicer definition trees.
//!
//! This crate owns the two settings the fade height plugin contributes
//! (`fade_height_mm` and `abl_enabled`) and attaches them to machine
//! definitions as they finish loading.
//!
//! # Example
//!
//! ```ignore
//! use fadeheight_settings::{DefinitionAugmenter, DefinitionTree, MemoryRegistry};
//!
//! let mut registry = MemoryRegistry::new();
//! registry.insert_loaded(DefinitionTree::from_json("creality_ender3", &json)?);
//!
//! let augmenter = DefinitionAugmenter::default();
//! let outcome = augmenter.on_container_load_complete(&mut registry, "creality_ender3")?;
//! println!("{:?}", outcome);
//! ```

pub mod augment;
pub mod definition;
pub mod error;
pub mod registry;
pub mod setting;
pub mod value;

pub use augment::{AugmentOutcome, DefinitionAugmenter, SkipReason, DEFAULT_CATEGORY_KEY};
pub use definition::{
    DefinitionContainer, DefinitionId, DefinitionTree, Relation, RelationKind, SettingDefinition,
};
pub use error::{DefinitionError, Result};
pub use registry::{Container, ContainerRegistry, InstanceContainer, MemoryRegistry};
pub use setting::{
    SettingKind, SettingSpec, ABL_ENABLED_KEY, FADE_HEIGHT_KEY, MACHINE_START_GCODE_KEY,
    PLUGIN_SETTINGS,
};
pub use value::SettingValue;
