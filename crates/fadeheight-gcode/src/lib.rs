#![warn(missing_docs)]

//! Fade height annotation of exported G-code.
//!
//! When an export starts, the resolved `abl_enabled` and `fade_height_mm`
//! settings are encoded as a single `M420` line at the top of the first
//! content block of every plate. Plates are marked as processed so repeated
//! exports never inject the command twice.
//!
//! # Example
//!
//! ```ignore
//! use fadeheight_gcode::{FixedSettings, GcodeAnnotator, GcodePlateSet, MemoryScene};
//!
//! let settings = FixedSettings::machine()
//!     .with_used_extruder(0)
//!     .with_global("abl_enabled", true)
//!     .with_global("fade_height_mm", 3.7);
//! let mut scene = MemoryScene::with_gcode(GcodePlateSet::from_json(&json)?);
//!
//! let outcome = GcodeAnnotator::new().on_write_started(&settings, &mut scene);
//! println!("{:?}", outcome);
//! ```

pub mod annotate;
pub mod command;
pub mod error;
pub mod plate;
pub mod resolver;
pub mod scene;

pub use annotate::{AnnotateOutcome, AnnotationReport, GcodeAnnotator, PlateStatus, SkipReason};
pub use command::{FadeHeightCommand, COMMAND_COMMENT, M420_MNEMONIC, PROCESSED_MARKER};
pub use error::{GcodeError, Result};
pub use plate::{GcodePlateSet, PlateId};
pub use resolver::{FixedSettings, SettingsResolver, StackRef};
pub use scene::{MemoryScene, SceneContext};
