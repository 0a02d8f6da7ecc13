#![warn(missing_docs)]

//! Fade height setting plugin.
//!
//! Wires the two halves of the plugin to the host application:
//! - machine definitions receive the `fade_height_mm` and `abl_enabled`
//!   settings when they finish loading ([`fadeheight_settings`])
//! - exported G-code receives a matching `M420` line ([`fadeheight_gcode`])
//!
//! The host's registry, settings resolver and scene are injected at
//! construction; events are fed in by the host.
//!
//! # Example
//!
//! ```ignore
//! use fadeheight::{EventQueue, FadeHeightPlugin, HostEvent, PluginConfig};
//!
//! let config = PluginConfig::load("fadeheight.toml")?;
//! let mut plugin = FadeHeightPlugin::new(registry, resolver, scene, &config);
//!
//! let mut events = EventQueue::new();
//! events.push(HostEvent::container_loaded("creality_ender3"));
//! events.push(HostEvent::write_started("local_file"));
//! plugin.drain(&mut events)?;
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod plugin;

pub use config::{AnnotateConfig, AugmentConfig, LogConfig, PluginConfig};
pub use error::{PluginError, Result};
pub use event::{EventQueue, EventSource, HostEvent};
pub use plugin::{EventOutcome, FadeHeightPlugin};

pub use fadeheight_gcode as gcode;
pub use fadeheight_settings as settings;
