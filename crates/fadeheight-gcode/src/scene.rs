//! The scene/job context that carries exported G-code.

use crate::plate::GcodePlateSet;

/// Holder of the `gcode_dict` the export pipeline reads from.
pub trait SceneContext {
    /// Current plate set, if the scene has one.
    fn gcode_dict(&self) -> Option<GcodePlateSet>;

    /// Replace the plate set seen by the export pipeline.
    fn set_gcode_dict(&mut self, plates: GcodePlateSet);
}

/// In-memory [`SceneContext`] that counts write-backs.
#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    gcode_dict: Option<GcodePlateSet>,
    writes: usize,
}

impl MemoryScene {
    /// Scene without G-code.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene holding a plate set.
    pub fn with_gcode(plates: GcodePlateSet) -> Self {
        Self {
            gcode_dict: Some(plates),
            writes: 0,
        }
    }

    /// Plate set as currently stored.
    pub fn plates(&self) -> Option<&GcodePlateSet> {
        self.gcode_dict.as_ref()
    }

    /// Take the plate set out of the scene.
    pub fn into_plates(self) -> Option<GcodePlateSet> {
        self.gcode_dict
    }

    /// Number of `set_gcode_dict` calls.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl SceneContext for MemoryScene {
    fn gcode_dict(&self) -> Option<GcodePlateSet> {
        self.gcode_dict.clone()
    }

    fn set_gcode_dict(&mut self, plates: GcodePlateSet) {
        self.gcode_dict = Some(plates);
        self.writes += 1;
    }
}
