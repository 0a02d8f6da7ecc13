//! Access to resolved setting values.

use std::collections::HashMap;

use fadeheight_settings::SettingValue;

/// Container stack a value is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackRef {
    /// Machine-wide stack.
    Global,
    /// Per-extruder stack by position.
    Extruder(usize),
}

/// Resolves setting values for the active machine.
pub trait SettingsResolver {
    /// True when a machine configuration is active.
    fn has_machine(&self) -> bool;

    /// Extruders used by the current job.
    fn used_extruders(&self) -> Vec<usize>;

    /// Resolved value of `key`. `None` without an active machine or when the
    /// key is unknown.
    fn resolve_value(&self, stack: StackRef, key: &str) -> Option<SettingValue>;
}

/// [`SettingsResolver`] over fixed values.
///
/// Extruder stacks fall back to the global stack for keys they don't set.
#[derive(Debug, Clone, Default)]
pub struct FixedSettings {
    global: Option<HashMap<String, SettingValue>>,
    extruders: Vec<HashMap<String, SettingValue>>,
    used: Vec<usize>,
}

impl FixedSettings {
    /// No active machine.
    pub fn new() -> Self {
        Self::default()
    }

    /// An active machine with no values and no used extruders.
    pub fn machine() -> Self {
        Self {
            global: Some(HashMap::new()),
            ..Self::default()
        }
    }

    /// Set a global value. Activates the machine.
    pub fn with_global(mut self, key: &str, value: impl Into<SettingValue>) -> Self {
        self.global
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value.into());
        self
    }

    /// Mark an extruder as used by the job.
    pub fn with_used_extruder(mut self, index: usize) -> Self {
        if self.extruders.len() <= index {
            self.extruders.resize_with(index + 1, HashMap::new);
        }
        if !self.used.contains(&index) {
            self.used.push(index);
        }
        self
    }

    /// Set a per-extruder value.
    pub fn with_extruder_value(
        mut self,
        index: usize,
        key: &str,
        value: impl Into<SettingValue>,
    ) -> Self {
        if self.extruders.len() <= index {
            self.extruders.resize_with(index + 1, HashMap::new);
        }
        self.extruders[index].insert(key.to_string(), value.into());
        self
    }
}

impl SettingsResolver for FixedSettings {
    fn has_machine(&self) -> bool {
        self.global.is_some()
    }

    fn used_extruders(&self) -> Vec<usize> {
        if self.global.is_none() {
            return Vec::new();
        }
        self.used.clone()
    }

    fn resolve_value(&self, stack: StackRef, key: &str) -> Option<SettingValue> {
        let global = self.global.as_ref()?;
        match stack {
            StackRef::Global => global.get(key).cloned(),
            StackRef::Extruder(index) => self
                .extruders
                .get(index)?
                .get(key)
                .or_else(|| global.get(key))
                .cloned(),
        }
    }
}
