//! Static definitions of the settings this plugin contributes.

use std::fmt;

use serde_json::{Map, Value};

use crate::value::SettingValue;

/// Key of the fade height setting.
pub const FADE_HEIGHT_KEY: &str = "fade_height_mm";

/// Key of the auto bed leveling toggle.
pub const ABL_ENABLED_KEY: &str = "abl_enabled";

/// Key of the machine start G-code template.
pub const MACHINE_START_GCODE_KEY: &str = "machine_start_gcode";

/// Type of a setting node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingKind {
    /// Grouping node without a value.
    Category,
    /// Floating point value.
    Float,
    /// Boolean value.
    Bool,
    /// Integer value.
    Int,
    /// String value.
    Str,
    /// Any other framework type (enum, polygon, extruder, ...).
    Other(String),
}

impl SettingKind {
    /// Parse the `type` property of a definition file.
    pub fn parse(name: &str) -> Self {
        match name {
            "category" => SettingKind::Category,
            "float" => SettingKind::Float,
            "bool" => SettingKind::Bool,
            "int" => SettingKind::Int,
            "str" => SettingKind::Str,
            other => SettingKind::Other(other.to_string()),
        }
    }

    /// Name as written in definition files.
    pub fn as_str(&self) -> &str {
        match self {
            SettingKind::Category => "category",
            SettingKind::Float => "float",
            SettingKind::Bool => "bool",
            SettingKind::Int => "int",
            SettingKind::Str => "str",
            SettingKind::Other(name) => name,
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of a plugin-owned setting.
#[derive(Debug, Clone)]
pub struct SettingSpec {
    /// Unique setting key.
    pub key: &'static str,
    /// Label shown in the settings panel.
    pub label: &'static str,
    /// Tooltip text.
    pub description: &'static str,
    /// Value type.
    pub kind: SettingKind,
    /// Display unit.
    pub unit: Option<&'static str>,
    /// Fallback value when nothing else applies.
    pub default_value: SettingValue,
    /// Initial value given to new profiles.
    pub value: Option<SettingValue>,
    /// Hard lower bound (numeric settings only).
    pub minimum_value: Option<SettingValue>,
    /// Upper bound above which the framework warns (numeric settings only).
    pub maximum_value_warning: Option<SettingValue>,
    /// Key of the boolean setting that must be true for this one to be editable.
    pub enabled_by: Option<&'static str>,
    /// Formula used when no explicit value is set. Opaque to this crate.
    pub resolve_expression: Option<&'static str>,
    /// Can be overridden per mesh.
    pub settable_per_mesh: bool,
    /// Can be overridden per extruder.
    pub settable_per_extruder: bool,
    /// Can be overridden per mesh group.
    pub settable_per_meshgroup: bool,
}

/// The settings attached under the adhesion category, in attachment order.
///
/// The first entry doubles as the marker that a definition has already been
/// augmented.
pub static PLUGIN_SETTINGS: [SettingSpec; 2] = [
    SettingSpec {
        key: FADE_HEIGHT_KEY,
        label: "Fade Height",
        description: "Sets the auto bed leveling fade height in mm. Note that unless this setting is used in a start gcode snippet, it has no effect!",
        kind: SettingKind::Float,
        unit: Some("mm"),
        default_value: SettingValue::Int(0),
        value: None,
        minimum_value: Some(SettingValue::Int(0)),
        maximum_value_warning: Some(SettingValue::Int(999)),
        enabled_by: Some(ABL_ENABLED_KEY),
        resolve_expression: Some(
            "extruderValue(adhesion_extruder_nr, 'adhesion_z_offset') if resolveOrValue('adhesion_type') != 'none' else min(extruderValues('adhesion_z_offset'))",
        ),
        settable_per_mesh: false,
        settable_per_extruder: false,
        settable_per_meshgroup: false,
    },
    SettingSpec {
        key: ABL_ENABLED_KEY,
        label: "Auto bed leveling correction",
        description: "Enable or disable the bed leveling correction.",
        kind: SettingKind::Bool,
        unit: None,
        default_value: SettingValue::Bool(false),
        value: Some(SettingValue::Bool(true)),
        minimum_value: None,
        maximum_value_warning: None,
        enabled_by: None,
        resolve_expression: None,
        settable_per_mesh: false,
        settable_per_extruder: false,
        settable_per_meshgroup: false,
    },
];

impl SettingSpec {
    /// Look up one of the plugin settings by key.
    pub fn find(key: &str) -> Option<&'static SettingSpec> {
        PLUGIN_SETTINGS.iter().find(|spec| spec.key == key)
    }

    /// Render the setting as a definition file entry.
    pub fn to_definition_json(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("label".into(), Value::from(self.label));
        props.insert("description".into(), Value::from(self.description));
        props.insert("type".into(), Value::from(self.kind.as_str()));
        if let Some(unit) = self.unit {
            props.insert("unit".into(), Value::from(unit));
        }
        props.insert("default_value".into(), self.default_value.to_json());
        if let Some(value) = &self.value {
            props.insert("value".into(), value.to_json());
        }
        if let Some(min) = &self.minimum_value {
            props.insert("minimum_value".into(), min.to_json());
        }
        if let Some(max) = &self.maximum_value_warning {
            props.insert("maximum_value_warning".into(), max.to_json());
        }
        if let Some(resolve) = self.resolve_expression {
            props.insert("resolve".into(), Value::from(resolve));
        }
        if let Some(enabled) = self.enabled_by {
            props.insert("enabled".into(), Value::from(enabled));
        }
        props.insert("settable_per_mesh".into(), Value::from(self.settable_per_mesh));
        props.insert("settable_per_extruder".into(), Value::from(self.settable_per_extruder));
        props.insert("settable_per_meshgroup".into(), Value::from(self.settable_per_meshgroup));
        props
    }
}
