//! Attaching the plugin settings to machine definitions as they load.

use std::fmt;

use crate::definition::{DefinitionContainer, DefinitionId, SettingDefinition};
use crate::error::Result;
use crate::registry::{Container, ContainerRegistry};
use crate::setting::{SettingSpec, PLUGIN_SETTINGS};

/// Category the settings are attached under.
pub const DEFAULT_CATEGORY_KEY: &str = "platform_adhesion";

/// Why a load notification did not change anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Container is registered but not fully loaded.
    NotLoaded,
    /// Container disappeared between notification and lookup.
    ContainerMissing,
    /// Container is an instance/override container.
    NotDefinition,
    /// Per-extruder definitions never receive these settings.
    ExtruderDefinition,
    /// Definition has no category to attach under.
    MissingCategory,
    /// Settings are already present.
    AlreadyAugmented,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NotLoaded => "container not loaded",
            SkipReason::ContainerMissing => "container no longer exists",
            SkipReason::NotDefinition => "not a definition container",
            SkipReason::ExtruderDefinition => "extruder definition",
            SkipReason::MissingCategory => "no adhesion category",
            SkipReason::AlreadyAugmented => "settings already present",
        };
        f.write_str(text)
    }
}

/// Result of handling one load notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AugmentOutcome {
    /// Settings were attached; ids in attachment order.
    Augmented(Vec<DefinitionId>),
    /// Nothing was changed.
    Skipped(SkipReason),
}

/// Adds the plugin settings to machine definitions.
#[derive(Debug, Clone)]
pub struct DefinitionAugmenter {
    settings: &'static [SettingSpec],
    category_key: String,
    i18n_catalog: Option<String>,
}

impl Default for DefinitionAugmenter {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORY_KEY)
    }
}

impl DefinitionAugmenter {
    /// Augmenter attaching under the given category.
    pub fn new(category_key: impl Into<String>) -> Self {
        Self {
            settings: &PLUGIN_SETTINGS,
            category_key: category_key.into(),
            i18n_catalog: None,
        }
    }

    /// Tag attached nodes with a translation catalog.
    pub fn with_i18n_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.i18n_catalog = Some(catalog.into());
        self
    }

    /// Category key nodes are attached under.
    pub fn category_key(&self) -> &str {
        &self.category_key
    }

    /// Handle a "container finished loading" notification.
    ///
    /// Every failed precondition is a silent skip. Errors only come from the
    /// container refusing the attachment, which the guards rule out.
    pub fn on_container_load_complete<R>(
        &self,
        registry: &mut R,
        container_id: &str,
    ) -> Result<AugmentOutcome>
    where
        R: ContainerRegistry + ?Sized,
    {
        // A container that failed to load must not be looked up again.
        if !registry.is_loaded(container_id) {
            return Ok(self.skip(container_id, SkipReason::NotLoaded));
        }

        let containers = registry.find_containers(container_id);
        if containers.len() > 1 {
            tracing::debug!(
                container = container_id,
                count = containers.len(),
                "multiple containers share id, using the first"
            );
        }
        let container = match containers.into_iter().next() {
            Some(Container::Definition(container)) => container,
            Some(Container::Instance(_)) => {
                return Ok(self.skip(container_id, SkipReason::NotDefinition))
            }
            None => return Ok(self.skip(container_id, SkipReason::ContainerMissing)),
        };

        if container
            .metadata_entry("type")
            .and_then(|value| value.as_str())
            == Some("extruder")
        {
            return Ok(self.skip(container_id, SkipReason::ExtruderDefinition));
        }

        self.augment(container)
    }

    /// Attach the settings to a definition container, once.
    pub fn augment<D>(&self, container: &mut D) -> Result<AugmentOutcome>
    where
        D: DefinitionContainer + ?Sized,
    {
        let Some(category) = container.find_definitions(&self.category_key).first().copied() else {
            tracing::debug!(
                container = container.id(),
                category = %self.category_key,
                "definition has no category to attach under"
            );
            return Ok(AugmentOutcome::Skipped(SkipReason::MissingCategory));
        };

        let Some(marker) = self.settings.first() else {
            return Ok(AugmentOutcome::Skipped(SkipReason::AlreadyAugmented));
        };
        if !container.find_definitions(marker.key).is_empty() {
            return Ok(self.skip(container.id(), SkipReason::AlreadyAugmented));
        }

        let nodes = self
            .settings
            .iter()
            .map(|spec| SettingDefinition::from_spec(spec, self.i18n_catalog.as_deref()))
            .collect();
        let ids = container.attach_settings(category, nodes)?;
        tracing::info!(
            container = container.id(),
            settings = ids.len(),
            "attached fade height settings"
        );
        Ok(AugmentOutcome::Augmented(ids))
    }

    fn skip(&self, container_id: &str, reason: SkipReason) -> AugmentOutcome {
        tracing::debug!(container = container_id, %reason, "skipping definition");
        AugmentOutcome::Skipped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{DefinitionTree, Relation, RelationKind};
    use crate::registry::{InstanceContainer, MemoryRegistry};
    use crate::setting::{ABL_ENABLED_KEY, FADE_HEIGHT_KEY};

    const PRINTER_JSON: &str = r#"{
        "name": "Printer",
        "metadata": { "type": "machine" },
        "settings": {
            "platform_adhesion": {
                "label": "Build Plate Adhesion",
                "type": "category",
                "children": {
                    "adhesion_type": {
                        "label": "Adhesion Type",
                        "type": "enum",
                        "default_value": "brim"
                    },
                    "adhesion_z_offset": { "label": "Z Offset", "type": "float" }
                }
            }
        }
    }"#;

    fn registry_with(id: &str, json: &str) -> MemoryRegistry {
        let mut registry = MemoryRegistry::new();
        registry.insert_loaded(DefinitionTree::from_json(id, json).unwrap());
        registry
    }

    fn snapshot(registry: &MemoryRegistry, id: &str) -> (serde_json::Value, usize, Vec<Relation>) {
        let tree = registry.definition(id).unwrap();
        (tree.to_json(), tree.len(), tree.relations(ABL_ENABLED_KEY).to_vec())
    }

    #[test]
    fn test_augment_machine_definition() {
        let mut registry = registry_with("printer", PRINTER_JSON);
        let outcome = DefinitionAugmenter::default()
            .on_container_load_complete(&mut registry, "printer")
            .unwrap();
        let ids = match outcome {
            AugmentOutcome::Augmented(ids) => ids,
            other => panic!("expected augmentation, got {:?}", other),
        };

        let tree = registry.definition("printer").unwrap();
        let keys: Vec<&str> = ids.iter().map(|&id| tree.get(id).unwrap().key.as_str()).collect();
        assert_eq!(keys, vec![FADE_HEIGHT_KEY, ABL_ENABLED_KEY]);

        let category = tree.find("platform_adhesion").unwrap();
        let children: Vec<&str> = tree
            .children(category)
            .iter()
            .map(|&id| tree.get(id).unwrap().key.as_str())
            .collect();
        assert_eq!(
            children,
            vec!["adhesion_type", "adhesion_z_offset", FADE_HEIGHT_KEY, ABL_ENABLED_KEY]
        );
        assert!(tree
            .relations(FADE_HEIGHT_KEY)
            .iter()
            .any(|r| r.kind == RelationKind::RequiresTarget && r.target == ABL_ENABLED_KEY));
    }

    #[test]
    fn test_augment_is_idempotent() {
        let mut registry = registry_with("printer", PRINTER_JSON);
        let augmenter = DefinitionAugmenter::default();
        augmenter.on_container_load_complete(&mut registry, "printer").unwrap();
        let before = snapshot(&registry, "printer");

        for _ in 0..3 {
            let outcome = augmenter.on_container_load_complete(&mut registry, "printer").unwrap();
            assert_eq!(outcome, AugmentOutcome::Skipped(SkipReason::AlreadyAugmented));
        }
        assert_eq!(snapshot(&registry, "printer"), before);
    }

    #[test]
    fn test_skip_extruder_definition() {
        let json = PRINTER_JSON.replace(r#""type": "machine""#, r#""type": "extruder""#);
        let mut registry = registry_with("printer_extruder_0", &json);
        let before = snapshot(&registry, "printer_extruder_0");

        let outcome = DefinitionAugmenter::default()
            .on_container_load_complete(&mut registry, "printer_extruder_0")
            .unwrap();
        assert_eq!(outcome, AugmentOutcome::Skipped(SkipReason::ExtruderDefinition));
        assert_eq!(snapshot(&registry, "printer_extruder_0"), before);
    }

    #[test]
    fn test_skip_not_loaded() {
        let mut registry = MemoryRegistry::new();
        registry.register(DefinitionTree::from_json("printer", PRINTER_JSON).unwrap());
        let outcome = DefinitionAugmenter::default()
            .on_container_load_complete(&mut registry, "printer")
            .unwrap();
        assert_eq!(outcome, AugmentOutcome::Skipped(SkipReason::NotLoaded));
        assert!(registry.definition("printer").unwrap().find(FADE_HEIGHT_KEY).is_none());
    }

    #[test]
    fn test_skip_missing_and_instance_containers() {
        let mut registry = MemoryRegistry::new();
        registry.insert_instance(InstanceContainer::new("printer_user"));
        let augmenter = DefinitionAugmenter::default();
        assert_eq!(
            augmenter.on_container_load_complete(&mut registry, "printer_user").unwrap(),
            AugmentOutcome::Skipped(SkipReason::NotDefinition)
        );
        assert_eq!(
            augmenter.on_container_load_complete(&mut registry, "nope").unwrap(),
            AugmentOutcome::Skipped(SkipReason::NotLoaded)
        );
    }

    #[test]
    fn test_skip_without_category() {
        let mut registry = registry_with(
            "bare",
            r#"{"settings": {"machine_settings": {"label": "Machine", "type": "category"}}}"#,
        );
        let outcome = DefinitionAugmenter::default()
            .on_container_load_complete(&mut registry, "bare")
            .unwrap();
        assert_eq!(outcome, AugmentOutcome::Skipped(SkipReason::MissingCategory));
        assert_eq!(registry.definition("bare").unwrap().len(), 1);
    }

    #[test]
    fn test_custom_category_and_catalog() {
        let json = r#"{"settings": {"leveling": {"label": "Leveling", "type": "category"}}}"#;
        let mut registry = registry_with("custom", json);
        let augmenter = DefinitionAugmenter::new("leveling").with_i18n_catalog("fadeheight");
        let outcome = augmenter.on_container_load_complete(&mut registry, "custom").unwrap();
        assert!(matches!(outcome, AugmentOutcome::Augmented(ref ids) if ids.len() == 2));

        let tree = registry.definition("custom").unwrap();
        let node = tree.get(tree.find(FADE_HEIGHT_KEY).unwrap()).unwrap();
        assert_eq!(node.i18n_catalog.as_deref(), Some("fadeheight"));
        assert_eq!(node.label(), Some("Fade Height"));
    }
}
