//! Container registry: lookup of containers by id and their load state.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::definition::{DefinitionContainer, DefinitionTree};

/// A container handle returned by a registry lookup.
pub enum Container<'a, D> {
    /// A definition (schema) container.
    Definition(&'a mut D),
    /// An instance or override container. Never augmented.
    Instance(&'a InstanceContainer),
}

/// Registry of loaded containers.
pub trait ContainerRegistry {
    /// Concrete definition container type.
    type Definition: DefinitionContainer;

    /// True once the container has fully loaded (not merely registered).
    fn is_loaded(&self, container_id: &str) -> bool;

    /// Containers matching an id. Empty when the container vanished.
    fn find_containers(&mut self, container_id: &str) -> Vec<Container<'_, Self::Definition>>;
}

/// Instance container: values and metadata, no setting tree.
#[derive(Debug, Clone)]
pub struct InstanceContainer {
    /// Container identity.
    pub id: String,
    /// Container metadata.
    pub metadata: Map<String, Value>,
}

impl InstanceContainer {
    /// Create an instance container with no metadata.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: Map::new(),
        }
    }
}

#[derive(Debug)]
enum Stored {
    Definition(DefinitionTree),
    Instance(InstanceContainer),
}

#[derive(Debug)]
struct Entry {
    loaded: bool,
    container: Stored,
}

/// In-memory [`ContainerRegistry`].
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: HashMap<String, Entry>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition that has not finished loading.
    pub fn register(&mut self, tree: DefinitionTree) {
        let id = tree.id().to_string();
        self.entries.insert(
            id,
            Entry {
                loaded: false,
                container: Stored::Definition(tree),
            },
        );
    }

    /// Register a fully loaded definition.
    pub fn insert_loaded(&mut self, tree: DefinitionTree) {
        let id = tree.id().to_string();
        self.entries.insert(
            id,
            Entry {
                loaded: true,
                container: Stored::Definition(tree),
            },
        );
    }

    /// Register a fully loaded instance container.
    pub fn insert_instance(&mut self, instance: InstanceContainer) {
        self.entries.insert(
            instance.id.clone(),
            Entry {
                loaded: true,
                container: Stored::Instance(instance),
            },
        );
    }

    /// Mark a registered container as loaded. Returns false if unknown.
    pub fn mark_loaded(&mut self, container_id: &str) -> bool {
        match self.entries.get_mut(container_id) {
            Some(entry) => {
                entry.loaded = true;
                true
            }
            None => false,
        }
    }

    /// Drop a container.
    pub fn remove(&mut self, container_id: &str) -> bool {
        self.entries.remove(container_id).is_some()
    }

    /// Definition by id, regardless of load state.
    pub fn definition(&self, container_id: &str) -> Option<&DefinitionTree> {
        match self.entries.get(container_id).map(|entry| &entry.container) {
            Some(Stored::Definition(tree)) => Some(tree),
            _ => None,
        }
    }

    /// Take a definition out of the registry.
    pub fn take_definition(&mut self, container_id: &str) -> Option<DefinitionTree> {
        match self.entries.remove(container_id)?.container {
            Stored::Definition(tree) => Some(tree),
            Stored::Instance(instance) => {
                self.insert_instance(instance);
                None
            }
        }
    }
}

impl ContainerRegistry for MemoryRegistry {
    type Definition = DefinitionTree;

    fn is_loaded(&self, container_id: &str) -> bool {
        self.entries
            .get(container_id)
            .is_some_and(|entry| entry.loaded)
    }

    fn find_containers(&mut self, container_id: &str) -> Vec<Container<'_, DefinitionTree>> {
        self.entries
            .get_mut(container_id)
            .map(|entry| match &mut entry.container {
                Stored::Definition(tree) => Container::Definition(tree),
                Stored::Instance(instance) => Container::Instance(instance),
            })
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_state() {
        let mut registry = MemoryRegistry::new();
        registry.register(DefinitionTree::new("printer"));
        assert!(!registry.is_loaded("printer"));
        assert!(registry.mark_loaded("printer"));
        assert!(registry.is_loaded("printer"));
        assert!(!registry.mark_loaded("missing"));
        assert!(!registry.is_loaded("missing"));
    }

    #[test]
    fn test_find_containers() {
        let mut registry = MemoryRegistry::new();
        registry.insert_loaded(DefinitionTree::new("printer"));
        registry.insert_instance(InstanceContainer::new("printer_user"));

        assert!(matches!(
            registry.find_containers("printer").as_slice(),
            [Container::Definition(_)]
        ));
        assert!(matches!(
            registry.find_containers("printer_user").as_slice(),
            [Container::Instance(_)]
        ));
        assert!(registry.find_containers("gone").is_empty());
    }

    #[test]
    fn test_take_definition_keeps_instances() {
        let mut registry = MemoryRegistry::new();
        registry.insert_instance(InstanceContainer::new("quality"));
        assert!(registry.take_definition("quality").is_none());
        assert!(registry.is_loaded("quality"));
        registry.insert_loaded(DefinitionTree::new("printer"));
        assert!(registry.take_definition("printer").is_some());
        assert!(registry.definition("printer").is_none());
    }
}
