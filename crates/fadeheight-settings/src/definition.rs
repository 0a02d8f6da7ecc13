//! Definition containers: trees of setting nodes with a key index and a
//! cross-reference index.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use slotmap::SlotMap;

use crate::error::{DefinitionError, Result};
use crate::setting::{SettingKind, SettingSpec};

slotmap::new_key_type! {
    /// Handle to a node in a [`DefinitionTree`].
    pub struct DefinitionId;
}

/// Properties whose string values are expressions over other settings.
const EXPRESSION_PROPERTIES: &[&str] = &[
    "value",
    "resolve",
    "enabled",
    "minimum_value",
    "maximum_value",
    "minimum_value_warning",
    "maximum_value_warning",
];

/// A definition container as seen by the augmenter.
pub trait DefinitionContainer {
    /// Container identity.
    fn id(&self) -> &str;

    /// Metadata entry by key.
    fn metadata_entry(&self, key: &str) -> Option<&Value>;

    /// All nodes with the given key, anywhere in the container.
    fn find_definitions(&self, key: &str) -> Vec<DefinitionId>;

    /// Attach new setting nodes as children of `parent`.
    ///
    /// Appends every node, registers each in the key index and recomputes
    /// cross-references for all of them before returning, so references
    /// between the new nodes resolve too. Nothing is mutated on error.
    fn attach_settings(
        &mut self,
        parent: DefinitionId,
        definitions: Vec<SettingDefinition>,
    ) -> Result<Vec<DefinitionId>>;
}

/// A single setting (or category) node.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingDefinition {
    /// Setting key, unique within its container.
    pub key: String,
    /// Node type.
    pub kind: SettingKind,
    /// Remaining definition properties (label, default_value, enabled, ...).
    pub properties: Map<String, Value>,
    /// Translation catalog for labels and descriptions.
    pub i18n_catalog: Option<String>,
}

impl SettingDefinition {
    /// Create an empty node.
    pub fn new(key: impl Into<String>, kind: SettingKind) -> Self {
        Self {
            key: key.into(),
            kind,
            properties: Map::new(),
            i18n_catalog: None,
        }
    }

    /// Build a node from a plugin setting.
    pub fn from_spec(spec: &SettingSpec, i18n_catalog: Option<&str>) -> Self {
        let mut properties = spec.to_definition_json();
        properties.remove("type");
        Self {
            key: spec.key.to_string(),
            kind: spec.kind.clone(),
            properties,
            i18n_catalog: i18n_catalog.map(str::to_string),
        }
    }

    /// Set a property, builder style.
    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Display label.
    pub fn label(&self) -> Option<&str> {
        self.property("label").and_then(Value::as_str)
    }

    /// `(property, identifier)` pairs mentioned by expression properties.
    fn referenced_identifiers(&self) -> Vec<(&str, &str)> {
        let mut refs = Vec::new();
        for &role in EXPRESSION_PROPERTIES {
            if let Some(Value::String(expr)) = self.properties.get(role) {
                for ident in expression_identifiers(expr) {
                    refs.push((role, ident));
                }
            }
        }
        refs
    }
}

/// Direction of a cross-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The owner's expression reads the target.
    RequiresTarget,
    /// The target's expression reads the owner.
    RequiredByTarget,
}

/// A cross-reference between two settings of the same container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Relation direction.
    pub kind: RelationKind,
    /// Setting the relation is recorded on.
    pub owner: String,
    /// Setting on the other end.
    pub target: String,
    /// Property whose expression creates the reference.
    pub role: String,
}

#[derive(Debug, Clone)]
struct DefinitionNode {
    definition: SettingDefinition,
    parent: Option<DefinitionId>,
    children: Vec<DefinitionId>,
}

/// In-memory definition container.
#[derive(Debug, Clone)]
pub struct DefinitionTree {
    id: String,
    name: String,
    metadata: Map<String, Value>,
    /// Top-level fields of the definition file this crate does not interpret.
    extra: Map<String, Value>,
    nodes: SlotMap<DefinitionId, DefinitionNode>,
    roots: Vec<DefinitionId>,
    cache: HashMap<String, DefinitionId>,
    relations: HashMap<String, Vec<Relation>>,
}

impl DefinitionTree {
    /// Create an empty container.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            metadata: Map::new(),
            extra: Map::new(),
            nodes: SlotMap::with_key(),
            roots: Vec::new(),
            cache: HashMap::new(),
            relations: HashMap::new(),
        }
    }

    /// Set a metadata entry, builder style.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Parse a definition file.
    ///
    /// The expected shape is
    /// `{"name": ..., "metadata": {...}, "settings": {key: {"type": ..., "children": {...}}}}`.
    /// Key order is preserved.
    pub fn from_json(id: impl Into<String>, json: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(json)?;
        let Value::Object(mut root) = root else {
            return Err(DefinitionError::InvalidDefinition(
                "top level must be an object".into(),
            ));
        };

        let mut tree = Self::new(id);
        if let Some(name) = root.remove("name") {
            tree.name = name
                .as_str()
                .ok_or_else(|| DefinitionError::InvalidDefinition("name must be a string".into()))?
                .to_string();
        }
        match root.remove("metadata") {
            Some(Value::Object(metadata)) => tree.metadata = metadata,
            Some(_) => {
                return Err(DefinitionError::InvalidDefinition(
                    "metadata must be an object".into(),
                ))
            }
            None => {}
        }
        let settings = match root.remove("settings") {
            Some(Value::Object(settings)) => settings,
            Some(_) => {
                return Err(DefinitionError::InvalidDefinition(
                    "settings must be an object".into(),
                ))
            }
            None => Map::new(),
        };
        tree.extra = root;

        for (key, body) in settings {
            tree.insert_parsed(None, key, body)?;
        }
        let ids: Vec<DefinitionId> = tree.nodes.keys().collect();
        for id in ids {
            tree.update_relations(id);
        }
        Ok(tree)
    }

    fn insert_parsed(
        &mut self,
        parent: Option<DefinitionId>,
        key: String,
        body: Value,
    ) -> Result<()> {
        let Value::Object(mut properties) = body else {
            return Err(DefinitionError::InvalidDefinition(format!(
                "setting {} must be an object",
                key
            )));
        };
        let kind = match properties.remove("type") {
            Some(Value::String(kind)) => SettingKind::parse(&kind),
            _ => {
                return Err(DefinitionError::InvalidDefinition(format!(
                    "setting {} has no type",
                    key
                )))
            }
        };
        let children = match properties.remove("children") {
            Some(Value::Object(children)) => children,
            Some(_) => {
                return Err(DefinitionError::InvalidDefinition(format!(
                    "children of {} must be an object",
                    key
                )))
            }
            None => Map::new(),
        };
        if self.cache.contains_key(&key) {
            return Err(DefinitionError::DuplicateKey(key));
        }

        let definition = SettingDefinition {
            key: key.clone(),
            kind,
            properties,
            i18n_catalog: None,
        };
        let id = self.insert_node(parent, definition);
        for (child_key, child_body) in children {
            self.insert_parsed(Some(id), child_key, child_body)?;
        }
        Ok(())
    }

    fn insert_node(
        &mut self,
        parent: Option<DefinitionId>,
        definition: SettingDefinition,
    ) -> DefinitionId {
        let key = definition.key.clone();
        let id = self.nodes.insert(DefinitionNode {
            definition,
            parent,
            children: Vec::new(),
        });
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_node) => parent_node.children.push(id),
            None => self.roots.push(id),
        }
        self.cache.insert(key, id);
        id
    }

    /// Add a top-level node (normally a category).
    pub fn add_root(&mut self, definition: SettingDefinition) -> Result<DefinitionId> {
        if self.cache.contains_key(&definition.key) {
            return Err(DefinitionError::DuplicateKey(definition.key));
        }
        let id = self.insert_node(None, definition);
        self.update_relations(id);
        Ok(id)
    }

    /// Serialize back to the definition file format.
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        root.insert("name".into(), Value::from(self.name.clone()));
        for (key, value) in &self.extra {
            root.insert(key.clone(), value.clone());
        }
        root.insert("metadata".into(), Value::Object(self.metadata.clone()));
        root.insert("settings".into(), Value::Object(self.subtree_json(&self.roots)));
        Value::Object(root)
    }

    fn subtree_json(&self, ids: &[DefinitionId]) -> Map<String, Value> {
        let mut out = Map::new();
        for &id in ids {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let mut body = Map::new();
            body.insert("type".into(), Value::from(node.definition.kind.as_str()));
            for (name, value) in &node.definition.properties {
                body.insert(name.clone(), value.clone());
            }
            if !node.children.is_empty() {
                body.insert("children".into(), Value::Object(self.subtree_json(&node.children)));
            }
            out.insert(node.definition.key.clone(), Value::Object(body));
        }
        out
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All metadata.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Node payload.
    pub fn get(&self, id: DefinitionId) -> Option<&SettingDefinition> {
        self.nodes.get(id).map(|node| &node.definition)
    }

    /// Parent of a node, `None` for roots.
    pub fn parent(&self, id: DefinitionId) -> Option<DefinitionId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    /// Children of a node, in order.
    pub fn children(&self, id: DefinitionId) -> &[DefinitionId] {
        self.nodes.get(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    /// Top-level nodes, in order.
    pub fn roots(&self) -> &[DefinitionId] {
        &self.roots
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the container has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by key.
    pub fn find(&self, key: &str) -> Option<DefinitionId> {
        self.cache.get(key).copied()
    }

    /// Cross-references recorded on a setting.
    pub fn relations(&self, key: &str) -> &[Relation] {
        self.relations.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Recompute the cross-references of one node against the current index.
    fn update_relations(&mut self, id: DefinitionId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let owner = node.definition.key.clone();
        let refs: Vec<(String, String)> = node
            .definition
            .referenced_identifiers()
            .into_iter()
            .filter(|(_, ident)| *ident != owner && self.cache.contains_key(*ident))
            .map(|(role, ident)| (role.to_string(), ident.to_string()))
            .collect();

        for (role, target) in refs {
            push_unique(
                self.relations.entry(owner.clone()).or_default(),
                Relation {
                    kind: RelationKind::RequiresTarget,
                    owner: owner.clone(),
                    target: target.clone(),
                    role: role.clone(),
                },
            );
            push_unique(
                self.relations.entry(target.clone()).or_default(),
                Relation {
                    kind: RelationKind::RequiredByTarget,
                    owner: target,
                    target: owner.clone(),
                    role,
                },
            );
        }
    }
}

impl DefinitionContainer for DefinitionTree {
    fn id(&self) -> &str {
        &self.id
    }

    fn metadata_entry(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    fn find_definitions(&self, key: &str) -> Vec<DefinitionId> {
        self.find(key).into_iter().collect()
    }

    fn attach_settings(
        &mut self,
        parent: DefinitionId,
        definitions: Vec<SettingDefinition>,
    ) -> Result<Vec<DefinitionId>> {
        if !self.nodes.contains_key(parent) {
            return Err(DefinitionError::UnknownParent(self.id.clone()));
        }
        let mut batch = HashSet::new();
        for definition in &definitions {
            if self.cache.contains_key(&definition.key) || !batch.insert(definition.key.as_str()) {
                return Err(DefinitionError::DuplicateKey(definition.key.clone()));
            }
        }

        let ids: Vec<DefinitionId> = definitions
            .into_iter()
            .map(|definition| self.insert_node(Some(parent), definition))
            .collect();
        for &id in &ids {
            self.update_relations(id);
        }
        Ok(ids)
    }
}

fn push_unique(list: &mut Vec<Relation>, relation: Relation) {
    if !list.contains(&relation) {
        list.push(relation);
    }
}

/// Identifier-like tokens: a letter or underscore not preceded by a word
/// character, so exponents such as `1e5` are skipped.
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z_]\w*").expect("identifier pattern is valid"));

/// Identifier-like tokens of an expression, including those inside string
/// literals (`extruderValue(n, 'key')` names a setting too).
fn expression_identifiers(expr: &str) -> Vec<&str> {
    IDENTIFIER.find_iter(expr).map(|m| m.as_str()).collect()
}
