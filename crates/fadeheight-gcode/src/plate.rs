//! Per-plate G-code as produced by the slicing pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::command::PROCESSED_MARKER;
use crate::error::Result;

/// Build plate identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlateId {
    /// Numbered plate.
    Index(i64),
    /// Named plate.
    Name(String),
}

impl fmt::Display for PlateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlateId::Index(index) => write!(f, "{}", index),
            PlateId::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for PlateId {
    fn from(index: i64) -> Self {
        PlateId::Index(index)
    }
}

impl From<&str> for PlateId {
    fn from(name: &str) -> Self {
        PlateId::Name(name.to_string())
    }
}

impl Serialize for PlateId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PlateId::Index(index) => serializer.serialize_i64(*index),
            PlateId::Name(name) => serializer.serialize_str(name),
        }
    }
}

struct PlateIdVisitor;

impl<'de> Visitor<'de> for PlateIdVisitor {
    type Value = PlateId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a plate index or name")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<PlateId, E> {
        Ok(PlateId::Index(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<PlateId, E> {
        i64::try_from(v)
            .map(PlateId::Index)
            .map_err(|_| E::custom("plate index out of range"))
    }

    // JSON object keys always arrive as strings. Only canonical integers
    // become indices, so "01" and "1" stay distinct plates.
    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<PlateId, E> {
        match v.parse::<i64>() {
            Ok(index) if index.to_string() == v => Ok(PlateId::Index(index)),
            _ => Ok(PlateId::Name(v.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for PlateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(PlateIdVisitor)
    }
}

/// Plate id → ordered G-code blocks.
///
/// Block 0 is the header block that carries the processed marker; block 1
/// is the first content block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GcodePlateSet {
    plates: BTreeMap<PlateId, Vec<String>>,
}

impl GcodePlateSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `{"plate": ["block", ...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Insert or replace a plate.
    pub fn insert(
        &mut self,
        plate: impl Into<PlateId>,
        blocks: Vec<String>,
    ) -> Option<Vec<String>> {
        self.plates.insert(plate.into(), blocks)
    }

    /// Blocks of a plate.
    pub fn get(&self, plate: &PlateId) -> Option<&[String]> {
        self.plates.get(plate).map(Vec::as_slice)
    }

    /// Number of plates.
    pub fn len(&self) -> usize {
        self.plates.len()
    }

    /// True when there are no plates.
    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }

    /// Plates in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&PlateId, &Vec<String>)> {
        self.plates.iter()
    }

    /// Mutable plates in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&PlateId, &mut Vec<String>)> {
        self.plates.iter_mut()
    }

    /// True when the plate's header block carries the processed marker.
    pub fn is_processed(&self, plate: &PlateId) -> bool {
        self.plates
            .get(plate)
            .and_then(|blocks| blocks.first())
            .is_some_and(|header| header.contains(PROCESSED_MARKER))
    }
}

impl<P: Into<PlateId>> FromIterator<(P, Vec<String>)> for GcodePlateSet {
    fn from_iter<I: IntoIterator<Item = (P, Vec<String>)>>(iter: I) -> Self {
        Self {
            plates: iter.into_iter().map(|(id, blocks)| (id.into(), blocks)).collect(),
        }
    }
}
