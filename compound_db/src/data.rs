use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::Result;
use crate::source;

/// Short opaque token naming one chemical entity. ChEBI archives use integers,
/// other sources may use strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompactId {
    Int(u64),
    Text(String),
}

impl fmt::Display for CompactId {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompactId::Int(i) => write!(f, "{}", i),
            CompactId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for CompactId {
    fn from(i: u64) -> Self {
        CompactId::Int(i)
    }
}

impl From<&str> for CompactId {
    fn from(s: &str) -> Self {
        CompactId::Text(s.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "definition", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smiles: Option<String>,
    #[serde(default, alias = "isomeric", skip_serializing_if = "Option::is_none")]
    pub isomeric_smiles: Option<String>,
    /// Whatever else the archive carries for the entity.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DataRecord {

    pub fn named(name: &str) -> Self {

        return Self {
            name: Some(name.to_string()),
            ..Self::default()
        };
    }
}

/// A data record as handed back to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedResult {
    #[serde(flatten)]
    pub record: DataRecord,
    pub chebi: CompactId,
    /// Atom output order from canonicalization, only present when the query
    /// was resolved as a structure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reordering: Option<Vec<usize>>,
}

/// Per-map entry counts written by a bulk load, keyed `data` and `lookup`.
pub type LoadCounts = BTreeMap<String, usize>;

/// Both maps of a bulk load, in the `{"data": ..., "lookup": ...}` msgpack
/// shape used by the ChEBI archive and by store snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChebiArchive {
    #[serde(default)]
    pub data: HashMap<CompactId, DataRecord>,
    #[serde(default)]
    pub lookup: HashMap<String, CompactId>,
}

impl ChebiArchive {

    /// Decodes msgpack, gunzipping first if the bytes are gzip.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {

        let raw = source::decompress(bytes)?;
        let archive: Self = rmp_serde::from_slice(&raw)?;
        return Ok(archive);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Lookup values with no matching data entry.
    pub fn dangling(&self) -> Vec<(&String, &CompactId)> {

        let mut dangling: Vec<(&String, &CompactId)> = self
            .lookup
            .iter()
            .filter(|(_, id)| !self.data.contains_key(id))
            .collect();
        dangling.sort();
        return dangling;
    }
}
