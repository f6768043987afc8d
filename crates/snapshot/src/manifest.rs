use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Book-keeping between the sharded index pass and the merge: which shard
/// ids were actually written for each field. Shard ids are sequential, so
/// re-running the indexer reproduces the same manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardManifest {
    pub fields: BTreeMap<String, Vec<usize>>,
}

impl ShardManifest {
    pub fn shard_path(field: &str, shard: usize) -> String {
        format!("index_sharded/{field}_{shard}.avro")
    }

    pub fn shards_for(&self, field: &str) -> Result<&[usize], Error> {
        self.fields
            .get(field)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownField(field.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(std::io::Error::other)
    }

    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let raw = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, raw)
    }
}
