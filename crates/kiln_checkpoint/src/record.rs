//! The versioned, named-field record of orchestrator state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::envelope::{self, PayloadKind};
use crate::error::CheckpointError;

/// Current record schema version. Increment whenever a field is added,
/// removed, or changes meaning.
pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// One chunk: its name, declared dependencies and member input ids in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// The chunk name.
    pub name: String,
    /// Names of the chunks it depends on.
    pub deps: Vec<String>,
    /// Member input ids, in compilation order.
    pub inputs: Vec<String>,
}

/// Everything the orchestrator needs to resume a build, except the program
/// tree itself.
///
/// Units are referred to by input id only; their content is not stored and is
/// not revalidated on restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Schema version of this record.
    pub schema_version: u32,
    /// Version of the compiler that wrote it.
    pub compiler_version: String,
    /// Pipeline state name at snapshot time.
    pub stage: String,
    /// Language features the program uses.
    pub feature_set: BTreeSet<String>,
    /// Chunks in topological order.
    pub chunks: Vec<ChunkRecord>,
    /// Extern input ids, in order.
    pub externs: Vec<String>,
    /// Every registered input id, sorted.
    pub registered: Vec<String>,
    /// The change tracker's last stamp.
    pub change_stamp: u64,
    /// Counter behind generated unique names.
    pub unique_name_id: u64,
    /// Generated-name map.
    pub generated_names: BTreeMap<String, String>,
    /// Cross-chunk id generator state, by generator name.
    pub id_generators: BTreeMap<String, String>,
    /// Injected runtime libraries, in injection order.
    pub injected_libraries: Vec<String>,
}

impl CheckpointRecord {
    /// Encodes the record and wraps it in a state envelope.
    pub fn encode(&self) -> Result<Vec<u8>, CheckpointError> {
        let payload = bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(
            |e| CheckpointError::Serialization {
                reason: e.to_string(),
            },
        )?;
        envelope::seal(PayloadKind::State, &payload, &self.compiler_version)
    }

    /// Validates a state envelope and decodes the record inside.
    pub fn decode(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let (_, payload) = envelope::open(bytes, PayloadKind::State)?;
        let (record, _): (CheckpointRecord, usize) =
            bincode::serde::decode_from_slice(payload, bincode::config::standard()).map_err(
                |e| CheckpointError::Serialization {
                    reason: e.to_string(),
                },
            )?;
        if record.schema_version != CHECKPOINT_SCHEMA_VERSION {
            return Err(CheckpointError::SchemaMismatch {
                expected: CHECKPOINT_SCHEMA_VERSION,
                actual: record.schema_version,
            });
        }
        Ok(record)
    }
}

#[cfg(test)]
pub(crate) fn sample_record() -> CheckpointRecord {
    CheckpointRecord {
        schema_version: CHECKPOINT_SCHEMA_VERSION,
        compiler_version: "0.1.0".to_string(),
        stage: "checked".to_string(),
        feature_set: ["es2015".to_string()].into_iter().collect(),
        chunks: vec![
            ChunkRecord {
                name: "base".to_string(),
                deps: vec![],
                inputs: vec!["lib/util.js".to_string()],
            },
            ChunkRecord {
                name: "app".to_string(),
                deps: vec!["base".to_string()],
                inputs: vec!["app/main.js".to_string()],
            },
        ],
        externs: vec!["externs/dom.js".to_string()],
        registered: vec![
            "app/main.js".to_string(),
            "externs/dom.js".to_string(),
            "lib/util.js".to_string(),
        ],
        change_stamp: 42,
        unique_name_id: 7,
        generated_names: [("a".to_string(), "$jscomp$a".to_string())]
            .into_iter()
            .collect(),
        id_generators: BTreeMap::new(),
        injected_libraries: vec!["es6/symbol".to_string(), "es6/map".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode() {
        let record = sample_record();
        let bytes = record.encode().unwrap();
        assert_eq!(CheckpointRecord::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn schema_mismatch_rejected() {
        let mut record = sample_record();
        record.schema_version = CHECKPOINT_SCHEMA_VERSION + 1;
        let bytes = record.encode().unwrap();
        assert!(matches!(
            CheckpointRecord::decode(&bytes).unwrap_err(),
            CheckpointError::SchemaMismatch { .. }
        ));
    }

    #[test]
    fn tree_envelope_is_not_a_record() {
        let bytes = envelope::seal(PayloadKind::Tree, b"tree", "0.1.0").unwrap();
        assert!(CheckpointRecord::decode(&bytes).is_err());
    }

    #[test]
    fn record_is_human_inspectable() {
        let json = serde_json::to_string_pretty(&sample_record()).unwrap();
        assert!(json.contains("\"change_stamp\": 42"));
        assert!(json.contains("\"injected_libraries\""));
    }
}
