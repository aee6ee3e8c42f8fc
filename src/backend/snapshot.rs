//! Terraform state snapshot parsing.
//!
//! Only the top-level `outputs` object of a state document is read; every
//! entry must carry a `value`, `sensitive` defaults to false (also when
//! null) and `type` is ignored.

use super::FetchError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// One Terraform output
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputEntry {
    pub value: Value,
    #[serde(default, deserialize_with = "null_as_false")]
    pub sensitive: bool,
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Parsed outputs of one state file, keyed by output name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    outputs: BTreeMap<String, OutputEntry>,
}

impl Snapshot {
    /// Parse a Terraform state document
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FetchError> {
        let document: Value = serde_json::from_slice(bytes)
            .map_err(|e| FetchError::Malformed(format!("failed to parse Terraform state: {e}")))?;
        let Value::Object(mut fields) = document else {
            return Err(FetchError::Malformed(
                "Terraform state is not a JSON object".to_string(),
            ));
        };

        let outputs = match fields.remove("outputs") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(outputs) => serde_json::from_value(outputs).map_err(|e| {
                FetchError::Malformed(format!("failed to parse Terraform outputs: {e}"))
            })?,
        };
        Ok(Self { outputs })
    }

    /// Build a snapshot from already-parsed entries
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (String, OutputEntry)>) -> Self {
        Self {
            outputs: entries.into_iter().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OutputEntry)> {
        self.outputs.iter()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OutputEntry> {
        self.outputs.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl IntoIterator for Snapshot {
    type Item = (String, OutputEntry);
    type IntoIter = std::collections::btree_map::IntoIter<String, OutputEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.outputs.into_iter()
    }
}
