//! Plain-data serialization of the index.
//!
//! This module specifies the logical shape only — the textual envelope
//! (JSON, bincode, whatever a caller wraps it in) is out of scope.
//! [`SerializedIndex`] derives `serde::{Serialize, Deserialize}` so any
//! `serde` format can carry it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{FieldId, ShortId};
use crate::value::FieldValue;

/// A term's posting list for one field, either the plain version-2 shape
/// or the version-1 shape nested inside a `{ "ds": { ... } }` wrapper.
/// `#[serde(untagged)]` tries each variant positionally, so a loader never
/// needs to branch on the top-level version to parse this: a map with a
/// `ds` key nests, anything else is read as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TermFrequencyMap {
    V1 { ds: HashMap<ShortId, u32> },
    V2(HashMap<ShortId, u32>),
}

impl TermFrequencyMap {
    pub fn into_inner(self) -> HashMap<ShortId, u32> {
        match self {
            TermFrequencyMap::V1 { ds } => ds,
            TermFrequencyMap::V2(map) => map,
        }
    }
}

/// The plain-data shape of a serialized index, current as of
/// `serialization_version = 2`. Document ids are carried as [`FieldValue`]
/// rather than as the engine's generic `ExtId` so this type itself needs no
/// bound on `ExtId`; the caller's `DocumentId` impl converts at the
/// `SearchIndex::to_serializable`/`from_serializable` boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedIndex {
    pub serialization_version: u32,
    pub document_count: u64,
    pub next_short_id: ShortId,
    pub dirt_count: u64,
    pub document_ids: HashMap<ShortId, FieldValue>,
    pub field_ids: HashMap<String, FieldId>,
    pub field_length: HashMap<ShortId, Vec<u32>>,
    pub average_field_length: Vec<f64>,
    pub stored_fields: HashMap<ShortId, HashMap<String, FieldValue>>,
    pub index: Vec<(String, HashMap<FieldId, TermFrequencyMap>)>,
}

pub const CURRENT_VERSION: u32 = 2;
pub const SUPPORTED_VERSIONS: [u32; 2] = [1, 2];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_one_wrapper_unwraps_transparently() {
        let json = serde_json::json!({"ds": {"3": 2, "7": 1}});
        let parsed: TermFrequencyMap = serde_json::from_value(json).unwrap();
        let mut inner: Vec<_> = parsed.into_inner().into_iter().collect();
        inner.sort();
        assert_eq!(inner, vec![(3, 2), (7, 1)]);
    }

    #[test]
    fn version_two_plain_map_parses_directly() {
        let json = serde_json::json!({"3": 2});
        let parsed: TermFrequencyMap = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.into_inner().get(&3), Some(&2));
    }
}
