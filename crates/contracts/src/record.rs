//! Record and Batch - the payload flowing from source to sinks

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One opaque unit of data produced by a source.
///
/// Field names map to arbitrary JSON values. The pipeline never looks inside;
/// only sinks interpret fields (e.g. to derive keys).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Create a record from a field map
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a record from `(name, value)` pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Borrow all fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume into the underlying field map
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Ordered, bounded group of records dispatched together.
///
/// `index` is the zero-based position of the batch within its run.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    index: u64,
    records: Vec<Record>,
}

impl Batch {
    /// Create a batch
    pub fn new(index: u64, records: Vec<Record>) -> Self {
        Self { index, records }
    }

    /// Position of this batch in the run (0-based)
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Records in stream order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume into the owned records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
