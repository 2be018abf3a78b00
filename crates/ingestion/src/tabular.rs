//! Tabular result decoding
//!
//! Query results arrive as pages of rows of optional text cells. The very
//! first row of the first page carries the column names; every later row is
//! data.

use contracts::Record;
use serde_json::{Map, Value};

use crate::transform::expand_encoded_arrays;

/// Stateful page decoder
#[derive(Debug, Default)]
pub struct TabularDecoder {
    header: Option<Vec<String>>,
    decode_json_arrays: bool,
}

impl TabularDecoder {
    pub fn new(decode_json_arrays: bool) -> Self {
        Self {
            header: None,
            decode_json_arrays,
        }
    }

    /// Column names, once the header row has been seen
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Decode one page into records.
    ///
    /// Missing cell values become `""`. Cells past the last column are
    /// ignored; short rows simply lack the trailing fields.
    pub fn decode_page(&mut self, rows: Vec<Vec<Option<String>>>) -> Vec<Record> {
        let mut rows = rows.into_iter();

        if self.header.is_none() {
            let Some(first) = rows.next() else {
                return Vec::new();
            };
            self.header = Some(first.into_iter().map(Option::unwrap_or_default).collect());
        }
        let Some(header) = self.header.as_ref() else {
            return Vec::new();
        };

        let records: Vec<Record> = rows
            .map(|row| {
                let fields: Map<String, Value> = header
                    .iter()
                    .zip(row)
                    .map(|(name, cell)| (name.clone(), Value::String(cell.unwrap_or_default())))
                    .collect();
                Record::new(fields)
            })
            .collect();

        if self.decode_json_arrays {
            records.into_iter().map(expand_encoded_arrays).collect()
        } else {
            records
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(cells: &[Option<&str>]) -> Vec<Option<String>> {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    #[test]
    fn test_header_only_on_first_page() {
        let mut decoder = TabularDecoder::new(false);

        let first = decoder.decode_page(vec![
            row(&[Some("orgno"), Some("name")]),
            row(&[Some("1"), Some("Acme")]),
        ]);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].get("name"), Some(&json!("Acme")));

        // second page has no header row
        let second = decoder.decode_page(vec![row(&[Some("2"), Some("Beta")])]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].get("orgno"), Some(&json!("2")));
    }

    #[test]
    fn test_missing_and_extra_cells() {
        let mut decoder = TabularDecoder::new(false);
        let records = decoder.decode_page(vec![
            row(&[Some("a"), Some("b")]),
            row(&[None, Some("x"), Some("extra")]),
            row(&[Some("only-a")]),
        ]);

        assert_eq!(records[0].get("a"), Some(&json!("")));
        assert_eq!(records[0].len(), 2);
        assert_eq!(records[1].get("a"), Some(&json!("only-a")));
        assert!(records[1].get("b").is_none());
    }

    #[test]
    fn test_array_columns_decoded() {
        let mut decoder = TabularDecoder::new(true);
        let records = decoder.decode_page(vec![
            row(&[Some("tags")]),
            row(&[Some("[\"a\",\"b\"]")]),
        ]);
        assert_eq!(records[0].get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_empty_page() {
        let mut decoder = TabularDecoder::new(false);
        assert!(decoder.decode_page(Vec::new()).is_empty());
        assert!(decoder.header().is_none());
    }
}
