//! Fixture Line Convention
//!
//! The verification harness feeds records as comma-separated lines of the form
//! `id,field1,field2,field3_int`. This is a test-fixture convention only: each
//! position is mapped onto a typed column name (`field1_s`, `field3_i`, ...).

use super::types::{FieldType, Record, Schema};

/// Column names for `id,field1,field2,field3_int` lines.
pub const FIXTURE_COLUMNS: [&str; 4] = ["id", "field1_s", "field2_s", "field3_i"];

#[derive(Debug, Clone)]
pub struct FixtureLineParser {
    columns: Vec<String>,
}

impl FixtureLineParser {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a line positionally onto the configured columns.
    ///
    /// Empty cells and missing trailing cells are left absent so the codec can
    /// report them; cells beyond the last column are ignored.
    pub fn parse(&self, line: &str) -> Record {
        let id_field = self.columns.first().map(String::as_str).unwrap_or("id");
        let mut record = Record::new(id_field);
        for (column, cell) in self.columns.iter().zip(line.trim().split(',')) {
            if cell.is_empty() {
                continue;
            }
            record = record.with(column.as_str(), cell);
        }
        record
    }

    /// Schema matching the columns: every column required, types from suffixes.
    pub fn schema(&self) -> Schema {
        let id_field = self.columns.first().map(String::as_str).unwrap_or("id");
        let mut schema = Schema::new(id_field);
        for column in self.columns.iter().skip(1) {
            let field_type = super::types::dynamic_field_type(column).unwrap_or(FieldType::Text);
            schema = schema.with_field(column.as_str(), field_type, true);
        }
        schema
    }
}

impl Default for FixtureLineParser {
    fn default() -> Self {
        Self::new(FIXTURE_COLUMNS)
    }
}
