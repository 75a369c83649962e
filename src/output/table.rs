//! Cross-device comparison table.

use std::fmt::Write as _;

/// A named table with one column per device and one labelled row per key.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<(String, Vec<f64>)>,
}

impl Table {
    /// Creates an empty table with the given column names.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row; `values` holds one entry per column.
    pub fn push_row(&mut self, label: impl Into<String>, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.rows.push((label.into(), values));
    }

    /// Output name, e.g. `validity.dat`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows as `(label, values)`.
    pub fn rows(&self) -> &[(String, Vec<f64>)] {
        &self.rows
    }

    /// Looks up the values of the row with `label`.
    pub fn row(&self, label: &str) -> Option<&[f64]> {
        self.rows
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, values)| values.as_slice())
    }

    /// Renders the table as tab-separated text: a header of column names
    /// preceded by an empty cell, then `label\tvalue...` rows with four
    /// decimals.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for column in &self.columns {
            out.push('\t');
            out.push_str(column);
        }
        out.push('\n');

        for (label, values) in &self.rows {
            out.push_str(label);
            for value in values {
                let _ = write!(out, "\t{:.4}", value);
            }
            out.push('\n');
        }
        out
    }
}
