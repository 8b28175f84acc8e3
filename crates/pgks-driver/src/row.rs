//! Row representation for query results.
//!
//! A [`Row`] is an ordered mapping from column name to value. Column names
//! are shared across all rows of a result set via `Arc<[String]>`, so
//! cloning a row never duplicates the metadata. Rows carry no reference to
//! the connection that produced them.

use std::sync::Arc;

use crate::value::SqlValue;

/// A row from a query result.
///
/// Values are accessible both by column name and by position:
///
/// ```rust
/// use std::sync::Arc;
/// use pgks_driver::{Row, SqlValue};
///
/// let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
/// let row = Row::new(columns, vec![SqlValue::Int(1), SqlValue::from("Alice")]);
///
/// assert_eq!(row.get("id"), row.get_index(0));
/// assert_eq!(row.get("name").and_then(|v| v.as_str()), Some("Alice"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column names, shared across the result set.
    columns: Arc<[String]>,
    /// Column values, positionally aligned with `columns`.
    values: Vec<SqlValue>,
}

impl Row {
    /// Create a row from shared column names and positional values.
    ///
    /// The driver is expected to produce values aligned with the column
    /// list; a shorter value vector simply yields `None` for the missing
    /// positions.
    #[must_use]
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column name (ASCII-case-insensitive, first match).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        let index = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))?;
        self.values.get(index)
    }

    /// Get a value by position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Column names, in result-set order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume the row, returning its values in column order.
    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}
