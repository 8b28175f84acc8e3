//! Query result type.

use pgks_driver::Row;

/// The outcome of one executed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Materialized rows, empty for statements without a result set.
    pub rows: Vec<Row>,
    /// Rows matched or returned by the statement.
    pub affected: u64,
}

impl QueryResult {
    /// Create a result from rows and an affected count.
    #[must_use]
    pub fn new(rows: Vec<Row>, affected: u64) -> Self {
        Self { rows, affected }
    }

    /// First row, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Consume the result, returning the first row if any.
    #[must_use]
    pub fn into_first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }

    /// Number of materialized rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no rows were materialized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
