use std::sync::Arc;

use crate::types::RowValues;

/// One result set as delivered by a driver, before shaping.
///
/// Column names are shared by every row; each row holds one raw value per column in the
/// same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    column_names: Arc<Vec<String>>,
    rows: Vec<Vec<RowValues>>,
}

impl ResultSet {
    /// Create an empty result set with the given column layout.
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        Self {
            column_names: Arc::new(column_names),
            rows: Vec::new(),
        }
    }

    /// Create an empty result set with a known row capacity.
    #[must_use]
    pub fn with_capacity(column_names: Vec<String>, capacity: usize) -> Self {
        Self {
            column_names: Arc::new(column_names),
            rows: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Add a row. Missing trailing values are padded with `Null`; extra values are dropped.
    pub fn add_row_values(&mut self, mut row_values: Vec<RowValues>) {
        row_values.resize(self.column_names.len(), RowValues::Null);
        self.rows.push(row_values);
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<RowValues>] {
        &self.rows
    }

    pub fn into_rows(self) -> (Arc<Vec<String>>, Vec<Vec<RowValues>>) {
        (self.column_names, self.rows)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything a successful poll yields: the result sets plus the statement summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub result_sets: Vec<ResultSet>,
    pub affected_rows: u64,
    pub last_insert_id: u64,
}

impl QueryResult {
    #[must_use]
    pub fn first_set(&self) -> Option<&ResultSet> {
        self.result_sets.first()
    }

    /// Keep only the first result set.
    #[must_use]
    pub fn into_first_set(mut self) -> Option<ResultSet> {
        if self.result_sets.is_empty() {
            None
        } else {
            Some(self.result_sets.swap_remove(0))
        }
    }
}
