use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::types::RowValues;

/// A shaped row: column name to value, in column order.
///
/// NULL columns are absent rather than stored, so [`Row::get`] returns `None` both for an
/// unknown column and for a column that was NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    column_names: Arc<Vec<String>>,
    // (column index, value); only non-null columns
    values: Vec<(usize, RowValues)>,
}

impl Row {
    pub(crate) fn new(column_names: Arc<Vec<String>>, values: Vec<(usize, RowValues)>) -> Self {
        Self {
            column_names,
            values,
        }
    }

    /// Get a value by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.values
            .iter()
            .find(|(idx, _)| self.column_names[*idx] == column_name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn contains(&self, column_name: &str) -> bool {
        self.get(column_name).is_some()
    }

    /// Number of non-null columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.values
            .iter()
            .map(|(idx, value)| (self.column_names[*idx].as_str(), value))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
