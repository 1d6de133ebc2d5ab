//! Column and ColumnInfo types for result sets.

use oracle::sql_type::OracleType;

/// A column in a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name as returned by the database (case preserved).
    pub name: String,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Column data type.
    pub data_type: OracleType,
}

impl Column {
    /// Create a nullable column.
    pub fn new(name: impl Into<String>, data_type: OracleType) -> Self {
        Self {
            name: name.into(),
            nullable: true,
            data_type,
        }
    }

    /// Create a column from driver metadata.
    pub fn from_driver(info: &oracle::ColumnInfo) -> Self {
        Self {
            name: info.name().to_string(),
            nullable: info.nullable(),
            data_type: info.oracle_type().clone(),
        }
    }
}

/// Shared column information for all rows in a result set.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    /// Column definitions.
    pub columns: Vec<Column>,
}

impl ColumnInfo {
    /// Create new column info from columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Create column info from driver metadata, read once per result set.
    pub fn from_driver(infos: &[oracle::ColumnInfo]) -> Self {
        Self {
            columns: infos.iter().map(Column::from_driver).collect(),
        }
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column by index.
    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Find column index by name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}
