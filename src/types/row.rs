//! Row type for query results.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use oracle::sql_type::{OracleType, Timestamp};
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::column::{Column, ColumnInfo};
use super::value::Value;
use crate::error::{Error, Result};

/// A row of query results: an ordered mapping from column name to value.
#[derive(Debug)]
pub struct Row {
    /// Column values.
    values: Vec<Value>,
    /// Shared column information (reference counted).
    column_info: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with values and shared column info.
    pub fn new(values: Vec<Value>, column_info: Arc<ColumnInfo>) -> Self {
        Self {
            values,
            column_info,
        }
    }

    /// Convert a fetched driver row, reading each cell by its column type.
    pub fn from_driver(row: &oracle::Row, column_info: Arc<ColumnInfo>) -> Result<Self> {
        let values = column_info
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| read_cell(row, i, &col.data_type))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(values, column_info))
    }

    /// Get value by column index (0-based).
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get value by column name (case-insensitive).
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.column_info
            .find_by_name(name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get all values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get column information.
    pub fn columns(&self) -> &[Column] {
        &self.column_info.columns
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.column_info.column_names()
    }

    /// Iterate over `(column name, value)` pairs in column order.
    pub fn iter_named(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.column_info
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .zip(self.values.iter())
    }

    /// Column values coerced to strings, NULL as empty string.
    pub fn to_strings(&self) -> Vec<String> {
        self.values.iter().map(|v| v.to_string()).collect()
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Serializes as a map of raw values (NULL stays null).
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter_named() {
            map.serialize_entry(name, &value.to_json())?;
        }
        map.end()
    }
}

fn read_cell(row: &oracle::Row, i: usize, data_type: &OracleType) -> Result<Value> {
    let value = match data_type {
        OracleType::Int64 => row.get::<_, Option<i64>>(i)?.into(),
        OracleType::Number(_, _) | OracleType::Float(_) => row
            .get::<_, Option<String>>(i)?
            .map(Value::Decimal)
            .unwrap_or(Value::Null),
        OracleType::BinaryFloat | OracleType::BinaryDouble => row.get::<_, Option<f64>>(i)?.into(),
        OracleType::Boolean => row.get::<_, Option<bool>>(i)?.into(),
        OracleType::Date
        | OracleType::Timestamp(_)
        | OracleType::TimestampTZ(_)
        | OracleType::TimestampLTZ(_) => match row.get::<_, Option<Timestamp>>(i)? {
            Some(ts) => Value::Timestamp(timestamp_to_naive(&ts)?),
            None => Value::Null,
        },
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB | OracleType::BFILE => {
            row.get::<_, Option<Vec<u8>>>(i)?.into()
        }
        _ => row.get::<_, Option<String>>(i)?.into(),
    };
    Ok(value)
}

/// Convert a driver timestamp, dropping any time zone offset.
pub(crate) fn timestamp_to_naive(ts: &Timestamp) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(ts.year(), ts.month(), ts.day())
        .and_then(|d| d.and_hms_nano_opt(ts.hour(), ts.minute(), ts.second(), ts.nanosecond()))
        .ok_or_else(|| Error::execution(format!("Timestamp out of range: {}", ts)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_column_info() -> Arc<ColumnInfo> {
        Arc::new(ColumnInfo::new(vec![
            Column::new("NAME", OracleType::Varchar2(100)),
            Column {
                name: "VALUE".to_string(),
                nullable: false,
                data_type: OracleType::Number(10, 0),
            },
        ]))
    }

    #[test]
    fn test_row_access() {
        let row = Row::new(
            vec![Value::from("test"), Value::Decimal("42".to_string())],
            make_test_column_info(),
        );

        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0).and_then(Value::as_str), Some("test"));
        assert_eq!(row.get_by_name("value").and_then(Value::to_i64), Some(42));
        assert_eq!(
            row.get_by_name("VALUE").and_then(Value::as_str),
            row.get_by_name("value").and_then(Value::as_str)
        );
    }

    #[test]
    fn test_row_columns() {
        let row = Row::new(vec![Value::Null, Value::Integer(1)], make_test_column_info());

        let columns = row.columns();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "NAME");
        assert_eq!(columns[1].name, "VALUE");
        assert_eq!(row.to_strings(), vec!["".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_serialize_preserves_column_order() {
        let info = Arc::new(ColumnInfo::new(vec![
            Column::new("zeta", OracleType::Varchar2(10)),
            Column::new("alpha", OracleType::Number(10, 0)),
            Column::new("mid", OracleType::Varchar2(10)),
        ]));
        let row = Row::new(
            vec![Value::from("z"), Value::Decimal("7".into()), Value::Null],
            info,
        );

        // NULL stays null here.
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"zeta":"z","alpha":7,"mid":null}"#
        );
    }

    #[test]
    fn test_timestamp_conversion() {
        let ts = Timestamp::new(2023, 10, 27, 14, 30, 45, 123456000).unwrap();
        let naive = timestamp_to_naive(&ts).unwrap();
        assert_eq!(naive.to_string(), "2023-10-27 14:30:45.123456");
    }
}
