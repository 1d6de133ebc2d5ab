//! Cursors over query results and reference cursors.
//!
//! The `Cursor` trait is the row source the encoders consume. `ResultSetCursor`
//! walks a live driver result set, `MemoryCursor` replays rows already in
//! memory, and `CursorHandle` carries a reference cursor returned as an
//! output parameter until it is read.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use oracle::sql_type::RefCursor;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connection::ConnectionLease;
use crate::error::{Error, Result};
use crate::types::{ColumnInfo, Row};

/// Row source with column metadata read once up front.
///
/// # Example
///
/// ```
/// use oracle_tasks::{Cursor, MemoryCursor};
///
/// fn count_rows<C: Cursor>(cursor: &mut C) -> oracle_tasks::Result<u64> {
///     let mut count = 0;
///     while cursor.next()?.is_some() {
///         count += 1;
///     }
///     Ok(count)
/// }
///
/// let mut cursor = MemoryCursor::empty();
/// assert_eq!(count_rows(&mut cursor).unwrap(), 0);
/// ```
pub trait Cursor {
    /// Column metadata shared by every row.
    fn columns(&self) -> &Arc<ColumnInfo>;

    /// Number of rows fetched so far.
    fn rowcount(&self) -> u64;

    /// Get the next row. Returns `Ok(None)` when exhausted.
    fn next(&mut self) -> Result<Option<Row>>;

    /// Fetch all remaining rows into a vector.
    fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Cursor over a live driver result set.
pub struct ResultSetCursor<'a> {
    rows: oracle::ResultSet<'a, oracle::Row>,
    column_info: Arc<ColumnInfo>,
    rows_fetched: u64,
}

impl<'a> ResultSetCursor<'a> {
    /// Wrap a result set, capturing its column metadata.
    pub fn new(rows: oracle::ResultSet<'a, oracle::Row>) -> Self {
        let column_info = Arc::new(ColumnInfo::from_driver(rows.column_info()));
        Self {
            rows,
            column_info,
            rows_fetched: 0,
        }
    }
}

impl Cursor for ResultSetCursor<'_> {
    fn columns(&self) -> &Arc<ColumnInfo> {
        &self.column_info
    }

    fn rowcount(&self) -> u64 {
        self.rows_fetched
    }

    fn next(&mut self) -> Result<Option<Row>> {
        match self.rows.next() {
            Some(row) => {
                let row = Row::from_driver(&row?, Arc::clone(&self.column_info))?;
                self.rows_fetched += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }
}

/// Cursor over rows already held in memory.
#[derive(Debug)]
pub struct MemoryCursor {
    column_info: Arc<ColumnInfo>,
    rows: VecDeque<Row>,
    rows_fetched: u64,
}

impl MemoryCursor {
    /// Create a cursor over the given rows.
    pub fn new(column_info: Arc<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            column_info,
            rows: rows.into(),
            rows_fetched: 0,
        }
    }

    /// A cursor with no columns and no rows.
    pub fn empty() -> Self {
        Self::new(Arc::new(ColumnInfo::default()), Vec::new())
    }
}

impl Cursor for MemoryCursor {
    fn columns(&self) -> &Arc<ColumnInfo> {
        &self.column_info
    }

    fn rowcount(&self) -> u64 {
        self.rows_fetched
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let row = self.rows.pop_front();
        if row.is_some() {
            self.rows_fetched += 1;
        }
        Ok(row)
    }
}

/// A reference cursor returned through an output parameter.
///
/// The handle keeps the producing connection alive. It can be read once;
/// the connection is released when the handle is dropped.
pub struct CursorHandle {
    cursor: Option<RefCursor>,
    lease: Option<Arc<ConnectionLease>>,
}

impl CursorHandle {
    /// Create a handle that keeps `lease` alive until the handle is dropped.
    pub fn new(cursor: RefCursor, lease: Option<Arc<ConnectionLease>>) -> Self {
        Self {
            cursor: Some(cursor),
            lease,
        }
    }

    /// Attach the connection lease the cursor was opened on.
    ///
    /// Several cursors from one command share the lease.
    pub(crate) fn attach_lease(&mut self, lease: Arc<ConnectionLease>) {
        self.lease = Some(lease);
    }

    /// Whether the cursor has already been read.
    pub fn is_consumed(&self) -> bool {
        self.cursor.is_none()
    }

    /// Read every row of the cursor. Blocks the calling thread.
    ///
    /// Cancellation is checked before each row. A second call fails with an
    /// argument error.
    pub fn read_blocking(&mut self, cancel: &CancellationToken) -> Result<Vec<Row>> {
        let mut cursor = self
            .cursor
            .take()
            .ok_or_else(|| Error::argument("Reference cursor has already been read"))?;

        let _guard = self.lease.as_ref().map(|lease| lease.connection().lock());
        let mut rows = ResultSetCursor::new(cursor.query()?);
        let mut out = Vec::new();
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match rows.next()? {
                Some(row) => out.push(row),
                None => break,
            }
        }
        debug!("Read {} rows from reference cursor", out.len());
        Ok(out)
    }
}

impl fmt::Debug for CursorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorHandle")
            .field("consumed", &self.is_consumed())
            .field("lease", &self.lease)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, Value};
    use oracle::sql_type::OracleType;

    fn sample_rows() -> (Arc<ColumnInfo>, Vec<Row>) {
        let info = Arc::new(ColumnInfo::new(vec![
            Column::new("name", OracleType::Varchar2(20)),
            Column::new("value", OracleType::Number(10, 0)),
        ]));
        let rows = vec![
            Row::new(
                vec![Value::from("hodor"), Value::Decimal("123".into())],
                Arc::clone(&info),
            ),
            Row::new(
                vec![Value::from("jon"), Value::Decimal("321".into())],
                Arc::clone(&info),
            ),
        ];
        (info, rows)
    }

    #[test]
    fn test_memory_cursor_iterates_in_order() {
        let (info, rows) = sample_rows();
        let mut cursor = MemoryCursor::new(info, rows);

        assert_eq!(cursor.columns().column_names(), vec!["name", "value"]);
        let first = cursor.next().unwrap().unwrap();
        assert_eq!(first.get(0).and_then(Value::as_str), Some("hodor"));
        assert_eq!(cursor.rowcount(), 1);

        let rest = cursor.fetch_all().unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(cursor.rowcount(), 2);
        assert!(cursor.next().unwrap().is_none());
        assert_eq!(cursor.rowcount(), 2);
    }

    #[test]
    fn test_empty_cursor() {
        let mut cursor = MemoryCursor::empty();
        assert!(cursor.columns().is_empty());
        assert!(cursor.fetch_all().unwrap().is_empty());
    }
}
