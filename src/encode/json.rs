//! Streaming JSON writer for query rows.

use std::io::Write;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use tokio_util::sync::CancellationToken;

use crate::config::JsonOutputProperties;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::types::{Row, Value};

/// Write rows as a JSON array of objects and return the number of rows written.
///
/// Keys follow column order. Numeric columns are numbers, NULL is an
/// empty string. Every column is written, including repeated names.
pub fn write_json<C: Cursor, W: Write>(
    cursor: &mut C,
    out: W,
    props: &JsonOutputProperties,
    cancel: &CancellationToken,
) -> Result<u64> {
    if props.indented {
        write_with(cursor, out, PrettyFormatter::with_indent(b"  "), cancel)
    } else {
        write_with(cursor, out, CompactFormatter, cancel)
    }
}

fn write_with<C: Cursor, W: Write, F: Formatter>(
    cursor: &mut C,
    mut out: W,
    formatter: F,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    let mut seq = serializer.serialize_seq(None)?;
    let mut written = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(row) = cursor.next()? else {
            break;
        };
        seq.serialize_element(&JsonRow(&row))?;
        written += 1;
    }
    SerializeSeq::end(seq)?;
    out.flush()?;
    Ok(written)
}

/// One row as a JSON object, written column by column.
struct JsonRow<'a>(&'a Row);

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0.iter_named() {
            let json = match value {
                Value::Null => serde_json::Value::String(String::new()),
                other => other.to_json(),
            };
            map.serialize_entry(name, &json)?;
        }
        map.end()
    }
}
