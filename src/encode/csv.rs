//! Streaming CSV writer for query rows.

use std::io::Write;

use csv::{Terminator, WriterBuilder};
use tokio_util::sync::CancellationToken;

use crate::config::CsvOutputProperties;
use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// Write rows as CSV and return the number of rows written.
///
/// Lines end with CRLF. The header comes from the first row's column
/// names, so an empty result produces no output at all.
pub fn write_csv<C: Cursor, W: Write>(
    cursor: &mut C,
    out: W,
    props: &CsvOutputProperties,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut writer = WriterBuilder::new()
        .delimiter(props.separator_byte()?)
        .terminator(Terminator::CRLF)
        .has_headers(false)
        .from_writer(out);

    let mut written = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(row) = cursor.next()? else {
            break;
        };
        if written == 0 && props.include_headers {
            writer.write_record(row.column_names())?;
        }
        writer.write_record(row.to_strings())?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}
