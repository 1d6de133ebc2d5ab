//! Streaming XML writer for query rows.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tokio_util::sync::CancellationToken;

use crate::config::XmlOutputProperties;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::types::Row;

/// Write rows as an XML document and return the number of rows written.
///
/// Each row becomes a `row_element_name` element under `root_element_name`
/// with one child per column, named as the database returned it. The
/// declaration names `encoding`. Rows past `maximum_rows` are not read.
///
/// Nothing is written when an element or column name is not a valid XML
/// name, such as `COUNT(*)` for an unaliased expression.
pub fn write_xml<C: Cursor, W: Write>(
    cursor: &mut C,
    out: W,
    props: &XmlOutputProperties,
    encoding: &str,
    cancel: &CancellationToken,
) -> Result<u64> {
    check_element_name(&props.root_element_name)?;
    check_element_name(&props.row_element_name)?;
    for column in &cursor.columns().columns {
        check_element_name(&column.name)?;
    }

    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some(encoding), None)))
        .map_err(Error::encoding)?;

    let limit = props.row_limit();
    let mut written = 0u64;
    let mut root_open = false;

    while limit.map_or(true, |max| written < max) {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(row) = cursor.next()? else {
            break;
        };
        if !root_open {
            writer
                .write_event(Event::Start(BytesStart::new(props.root_element_name.as_str())))
                .map_err(Error::encoding)?;
            root_open = true;
        }
        write_row(&mut writer, &row, &props.row_element_name)?;
        written += 1;
    }

    let root_event = if root_open {
        Event::End(BytesEnd::new(props.root_element_name.as_str()))
    } else {
        Event::Empty(BytesStart::new(props.root_element_name.as_str()))
    };
    writer.write_event(root_event).map_err(Error::encoding)?;
    writer.get_mut().flush()?;
    Ok(written)
}

fn write_row<W: Write>(writer: &mut Writer<W>, row: &Row, row_element: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(row_element)))
        .map_err(Error::encoding)?;
    for (name, value) in row.iter_named() {
        let text = value.to_string();
        if text.is_empty() {
            writer
                .write_event(Event::Empty(BytesStart::new(name)))
                .map_err(Error::encoding)?;
        } else {
            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(Error::encoding)?;
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(Error::encoding)?;
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(Error::encoding)?;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(row_element)))
        .map_err(Error::encoding)
}

/// Reject names that would make the document malformed.
pub(crate) fn check_element_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char);
    if valid {
        Ok(())
    } else {
        Err(Error::encoding(format!("'{}' is not a valid XML element name", name)))
    }
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | '_' | 'A'..='Z' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}
