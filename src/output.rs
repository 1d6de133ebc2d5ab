//! Writing query output to files in a chosen text encoding.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use crate::config::OutputFileProperties;
use crate::error::{Error, Result};

/// Text encoding of an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileEncoding {
    #[default]
    Utf8,
    /// UTF-8 with a byte order mark.
    Utf8Bom,
    /// UTF-16 little endian with a byte order mark.
    Utf16,
}

impl FileEncoding {
    /// Encoding name for an XML declaration.
    pub fn declaration_label(&self) -> &'static str {
        match self {
            FileEncoding::Utf8 | FileEncoding::Utf8Bom => "utf-8",
            FileEncoding::Utf16 => "utf-16",
        }
    }

    fn bom(&self) -> &'static [u8] {
        match self {
            FileEncoding::Utf8 => &[],
            FileEncoding::Utf8Bom => &[0xEF, 0xBB, 0xBF],
            FileEncoding::Utf16 => &[0xFF, 0xFE],
        }
    }
}

impl FromStr for FileEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "utf-8" | "utf8" => Ok(FileEncoding::Utf8),
            "utf-8-bom" | "utf8bom" | "utf-8bom" => Ok(FileEncoding::Utf8Bom),
            "utf-16" | "utf16" | "utf-16le" | "unicode" => Ok(FileEncoding::Utf16),
            other => Err(Error::config(format!("Unknown output file encoding '{}'", other))),
        }
    }
}

/// File writer that takes UTF-8 text and stores it in the target encoding.
///
/// UTF-16 output is transcoded as it is written; a multi-byte character
/// split across writes is held back until it is complete.
pub struct EncodedFileWriter {
    inner: BufWriter<File>,
    encoding: FileEncoding,
    pending: Vec<u8>,
}

impl EncodedFileWriter {
    /// Create (or truncate) `path` and write the byte order mark.
    pub fn create(path: &Path, encoding: FileEncoding) -> Result<Self> {
        let mut inner = BufWriter::new(File::create(path)?);
        inner.write_all(encoding.bom())?;
        Ok(Self {
            inner,
            encoding,
            pending: Vec::new(),
        })
    }

    /// Flush everything to disk.
    pub fn finish(mut self) -> Result<()> {
        if !self.pending.is_empty() {
            return Err(Error::encoding("Output ended inside a UTF-8 sequence"));
        }
        self.inner.flush()?;
        Ok(())
    }

    fn write_utf16(&mut self, buf: &[u8]) -> io::Result<()> {
        self.pending.extend_from_slice(buf);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(s) => s.len(),
            Err(e) if e.error_len().is_some() => {
                return Err(io::Error::new(io::ErrorKind::InvalidData, e));
            }
            Err(e) => e.valid_up_to(),
        };
        let text = std::str::from_utf8(&self.pending[..valid])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let encoded: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        self.inner.write_all(&encoded)?;
        self.pending.drain(..valid);
        Ok(())
    }
}

impl Write for EncodedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.encoding {
            FileEncoding::Utf8 | FileEncoding::Utf8Bom => self.inner.write_all(buf)?,
            FileEncoding::Utf16 => self.write_utf16(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Render into the configured output file and return its path.
///
/// `render` receives the writer and the encoding name to declare. A
/// partially written file is removed when rendering fails.
pub fn write_to_file<F>(props: &OutputFileProperties, render: F) -> Result<PathBuf>
where
    F: FnOnce(&mut EncodedFileWriter, &'static str) -> Result<u64>,
{
    let encoding: FileEncoding = props.encoding.parse()?;
    let path = props.path.clone();
    let mut writer = EncodedFileWriter::create(&path, encoding)?;

    let result = render(&mut writer, encoding.declaration_label()).and_then(|rows| {
        writer.finish()?;
        Ok(rows)
    });
    match result {
        Ok(rows) => {
            info!("Wrote {} rows to {}", rows, path.display());
            Ok(path)
        }
        Err(e) => {
            if let Err(remove_err) = std::fs::remove_file(&path) {
                warn!("Failed to remove partial output {}: {}", path.display(), remove_err);
            }
            Err(e)
        }
    }
}
