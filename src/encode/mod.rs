//! Result encoding: output parameters and query rows rendered as the
//! requested output kind.

mod csv;
mod json;
mod tree;
mod xml;

pub use self::csv::write_csv;
pub use self::json::write_json;
pub use self::tree::Element;
pub use self::xml::write_xml;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::types::{OutputParameter, Row};

/// Output kind of the command task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnType {
    /// Number of affected rows.
    AffectedRows,
    /// The output parameters as returned by the driver.
    Parameters,
    /// Element tree of the output parameters.
    XDocument,
    /// The element tree as XML text.
    #[default]
    XmlString,
    /// The element tree as JSON text.
    JsonString,
}

impl FromStr for ReturnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "affectedrows" => Ok(ReturnType::AffectedRows),
            "parameters" => Ok(ReturnType::Parameters),
            "xdocument" => Ok(ReturnType::XDocument),
            "xmlstring" => Ok(ReturnType::XmlString),
            "jsonstring" => Ok(ReturnType::JsonString),
            _ => Err(Error::unsupported_return_type(s)),
        }
    }
}

impl<'de> Deserialize<'de> for ReturnType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Output kind of the query task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum QueryReturnType {
    #[default]
    Xml,
    Json,
    Csv,
}

/// Text format of an encoded result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedKind {
    Json,
    Xml,
    Csv,
}

impl fmt::Display for EncodedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncodedKind::Json => "JSON",
            EncodedKind::Xml => "XML",
            EncodedKind::Csv => "CSV",
        };
        f.write_str(name)
    }
}

impl From<QueryReturnType> for EncodedKind {
    fn from(kind: QueryReturnType) -> Self {
        match kind {
            QueryReturnType::Xml => EncodedKind::Xml,
            QueryReturnType::Json => EncodedKind::Json,
            QueryReturnType::Csv => EncodedKind::Csv,
        }
    }
}

/// The result of one task invocation.
#[derive(Debug)]
pub enum ExecutionResult {
    /// Rows affected by a command.
    AffectedRows(u64),
    /// Output parameters with their final values.
    Parameters(Vec<OutputParameter>),
    /// Element tree of the output parameters.
    Tree(Element),
    /// Rendered text.
    Encoded { kind: EncodedKind, content: String },
    /// Materialized rows of a transactional query.
    Rows { rows_affected: u64, rows: Vec<Row> },
    /// Path of the file the output was written to.
    File(PathBuf),
}

impl ExecutionResult {
    /// The rendered text, if this is an encoded result.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ExecutionResult::Encoded { content, .. } => Some(content),
            _ => None,
        }
    }

    /// The affected row count, if known.
    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            ExecutionResult::AffectedRows(n) => Some(*n),
            ExecutionResult::Rows { rows_affected, .. } => Some(*rows_affected),
            _ => None,
        }
    }

    /// The output parameters, if returned raw.
    pub fn parameters(&self) -> Option<&[OutputParameter]> {
        match self {
            ExecutionResult::Parameters(params) => Some(params),
            _ => None,
        }
    }

    /// Take the output parameters, if returned raw.
    pub fn into_parameters(self) -> Option<Vec<OutputParameter>> {
        match self {
            ExecutionResult::Parameters(params) => Some(params),
            _ => None,
        }
    }

    /// The materialized rows, if any.
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            ExecutionResult::Rows { rows, .. } => Some(rows),
            _ => None,
        }
    }
}

/// Encode the outcome of a command as the requested kind.
///
/// `AffectedRows` never looks at the parameters and `Parameters` hands
/// them back untouched. The other kinds build a `Root` element with one
/// child per output parameter, draining character large objects.
pub fn encode_parameters(
    output_parameters: Vec<OutputParameter>,
    rows_affected: u64,
    kind: ReturnType,
) -> Result<ExecutionResult> {
    let result = match kind {
        ReturnType::AffectedRows => ExecutionResult::AffectedRows(rows_affected),
        ReturnType::Parameters => ExecutionResult::Parameters(output_parameters),
        ReturnType::XDocument => ExecutionResult::Tree(Element::from_parameters(output_parameters)?),
        ReturnType::XmlString => ExecutionResult::Encoded {
            kind: EncodedKind::Xml,
            content: Element::from_parameters(output_parameters)?.to_xml_string()?,
        },
        ReturnType::JsonString => ExecutionResult::Encoded {
            kind: EncodedKind::Json,
            content: Element::from_parameters(output_parameters)?.to_json_string()?,
        },
    };
    Ok(result)
}
