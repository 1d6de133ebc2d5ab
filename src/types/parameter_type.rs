//! Logical parameter data types and their native Oracle equivalents.
//!
//! The variant set is closed: every logical type maps onto exactly one
//! native type, so conversion never fails once a `ParameterType` exists.
//! Unknown type names are rejected while parsing.

use crate::error::{Error, Result};
use oracle::sql_type::OracleType;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// Logical data type of a task parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    NVarchar2,
    Varchar2,
    NChar,
    Char,
    Int16,
    Int32,
    Int64,
    Double,
    Decimal,
    Long,
    LongRaw,
    Boolean,
    Date,
    TimeStamp,
    TimeStampLTZ,
    TimeStampTZ,
    XmlType,
    Raw,
    BFile,
    BinaryDouble,
    BinaryFloat,
    Blob,
    Byte,
    Clob,
    NClob,
    IntervalDS,
    IntervalYM,
    RefCursor,
    Single,
}

/// Fractional second precision used for timestamp binds.
const TIMESTAMP_PRECISION: u8 = 9;

impl ParameterType {
    /// All logical types, in declaration order.
    pub const ALL: [ParameterType; 29] = [
        ParameterType::NVarchar2,
        ParameterType::Varchar2,
        ParameterType::NChar,
        ParameterType::Char,
        ParameterType::Int16,
        ParameterType::Int32,
        ParameterType::Int64,
        ParameterType::Double,
        ParameterType::Decimal,
        ParameterType::Long,
        ParameterType::LongRaw,
        ParameterType::Boolean,
        ParameterType::Date,
        ParameterType::TimeStamp,
        ParameterType::TimeStampLTZ,
        ParameterType::TimeStampTZ,
        ParameterType::XmlType,
        ParameterType::Raw,
        ParameterType::BFile,
        ParameterType::BinaryDouble,
        ParameterType::BinaryFloat,
        ParameterType::Blob,
        ParameterType::Byte,
        ParameterType::Clob,
        ParameterType::NClob,
        ParameterType::IntervalDS,
        ParameterType::IntervalYM,
        ParameterType::RefCursor,
        ParameterType::Single,
    ];

    /// Type name as used in task configuration.
    pub fn name(&self) -> &'static str {
        match self {
            ParameterType::NVarchar2 => "NVarchar2",
            ParameterType::Varchar2 => "Varchar2",
            ParameterType::NChar => "NChar",
            ParameterType::Char => "Char",
            ParameterType::Int16 => "Int16",
            ParameterType::Int32 => "Int32",
            ParameterType::Int64 => "Int64",
            ParameterType::Double => "Double",
            ParameterType::Decimal => "Decimal",
            ParameterType::Long => "Long",
            ParameterType::LongRaw => "LongRaw",
            ParameterType::Boolean => "Boolean",
            ParameterType::Date => "Date",
            ParameterType::TimeStamp => "TimeStamp",
            ParameterType::TimeStampLTZ => "TimeStampLTZ",
            ParameterType::TimeStampTZ => "TimeStampTZ",
            ParameterType::XmlType => "XmlType",
            ParameterType::Raw => "Raw",
            ParameterType::BFile => "BFile",
            ParameterType::BinaryDouble => "BinaryDouble",
            ParameterType::BinaryFloat => "BinaryFloat",
            ParameterType::Blob => "Blob",
            ParameterType::Byte => "Byte",
            ParameterType::Clob => "Clob",
            ParameterType::NClob => "NClob",
            ParameterType::IntervalDS => "IntervalDS",
            ParameterType::IntervalYM => "IntervalYM",
            ParameterType::RefCursor => "RefCursor",
            ParameterType::Single => "Single",
        }
    }

    /// Whether an output buffer of this type needs an explicit size.
    pub fn is_variable_length(&self) -> bool {
        matches!(
            self,
            ParameterType::NVarchar2
                | ParameterType::Varchar2
                | ParameterType::NChar
                | ParameterType::Char
                | ParameterType::Raw
        )
    }

    /// Whether values of this type are character large objects.
    pub fn is_clob(&self) -> bool {
        matches!(self, ParameterType::Clob | ParameterType::NClob)
    }

    /// Native type for a bind of this logical type.
    ///
    /// `size` is the buffer capacity for variable-length types and is
    /// passed through unchanged, so a zero-sized output buffer is reported
    /// by the driver rather than silently truncated.
    pub fn native_type(&self, size: u32) -> OracleType {
        match self {
            ParameterType::NVarchar2 => OracleType::NVarchar2(size),
            ParameterType::Varchar2 => OracleType::Varchar2(size),
            ParameterType::NChar => OracleType::NChar(size),
            ParameterType::Char => OracleType::Char(size),
            ParameterType::Raw => OracleType::Raw(size),
            ParameterType::Int16
            | ParameterType::Int32
            | ParameterType::Int64
            | ParameterType::Byte => OracleType::Int64,
            ParameterType::Decimal => OracleType::Number(0, 0),
            ParameterType::Double | ParameterType::BinaryDouble => OracleType::BinaryDouble,
            ParameterType::Single | ParameterType::BinaryFloat => OracleType::BinaryFloat,
            ParameterType::Long => OracleType::Long,
            ParameterType::LongRaw => OracleType::LongRaw,
            ParameterType::Boolean => OracleType::Boolean,
            ParameterType::Date => OracleType::Date,
            ParameterType::TimeStamp => OracleType::Timestamp(TIMESTAMP_PRECISION),
            ParameterType::TimeStampLTZ => OracleType::TimestampLTZ(TIMESTAMP_PRECISION),
            ParameterType::TimeStampTZ => OracleType::TimestampTZ(TIMESTAMP_PRECISION),
            // XMLType travels as its CLOB serialization.
            ParameterType::XmlType | ParameterType::Clob => OracleType::CLOB,
            ParameterType::NClob => OracleType::NCLOB,
            ParameterType::Blob => OracleType::BLOB,
            ParameterType::BFile => OracleType::BFILE,
            ParameterType::IntervalDS => OracleType::IntervalDS(2, 6),
            ParameterType::IntervalYM => OracleType::IntervalYM(2),
            ParameterType::RefCursor => OracleType::RefCursor,
        }
    }
}

impl FromStr for ParameterType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ParameterType::ALL
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| Error::TypeMapping {
                type_name: s.to_string(),
            })
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ParameterType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for ParameterType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
