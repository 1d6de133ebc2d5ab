//! Parameter mapping: logical descriptors to native binds and back.

use chrono::{Datelike, NaiveDateTime, Timelike};
use oracle::sql_type::{OracleType, RefCursor, Timestamp, ToSql};
use oracle::Statement;

use crate::cursor::CursorHandle;
use crate::error::{Error, Result};
use crate::types::{
    timestamp_to_naive, Direction, LobStream, ParameterDescriptor, ParameterType, Value,
};

/// How a parameter is matched to its placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// 1-based position in the statement.
    Position(usize),
    /// Placeholder name without the leading colon.
    Name(String),
}

/// Owned input value in a shape the driver can bind.
#[derive(Debug)]
enum BindValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Bytes(Vec<u8>),
    Timestamp(Timestamp),
}

/// A parameter ready to be attached to a statement.
#[derive(Debug)]
pub struct NativeParameter {
    /// Parameter name as declared.
    pub name: String,
    /// Logical type the caller declared.
    pub data_type: ParameterType,
    /// Native type, sized for output buffers.
    pub native_type: OracleType,
    /// Bind direction.
    pub direction: Direction,
    value: BindValue,
}

/// Convert a logical descriptor into a native parameter.
///
/// `direction` overrides the direction stored on the descriptor. Output
/// parameters carry their size into the native type; inputs ignore it.
/// Stream inputs are drained here.
pub fn to_native_parameter(
    descriptor: ParameterDescriptor,
    direction: Option<Direction>,
) -> Result<NativeParameter> {
    let direction = direction.unwrap_or(descriptor.direction);
    let data_type = descriptor.data_type;
    let (native_type, value) = match direction {
        Direction::Output => (data_type.native_type(descriptor.size), BindValue::Null),
        Direction::Input => {
            let value = to_bind_value(descriptor.value, data_type, &descriptor.name)?;
            (data_type.native_type(value.input_size(data_type)), value)
        }
    };

    Ok(NativeParameter {
        name: descriptor.name,
        data_type,
        native_type,
        direction,
        value,
    })
}

impl NativeParameter {
    /// Placeholder for this parameter given its 1-based position.
    pub fn placeholder(&self, position: usize, bind_by_name: bool) -> Placeholder {
        if bind_by_name {
            Placeholder::Name(self.name.trim().trim_start_matches(':').to_string())
        } else {
            Placeholder::Position(position)
        }
    }

    /// Attach this parameter to a statement.
    pub fn bind(&self, stmt: &mut Statement, placeholder: &Placeholder) -> Result<()> {
        let ty = &self.native_type;
        match &self.value {
            BindValue::Null => bind_at(stmt, placeholder, ty),
            BindValue::Text(v) => bind_at(stmt, placeholder, &(v, ty)),
            BindValue::Integer(v) => bind_at(stmt, placeholder, &(v, ty)),
            BindValue::Float(v) => bind_at(stmt, placeholder, &(v, ty)),
            BindValue::Boolean(v) => bind_at(stmt, placeholder, &(v, ty)),
            BindValue::Bytes(v) => bind_at(stmt, placeholder, &(v, ty)),
            BindValue::Timestamp(v) => bind_at(stmt, placeholder, &(v, ty)),
        }
    }

    /// Read the final value of an output parameter after execution.
    ///
    /// Character large objects come back as streams and reference cursors
    /// as live handles; everything else is read by its logical type.
    pub fn read_output(&self, stmt: &Statement, placeholder: &Placeholder) -> Result<Value> {
        let value = match self.data_type {
            ParameterType::Int16
            | ParameterType::Int32
            | ParameterType::Int64
            | ParameterType::Byte => value_at::<Option<i64>>(stmt, placeholder)?.into(),
            ParameterType::Decimal => value_at::<Option<String>>(stmt, placeholder)?
                .map(Value::Decimal)
                .unwrap_or(Value::Null),
            ParameterType::Double
            | ParameterType::BinaryDouble
            | ParameterType::Single
            | ParameterType::BinaryFloat => value_at::<Option<f64>>(stmt, placeholder)?.into(),
            ParameterType::Boolean => value_at::<Option<bool>>(stmt, placeholder)?.into(),
            ParameterType::Date
            | ParameterType::TimeStamp
            | ParameterType::TimeStampLTZ
            | ParameterType::TimeStampTZ => match value_at::<Option<Timestamp>>(stmt, placeholder)? {
                Some(ts) => Value::Timestamp(timestamp_to_naive(&ts)?),
                None => Value::Null,
            },
            ParameterType::Raw
            | ParameterType::LongRaw
            | ParameterType::Blob
            | ParameterType::BFile => value_at::<Option<Vec<u8>>>(stmt, placeholder)?.into(),
            ParameterType::Clob | ParameterType::NClob => {
                match value_at::<Option<String>>(stmt, placeholder)? {
                    Some(text) => Value::Stream(LobStream::from_text(text)),
                    None => Value::Null,
                }
            }
            ParameterType::RefCursor => match value_at::<Option<RefCursor>>(stmt, placeholder)? {
                Some(cursor) => Value::Cursor(CursorHandle::new(cursor, None)),
                None => Value::Null,
            },
            ParameterType::NVarchar2
            | ParameterType::Varchar2
            | ParameterType::NChar
            | ParameterType::Char
            | ParameterType::Long
            | ParameterType::XmlType
            | ParameterType::IntervalDS
            | ParameterType::IntervalYM => value_at::<Option<String>>(stmt, placeholder)?.into(),
        };
        Ok(value)
    }
}

fn bind_at(stmt: &mut Statement, placeholder: &Placeholder, value: &dyn ToSql) -> Result<()> {
    match placeholder {
        Placeholder::Position(pos) => stmt.bind(*pos, value)?,
        Placeholder::Name(name) => stmt.bind(name.as_str(), value)?,
    }
    Ok(())
}

fn value_at<T: oracle::sql_type::FromSql>(stmt: &Statement, placeholder: &Placeholder) -> Result<T> {
    let value = match placeholder {
        Placeholder::Position(pos) => stmt.bind_value(*pos)?,
        Placeholder::Name(name) => stmt.bind_value(name.as_str())?,
    };
    Ok(value)
}

impl BindValue {
    /// Inputs of variable-length types are sized to fit their value.
    fn input_size(&self, data_type: ParameterType) -> u32 {
        if !data_type.is_variable_length() {
            return 0;
        }
        let len = match self {
            BindValue::Null => 1,
            BindValue::Text(s) => s.len(),
            BindValue::Bytes(b) => b.len(),
            BindValue::Integer(i) => i.to_string().len(),
            BindValue::Float(f) => f.to_string().len(),
            BindValue::Boolean(b) => b.to_string().len(),
            BindValue::Timestamp(ts) => ts.to_string().len(),
        };
        u32::try_from(len.max(1)).unwrap_or(u32::MAX)
    }
}

fn to_bind_value(value: Value, data_type: ParameterType, name: &str) -> Result<BindValue> {
    let bind = match value {
        Value::Null => BindValue::Null,
        Value::Text(s) | Value::Decimal(s) => BindValue::Text(s),
        Value::Integer(i) => BindValue::Integer(i),
        Value::Float(f) => BindValue::Float(f),
        Value::Boolean(b) => BindValue::Boolean(b),
        Value::Bytes(b) => BindValue::Bytes(b),
        Value::Timestamp(ts) => BindValue::Timestamp(naive_to_timestamp(&ts)?),
        Value::Stream(mut stream) => match data_type {
            ParameterType::Raw
            | ParameterType::LongRaw
            | ParameterType::Blob
            | ParameterType::BFile => BindValue::Bytes(stream.read_to_bytes()?),
            _ => BindValue::Text(stream.read_to_string()?),
        },
        Value::Cursor(_) => {
            return Err(Error::argument(format!(
                "Parameter '{}': a reference cursor cannot be bound as input",
                name
            )))
        }
    };
    Ok(bind)
}

fn naive_to_timestamp(ts: &NaiveDateTime) -> Result<Timestamp> {
    Ok(Timestamp::new(
        ts.year(),
        ts.month(),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second(),
        ts.nanosecond(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_output_size_is_propagated() {
        let p = ParameterDescriptor::output("address", ParameterType::Varchar2, 255);
        let native = to_native_parameter(p, None).unwrap();
        assert_eq!(native.direction, Direction::Output);
        assert_eq!(native.native_type, OracleType::Varchar2(255));

        // Zero stays zero; the driver reports it.
        let p = ParameterDescriptor::output("address", ParameterType::NVarchar2, 0);
        let native = to_native_parameter(p, None).unwrap();
        assert_eq!(native.native_type, OracleType::NVarchar2(0));
    }

    #[test]
    fn test_input_ignores_declared_size() {
        let p = ParameterDescriptor::input("name", "Risto", ParameterType::Varchar2).with_size(1);
        let native = to_native_parameter(p, None).unwrap();
        assert_eq!(native.native_type, OracleType::Varchar2(5));

        let p = ParameterDescriptor::input("id", 7i64, ParameterType::Int32).with_size(100);
        let native = to_native_parameter(p, None).unwrap();
        assert_eq!(native.native_type, OracleType::Int64);
    }

    #[test]
    fn test_direction_override() {
        let p = ParameterDescriptor::input("out", Value::Null, ParameterType::Varchar2).with_size(50);
        let native = to_native_parameter(p, Some(Direction::Output)).unwrap();
        assert_eq!(native.direction, Direction::Output);
        assert_eq!(native.native_type, OracleType::Varchar2(50));
    }

    #[test]
    fn test_every_logical_type_maps() {
        for ty in ParameterType::ALL {
            let p = ParameterDescriptor::output("p", ty, 10);
            assert!(to_native_parameter(p, None).is_ok(), "{} failed to map", ty);
        }
    }

    #[test]
    fn test_stream_input_is_drained() {
        let p = ParameterDescriptor::input(
            "doc",
            Value::Stream(LobStream::from_text("<a>1</a>")),
            ParameterType::Clob,
        );
        let native = to_native_parameter(p, None).unwrap();
        assert!(matches!(native.value, BindValue::Text(ref s) if s == "<a>1</a>"));

        let p = ParameterDescriptor::input(
            "img",
            Value::Stream(LobStream::from_bytes(vec![1, 2, 3])),
            ParameterType::Blob,
        );
        let native = to_native_parameter(p, None).unwrap();
        assert!(matches!(native.value, BindValue::Bytes(ref b) if b == &[1, 2, 3]));
    }

    #[test]
    fn test_placeholders() {
        let p = ParameterDescriptor::input(":first_name", "Saija", ParameterType::Varchar2);
        let native = to_native_parameter(p, None).unwrap();
        assert_eq!(native.placeholder(2, false), Placeholder::Position(2));
        assert_eq!(
            native.placeholder(2, true),
            Placeholder::Name("first_name".to_string())
        );
    }

    #[test]
    fn test_timestamp_round_trip_through_driver_type() {
        let naive = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_nano_opt(23, 59, 58, 500_000_000)
            .unwrap();
        let ts = naive_to_timestamp(&naive).unwrap();
        assert_eq!(timestamp_to_naive(&ts).unwrap(), naive);
    }
}
