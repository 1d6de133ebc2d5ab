//! Parameter descriptors and bound output parameters.

use serde::{Deserialize, Deserializer};

use super::parameter_type::ParameterType;
use super::value::Value;
use crate::cursor::CursorHandle;

/// Direction of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Direction {
    #[default]
    Input,
    Output,
}

/// Logical description of one command parameter.
#[derive(Debug, Deserialize)]
pub struct ParameterDescriptor {
    /// Parameter (placeholder) name.
    pub name: String,
    /// Value bound for input parameters; ignored for output parameters.
    #[serde(default, deserialize_with = "deserialize_value")]
    pub value: Value,
    /// Logical data type.
    #[serde(default = "default_parameter_type")]
    pub data_type: ParameterType,
    /// Output buffer capacity for variable-length types.
    #[serde(default)]
    pub size: u32,
    /// Assigned from the list the descriptor was declared in.
    #[serde(skip)]
    pub direction: Direction,
}

fn default_parameter_type() -> ParameterType {
    ParameterType::NVarchar2
}

fn deserialize_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
    let json = serde_json::Value::deserialize(deserializer)?;
    Ok(Value::from_json(json))
}

impl ParameterDescriptor {
    /// Create an input parameter.
    pub fn input(name: impl Into<String>, value: impl Into<Value>, data_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            data_type,
            size: 0,
            direction: Direction::Input,
        }
    }

    /// Create an output parameter with the given buffer size.
    pub fn output(name: impl Into<String>, data_type: ParameterType, size: u32) -> Self {
        Self {
            name: name.into(),
            value: Value::Null,
            data_type,
            size,
            direction: Direction::Output,
        }
    }

    /// Set the buffer size.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Placeholder name without a leading colon.
    pub fn bind_name(&self) -> &str {
        self.name.trim().trim_start_matches(':')
    }
}

/// An output parameter with the value the database populated.
#[derive(Debug)]
pub struct OutputParameter {
    /// Parameter name.
    pub name: String,
    /// Logical data type the parameter was bound with.
    pub data_type: ParameterType,
    /// Final value after execution.
    pub value: Value,
}

impl OutputParameter {
    /// Create an output parameter result.
    pub fn new(name: impl Into<String>, data_type: ParameterType, value: Value) -> Self {
        Self {
            name: name.into(),
            data_type,
            value,
        }
    }

    /// Take the reference cursor out of this parameter, leaving NULL behind.
    pub fn take_cursor(&mut self) -> Option<CursorHandle> {
        match std::mem::take(&mut self.value) {
            Value::Cursor(handle) => Some(handle),
            other => {
                self.value = other;
                None
            }
        }
    }
}
