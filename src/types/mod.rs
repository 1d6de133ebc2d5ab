//! Parameter, value and result-set types.

mod column;
mod parameter;
mod parameter_type;
mod row;
mod value;

pub use column::{Column, ColumnInfo};
pub use parameter::{Direction, OutputParameter, ParameterDescriptor};
pub use parameter_type::ParameterType;
pub use row::Row;
pub(crate) use row::timestamp_to_naive;
pub use value::{LobEncoding, LobStream, Value};
