//! Task configuration: the property tabs of each task, with their defaults.
//!
//! Every struct deserializes from JSON or YAML with missing fields filled
//! in from `Default`, so a minimal document only names what differs.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::connection::IsolationLevel;
use crate::encode::{QueryReturnType, ReturnType};
use crate::error::{Error, Result};
use crate::executor::CommandKind;
use crate::types::ParameterDescriptor;

const DEFAULT_CONNECTION_STRING: &str = "Data Source=(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=MyHost)(PORT=MyPort))(CONNECT_DATA=(SERVICE_NAME=MyOracleSID)));User Id=myUsername;Password=myPassword;";
const DEFAULT_TIMEOUT_SECONDS: u32 = 30;

/// Input tab of the command task.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CommandInput {
    pub connection_string: String,
    /// SQL text or stored procedure name.
    pub command_or_procedure_name: String,
    pub command_type: CommandKind,
    pub timeout_seconds: u32,
    pub bind_parameters_by_name: bool,
    pub input_parameters: Vec<ParameterDescriptor>,
    /// Reuse one long-lived connection per connection string.
    pub use_connection_cache: bool,
}

impl Default for CommandInput {
    fn default() -> Self {
        Self {
            connection_string: DEFAULT_CONNECTION_STRING.to_string(),
            command_or_procedure_name: String::new(),
            command_type: CommandKind::Command,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            bind_parameters_by_name: false,
            input_parameters: Vec::new(),
            use_connection_cache: false,
        }
    }
}

/// Output tab of the command task.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommandOutputProperties {
    pub output_parameters: Vec<ParameterDescriptor>,
    pub data_return_type: ReturnType,
}

/// Connection tab of the query tasks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionProperties {
    pub connection_string: String,
    /// Call timeout in seconds; zero means no limit.
    pub timeout_seconds: u32,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            connection_string: DEFAULT_CONNECTION_STRING.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// Query tab of the query tasks.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct QueryProperties {
    pub query: String,
    pub parameters: Vec<ParameterDescriptor>,
}

impl Default for QueryProperties {
    fn default() -> Self {
        Self {
            query: "SELECT ColumnName FROM TableName".to_string(),
            parameters: Vec::new(),
        }
    }
}

/// XML rendering of query rows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XmlOutputProperties {
    pub root_element_name: String,
    pub row_element_name: String,
    /// Row cap; -1 means unlimited.
    pub maximum_rows: i64,
}

impl Default for XmlOutputProperties {
    fn default() -> Self {
        Self {
            root_element_name: "ROWSET".to_string(),
            row_element_name: "ROW".to_string(),
            maximum_rows: -1,
        }
    }
}

impl XmlOutputProperties {
    /// The row cap, or `None` when unlimited.
    pub fn row_limit(&self) -> Option<u64> {
        u64::try_from(self.maximum_rows).ok()
    }
}

/// JSON rendering of query rows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JsonOutputProperties {
    /// Two-space indentation; compact when false.
    pub indented: bool,
}

impl Default for JsonOutputProperties {
    fn default() -> Self {
        Self { indented: true }
    }
}

/// CSV rendering of query rows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsvOutputProperties {
    pub include_headers: bool,
    /// Field separator; must be a single byte.
    pub csv_separator: String,
}

impl Default for CsvOutputProperties {
    fn default() -> Self {
        Self {
            include_headers: true,
            csv_separator: ";".to_string(),
        }
    }
}

impl CsvOutputProperties {
    /// The separator as a single byte.
    pub fn separator_byte(&self) -> Result<u8> {
        match self.csv_separator.as_bytes() {
            [b] => Ok(*b),
            _ => Err(Error::config(format!(
                "CSV separator must be a single byte, got '{}'",
                self.csv_separator
            ))),
        }
    }
}

/// Target file for query output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputFileProperties {
    pub path: PathBuf,
    /// `utf-8`, `utf-8-bom` or `utf-16`.
    pub encoding: String,
}

impl Default for OutputFileProperties {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output.csv"),
            encoding: "utf-8".to_string(),
        }
    }
}

/// Output tab of the query task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryOutputProperties {
    pub return_type: QueryReturnType,
    pub xml_output: XmlOutputProperties,
    pub json_output: JsonOutputProperties,
    pub csv_output: CsvOutputProperties,
    /// Write to `output_file` and return its path instead of the text.
    pub output_to_file: bool,
    pub output_file: OutputFileProperties,
}

/// Options tab shared by all tasks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Return errors instead of a `success = false` output.
    pub throw_error_on_failure: bool,
    /// Used by the transactional query task.
    pub isolation_level: IsolationLevel,
    /// Used by the transactional query task.
    pub bind_parameter_by_name: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            throw_error_on_failure: true,
            isolation_level: IsolationLevel::Default,
            bind_parameter_by_name: true,
        }
    }
}

/// Full configuration of the command task.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommandTaskConfig {
    pub input: CommandInput,
    pub output: CommandOutputProperties,
    pub options: Options,
}

impl CommandTaskConfig {
    /// Load from a `.json` or YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        load(path)
    }
}

/// Full configuration of the query tasks.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueryTaskConfig {
    pub connection: ConnectionProperties,
    pub query: QueryProperties,
    pub output: QueryOutputProperties,
    pub options: Options,
}

impl QueryTaskConfig {
    /// Load from a `.json` or YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        load(path)
    }
}

/// Deserialize a configuration file; `.json` files as JSON, anything else as YAML.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&contents).map_err(|e| Error::config(e.to_string()))
    } else {
        serde_yaml::from_str(&contents).map_err(|e| Error::config(e.to_string()))
    }
}
