//! Oracle tasks for workflow automation
//!
//! Executes commands, stored procedures and queries against an Oracle
//! database and renders the outcome as affected rows, raw output
//! parameters, an element tree, or XML, JSON and CSV text.
//!
//! # Example
//!
//! ```no_run
//! use oracle_tasks::config::{ConnectionProperties, Options, QueryOutputProperties, QueryProperties};
//! use oracle_tasks::encode::QueryReturnType;
//! use oracle_tasks::{tasks, Result};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connection = ConnectionProperties {
//!         connection_string: "Data Source=localhost:1521/FREEPDB1;User Id=scott;Password=tiger".into(),
//!         timeout_seconds: 30,
//!     };
//!     let query = QueryProperties {
//!         query: "SELECT name, value FROM items".into(),
//!         parameters: Vec::new(),
//!     };
//!     let output = QueryOutputProperties {
//!         return_type: QueryReturnType::Csv,
//!         ..Default::default()
//!     };
//!
//!     let out = tasks::query(query, output, connection, &Options::default(), CancellationToken::new()).await?;
//!     if let Some(text) = out.result.as_ref().and_then(|r| r.as_text()) {
//!         println!("{}", text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod cursor;
pub mod encode;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod output;
pub mod tasks;
pub mod types;

// Re-export main types
pub use connection::{ConnectParams, Connection, ConnectionCache, ConnectionLease, IsolationLevel};
pub use cursor::{Cursor, CursorHandle, MemoryCursor, ResultSetCursor};
pub use encode::{EncodedKind, Element, ExecutionResult, QueryReturnType, ReturnType};
pub use error::{Error, Result};
pub use executor::{CommandKind, CommandSpec};
pub use tasks::{execute_command, execute_query, query, read_ref_cursor, TaskOutput};
pub use types::{
    Column, ColumnInfo, Direction, LobEncoding, LobStream, OutputParameter, ParameterDescriptor,
    ParameterType, Row, Value,
};
