//! Task entry points.
//!
//! Each task acquires a connection, runs its blocking driver work in a
//! single `spawn_blocking` closure and passes the outcome through one
//! failure boundary. The connection lease is released when the closure
//! ends, whatever the outcome, unless a reference cursor still needs it.

use std::io::Write;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{
    CommandInput, CommandOutputProperties, ConnectionProperties, Options, QueryOutputProperties,
    QueryProperties,
};
use crate::connection::{self, ConnectionCache, IsolationLevel};
use crate::cursor::Cursor;
use crate::encode::{
    encode_parameters, write_csv, write_json, write_xml, ExecutionResult, QueryReturnType,
};
use crate::error::{Error, Result};
use crate::executor::{self, CommandSpec};
use crate::output::write_to_file;
use crate::types::{OutputParameter, Row, Value};

/// Outcome of a task invocation.
#[derive(Debug)]
pub struct TaskOutput {
    pub success: bool,
    /// Error message; set only when `success` is false.
    pub message: Option<String>,
    pub result: Option<ExecutionResult>,
}

impl TaskOutput {
    fn succeeded(result: ExecutionResult) -> Self {
        Self {
            success: true,
            message: None,
            result: Some(result),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            message: Some(message),
            result: None,
        }
    }
}

/// The failure boundary shared by every task.
///
/// With `throw_error_on_failure` the error is returned as is; otherwise it
/// becomes a `success = false` output carrying the error message.
fn conclude(result: Result<ExecutionResult>, options: &Options) -> Result<TaskOutput> {
    match result {
        Ok(result) => Ok(TaskOutput::succeeded(result)),
        Err(e) if options.throw_error_on_failure => Err(e),
        Err(e) => {
            warn!("Task failed: {}", e);
            Ok(TaskOutput::failed(e.to_string()))
        }
    }
}

/// Execute a command or stored procedure and encode its output parameters.
///
/// A reference cursor among the outputs keeps the connection open until
/// the returned parameter is dropped; read it with [`read_ref_cursor`].
/// `cancel` is checked before connecting and before executing.
pub async fn execute_command(
    input: CommandInput,
    output: CommandOutputProperties,
    options: &Options,
    cancel: CancellationToken,
) -> Result<TaskOutput> {
    conclude(run_command(input, output, cancel).await, options)
}

async fn run_command(
    input: CommandInput,
    output: CommandOutputProperties,
    cancel: CancellationToken,
) -> Result<ExecutionResult> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let cache = input.use_connection_cache.then(ConnectionCache::global);
    let lease = Arc::new(connection::acquire(&input.connection_string, cache).await?);

    let spec = CommandSpec {
        text: input.command_or_procedure_name,
        kind: input.command_type,
        timeout_seconds: input.timeout_seconds,
        bind_by_name: input.bind_parameters_by_name,
        input_parameters: input.input_parameters,
        output_parameters: output.output_parameters,
    };
    let return_type = output.data_return_type;
    info!("Executing {:?} with return type {:?}", spec.kind, return_type);

    tokio::task::spawn_blocking(move || {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut outcome = {
            let conn = lease.connection().lock();
            executor::execute(&conn, spec, IsolationLevel::None)?
        };
        for param in &mut outcome.output_parameters {
            if let Value::Cursor(handle) = &mut param.value {
                handle.attach_lease(Arc::clone(&lease));
            }
        }
        encode_parameters(outcome.output_parameters, outcome.rows_affected, return_type)
    })
    .await?
}

/// Run a query and render its rows as XML, JSON or CSV.
///
/// The query runs in a transaction at the configured isolation level and
/// binds parameters by name. Rows are streamed to the output, inline or to
/// a file, checking `cancel` between rows.
pub async fn query(
    query: QueryProperties,
    output: QueryOutputProperties,
    connection: ConnectionProperties,
    options: &Options,
    cancel: CancellationToken,
) -> Result<TaskOutput> {
    let isolation = options.isolation_level;
    let result = async {
        let lease = connection::acquire(&connection.connection_string, None).await?;
        let spec = CommandSpec::new(query.query)
            .with_timeout(connection.timeout_seconds)
            .with_bind_by_name(true)
            .with_inputs(query.parameters);

        tokio::task::spawn_blocking(move || {
            let conn = lease.connection().lock();
            executor::query(&conn, spec, isolation, &cancel, |cursor| {
                render_rows(cursor, &output, &cancel)
            })
        })
        .await?
    }
    .await;
    conclude(result, options)
}

fn render_rows<C: Cursor>(
    cursor: &mut C,
    output: &QueryOutputProperties,
    cancel: &CancellationToken,
) -> Result<ExecutionResult> {
    if output.output_to_file {
        let path = write_to_file(&output.output_file, |writer, encoding| {
            write_rows(cursor, writer, output, encoding, cancel)
        })?;
        return Ok(ExecutionResult::File(path));
    }

    let mut buf = Vec::new();
    let rows = write_rows(cursor, &mut buf, output, "utf-8", cancel)?;
    debug!("Rendered {} rows as {:?}", rows, output.return_type);
    Ok(ExecutionResult::Encoded {
        kind: output.return_type.into(),
        content: String::from_utf8(buf).map_err(Error::encoding)?,
    })
}

fn write_rows<C: Cursor, W: Write>(
    cursor: &mut C,
    out: W,
    output: &QueryOutputProperties,
    encoding: &str,
    cancel: &CancellationToken,
) -> Result<u64> {
    match output.return_type {
        QueryReturnType::Xml => write_xml(cursor, out, &output.xml_output, encoding, cancel),
        QueryReturnType::Json => write_json(cursor, out, &output.json_output, cancel),
        QueryReturnType::Csv => write_csv(cursor, out, &output.csv_output, cancel),
    }
}

/// Execute a statement in an explicit transaction at the configured
/// isolation level and return its rows.
///
/// Queries return their rows with zero affected rows; other statements
/// return their affected row count and no rows.
pub async fn execute_query(
    connection: ConnectionProperties,
    query: QueryProperties,
    options: &Options,
    cancel: CancellationToken,
) -> Result<TaskOutput> {
    let isolation = options.isolation_level;
    let bind_by_name = options.bind_parameter_by_name;
    let result = async {
        let lease = connection::acquire(&connection.connection_string, None).await?;
        let spec = CommandSpec::new(query.query)
            .with_timeout(connection.timeout_seconds)
            .with_bind_by_name(bind_by_name)
            .with_inputs(query.parameters);

        tokio::task::spawn_blocking(move || {
            let conn = lease.connection().lock();
            if spec.is_query() {
                let rows = executor::query(&conn, spec, isolation, &cancel, |cursor| {
                    collect_rows(cursor, &cancel)
                })?;
                info!("Query returned {} rows", rows.len());
                Ok(ExecutionResult::Rows {
                    rows_affected: 0,
                    rows,
                })
            } else {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let outcome = executor::execute(&conn, spec, isolation)?;
                Ok(ExecutionResult::Rows {
                    rows_affected: outcome.rows_affected,
                    rows: Vec::new(),
                })
            }
        })
        .await?
    }
    .await;
    conclude(result, options)
}

fn collect_rows<C: Cursor>(cursor: &mut C, cancel: &CancellationToken) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match cursor.next()? {
            Some(row) => rows.push(row),
            None => return Ok(rows),
        }
    }
}

/// Read the rows of a reference cursor returned by [`execute_command`].
///
/// The parameter must hold a live cursor. Its rows are read once, keyed by
/// the cursor's column names, with raw values. The connection stays open
/// until `parameter` is dropped.
pub async fn read_ref_cursor(
    parameter: &mut OutputParameter,
    options: &Options,
    cancel: CancellationToken,
) -> Result<TaskOutput> {
    let result = async {
        let mut handle = parameter.take_cursor().ok_or_else(|| {
            Error::argument(format!(
                "Parameter '{}' does not hold a reference cursor",
                parameter.name
            ))
        })?;

        let (handle, rows) = tokio::task::spawn_blocking(move || {
            let rows = handle.read_blocking(&cancel);
            (handle, rows)
        })
        .await?;
        parameter.value = Value::Cursor(handle);

        let rows = rows?;
        debug!("Reference cursor '{}' yielded {} rows", parameter.name, rows.len());
        Ok(ExecutionResult::Rows {
            rows_affected: 0,
            rows,
        })
    }
    .await;
    conclude(result, options)
}
