//! Command execution: statement building, parameter attachment, non-query
//! execution and the transactional query path.
//!
//! Everything here is blocking and works on a locked native connection.
//! The async entry points in `tasks` run it inside `spawn_blocking`.

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::{set_command_timeout, IsolationLevel};
use crate::cursor::ResultSetCursor;
use crate::error::{Error, Result};
use crate::mapper::{to_native_parameter, NativeParameter, Placeholder};
use crate::types::{Direction, OutputParameter, ParameterDescriptor};

/// How the command text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum CommandKind {
    /// SQL or PL/SQL text, executed as given.
    #[default]
    Command,
    /// Name of a stored procedure; the call block is generated.
    StoredProcedure,
}

/// A command to run, with its parameters.
#[derive(Debug, Default)]
pub struct CommandSpec {
    /// Command text or stored procedure name.
    pub text: String,
    pub kind: CommandKind,
    /// Call timeout in seconds; zero means no limit.
    pub timeout_seconds: u32,
    /// Match placeholders by name instead of by position.
    pub bind_by_name: bool,
    pub input_parameters: Vec<ParameterDescriptor>,
    pub output_parameters: Vec<ParameterDescriptor>,
}

impl CommandSpec {
    /// Create a text command with no parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the command kind.
    pub fn with_kind(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the call timeout.
    pub fn with_timeout(mut self, timeout_seconds: u32) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set bind-by-name mode.
    pub fn with_bind_by_name(mut self, bind_by_name: bool) -> Self {
        self.bind_by_name = bind_by_name;
        self
    }

    /// Set the input parameters.
    pub fn with_inputs(mut self, inputs: Vec<ParameterDescriptor>) -> Self {
        self.input_parameters = inputs;
        self
    }

    /// Set the output parameters.
    pub fn with_outputs(mut self, outputs: Vec<ParameterDescriptor>) -> Self {
        self.output_parameters = outputs;
        self
    }

    /// Whether this is a row-producing query.
    pub fn is_query(&self) -> bool {
        self.kind == CommandKind::Command && is_query(&self.text)
    }

    /// SQL sent to the database.
    pub fn sql(&self) -> String {
        match self.kind {
            CommandKind::Command => self.text.clone(),
            CommandKind::StoredProcedure => {
                let names = self
                    .input_parameters
                    .iter()
                    .chain(self.output_parameters.iter())
                    .map(ParameterDescriptor::bind_name);
                procedure_call(self.text.trim(), names, self.bind_by_name)
            }
        }
    }

    /// Map every parameter to its native form, inputs first.
    fn native_parameters(&mut self) -> Result<Vec<NativeParameter>> {
        let inputs = std::mem::take(&mut self.input_parameters)
            .into_iter()
            .map(|p| to_native_parameter(p, Some(Direction::Input)));
        let outputs = std::mem::take(&mut self.output_parameters)
            .into_iter()
            .map(|p| to_native_parameter(p, Some(Direction::Output)));
        inputs.chain(outputs).collect()
    }
}

/// Whether `text` starts with a query keyword (`SELECT` or `WITH`).
pub fn is_query(text: &str) -> bool {
    let text = text.trim_start().trim_start_matches('(').trim_start();
    let keyword: String = text
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    keyword.eq_ignore_ascii_case("select") || keyword.eq_ignore_ascii_case("with")
}

/// PL/SQL block calling `procedure` with one placeholder per parameter.
fn procedure_call<'a>(
    procedure: &str,
    names: impl Iterator<Item = &'a str>,
    bind_by_name: bool,
) -> String {
    let args: Vec<String> = names
        .enumerate()
        .map(|(i, name)| {
            if bind_by_name {
                format!("{} => :{}", name, name)
            } else {
                format!(":{}", i + 1)
            }
        })
        .collect();
    if args.is_empty() {
        format!("BEGIN {}; END;", procedure)
    } else {
        format!("BEGIN {}({}); END;", procedure, args.join(", "))
    }
}

/// Raw results of a non-query execution.
#[derive(Debug, Default)]
pub struct CommandOutcome {
    /// Rows affected by the statement; zero for PL/SQL blocks.
    pub rows_affected: u64,
    /// Output parameters in declaration order, with their final values.
    pub output_parameters: Vec<OutputParameter>,
}

fn prepare(
    conn: &oracle::Connection,
    spec: &mut CommandSpec,
) -> Result<(oracle::Statement, Vec<(NativeParameter, Placeholder)>)> {
    set_command_timeout(conn, spec.timeout_seconds)?;
    let sql = spec.sql();
    let bind_by_name = spec.bind_by_name;
    let params = spec.native_parameters()?;

    debug!(
        "Preparing statement with {} parameters (bind by name: {})",
        params.len(),
        bind_by_name
    );
    let mut stmt = conn.statement(&sql).build()?;
    let mut bound = Vec::with_capacity(params.len());
    for (i, param) in params.into_iter().enumerate() {
        let placeholder = param.placeholder(i + 1, bind_by_name);
        param.bind(&mut stmt, &placeholder)?;
        bound.push((param, placeholder));
    }
    Ok((stmt, bound))
}

/// Execute a non-query command and collect its output parameters.
///
/// The isolation level is applied first. The work is committed on success
/// and rolled back on failure. Reference cursor outputs are returned as
/// live handles that still need the connection.
pub fn execute(
    conn: &oracle::Connection,
    mut spec: CommandSpec,
    isolation: IsolationLevel,
) -> Result<CommandOutcome> {
    let result = begin_transaction(conn, isolation).and_then(|()| execute_inner(conn, &mut spec));
    finish_transaction(conn, result)
}

fn execute_inner(conn: &oracle::Connection, spec: &mut CommandSpec) -> Result<CommandOutcome> {
    let (mut stmt, bound) = prepare(conn, spec)?;
    stmt.execute(&[])?;
    let rows_affected = stmt.row_count()?;
    debug!("Command affected {} rows", rows_affected);

    let output_parameters = bound
        .iter()
        .filter(|(param, _)| param.direction == Direction::Output)
        .map(|(param, placeholder)| {
            let value = param.read_output(&stmt, placeholder)?;
            Ok(OutputParameter::new(param.name.clone(), param.data_type, value))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CommandOutcome {
        rows_affected,
        output_parameters,
    })
}

/// Run a query inside an explicit transaction and hand its rows to `consume`.
///
/// The isolation level is applied first, then the query is executed and
/// the cursor handed to `consume`. The transaction commits when `consume`
/// succeeds and rolls back on any failure, including cancellation.
pub fn query<T, F>(
    conn: &oracle::Connection,
    mut spec: CommandSpec,
    isolation: IsolationLevel,
    cancel: &CancellationToken,
    consume: F,
) -> Result<T>
where
    F: FnOnce(&mut ResultSetCursor<'_>) -> Result<T>,
{
    let result = (|| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        begin_transaction(conn, isolation)?;
        let (mut stmt, _bound) = prepare(conn, &mut spec)?;
        let rows = stmt.query(&[])?;
        let mut cursor = ResultSetCursor::new(rows);
        consume(&mut cursor)
    })();
    finish_transaction(conn, result)
}

fn begin_transaction(conn: &oracle::Connection, isolation: IsolationLevel) -> Result<()> {
    if let Some(sql) = isolation.set_transaction_sql() {
        debug!("{}", sql);
        conn.execute(sql, &[])?;
    }
    Ok(())
}

fn finish_transaction<T>(conn: &oracle::Connection, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            conn.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.rollback() {
                warn!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParameterType;

    #[test]
    fn test_is_query() {
        assert!(is_query("SELECT * FROM DecimalTest"));
        assert!(is_query("  select name, value from t"));
        assert!(is_query("WITH x AS (SELECT 1 FROM dual) SELECT * FROM x"));
        assert!(is_query("(SELECT 1 FROM dual)"));
        assert!(!is_query("INSERT INTO t VALUES (1)"));
        assert!(!is_query("BEGIN proc; END;"));
        assert!(!is_query("selected_proc"));
        assert!(!is_query(""));
    }

    #[test]
    fn test_stored_procedure_is_never_a_query() {
        let spec = CommandSpec::new("select_all_users").with_kind(CommandKind::StoredProcedure);
        assert!(!spec.is_query());
    }

    #[test]
    fn test_procedure_call_by_name() {
        let spec = CommandSpec::new("UnitTestProc")
            .with_kind(CommandKind::StoredProcedure)
            .with_bind_by_name(true)
            .with_inputs(vec![ParameterDescriptor::input(
                ":name",
                "risto",
                ParameterType::Varchar2,
            )])
            .with_outputs(vec![ParameterDescriptor::output(
                "address",
                ParameterType::Varchar2,
                255,
            )]);
        assert_eq!(
            spec.sql(),
            "BEGIN UnitTestProc(name => :name, address => :address); END;"
        );
    }

    #[test]
    fn test_procedure_call_positional() {
        let spec = CommandSpec::new("TestProcedure")
            .with_kind(CommandKind::StoredProcedure)
            .with_inputs(vec![ParameterDescriptor::input("b", 1i64, ParameterType::Int32)])
            .with_outputs(vec![ParameterDescriptor::output(
                "a",
                ParameterType::RefCursor,
                0,
            )]);
        assert_eq!(spec.sql(), "BEGIN TestProcedure(:1, :2); END;");

        let bare = CommandSpec::new("refresh_stats").with_kind(CommandKind::StoredProcedure);
        assert_eq!(bare.sql(), "BEGIN refresh_stats; END;");
    }

    #[test]
    fn test_text_command_is_sent_unchanged() {
        let text = "insert into TestTable (textField) values (:param1)";
        assert_eq!(CommandSpec::new(text).sql(), text);
    }

    #[test]
    fn test_native_parameters_inputs_then_outputs() {
        let mut spec = CommandSpec::new("x")
            .with_inputs(vec![ParameterDescriptor::input("in1", "a", ParameterType::Varchar2)])
            .with_outputs(vec![ParameterDescriptor::output(
                "out1",
                ParameterType::Varchar2,
                10,
            )]);
        let params = spec.native_parameters().unwrap();
        assert_eq!(params[0].name, "in1");
        assert_eq!(params[0].direction, Direction::Input);
        assert_eq!(params[1].name, "out1");
        assert_eq!(params[1].direction, Direction::Output);
    }
}
