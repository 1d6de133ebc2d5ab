//! Integration tests against a live Oracle database.
//!
//! Set `ORACLE_CONNECTION_STRING` (for example in `.env`) to an ADO.NET style
//! connection string with rights to create tables and procedures, e.g.
//! `Data Source=localhost:1521/FREEPDB1;User Id=test;Password=test`.
//! Tests are skipped when it is not set.
//!
//! Run with: cargo test --test test_live

use oracle_tasks::config::{
    CommandInput, CommandOutputProperties, ConnectionProperties, CsvOutputProperties, Options,
    QueryOutputProperties, QueryProperties,
};
use oracle_tasks::{
    execute_command, execute_query, query, read_ref_cursor, CommandKind, ConnectionCache,
    ExecutionResult, IsolationLevel, ParameterDescriptor, ParameterType, QueryReturnType, ReturnType, Value,
};
use tokio_util::sync::CancellationToken;

/// Read the connection string, or skip the test when none is configured.
macro_rules! conn_str_or_skip {
    () => {{
        dotenvy::dotenv().ok();
        match std::env::var("ORACLE_CONNECTION_STRING") {
            Ok(s) if !s.trim().is_empty() => s,
            _ => {
                eprintln!("Skipping test - ORACLE_CONNECTION_STRING not set");
                return;
            }
        }
    }};
}

fn no_cancel() -> CancellationToken {
    CancellationToken::new()
}

fn soft_options() -> Options {
    Options {
        throw_error_on_failure: false,
        ..Default::default()
    }
}

fn command(conn_str: &str, text: &str) -> CommandInput {
    CommandInput {
        connection_string: conn_str.to_string(),
        command_or_procedure_name: text.to_string(),
        ..Default::default()
    }
}

fn affected_rows() -> CommandOutputProperties {
    CommandOutputProperties {
        output_parameters: Vec::new(),
        data_return_type: ReturnType::AffectedRows,
    }
}

/// Run setup SQL, failing the test on error.
async fn run(conn_str: &str, text: &str) {
    let out = execute_command(command(conn_str, text), affected_rows(), &Options::default(), no_cancel())
        .await
        .unwrap_or_else(|e| panic!("Setup failed for `{}`: {}", text, e));
    assert!(out.success);
}

async fn recreate_table(conn_str: &str, table: &str, columns: &str) {
    run(
        conn_str,
        &format!(
            "BEGIN EXECUTE IMMEDIATE 'DROP TABLE {}'; EXCEPTION WHEN OTHERS THEN NULL; END;",
            table
        ),
    )
    .await;
    run(conn_str, &format!("CREATE TABLE {} ({})", table, columns)).await;
}

fn connection(conn_str: &str) -> ConnectionProperties {
    ConnectionProperties {
        connection_string: conn_str.to_string(),
        timeout_seconds: 30,
    }
}

#[tokio::test]
async fn test_invalid_number_returns_failure() {
    let conn_str = conn_str_or_skip!();
    recreate_table(&conn_str, "OT_NUMERIC_TEST", "id NUMBER(10)").await;

    let mut input = command(&conn_str, "insert into OT_NUMERIC_TEST (id) values (:id)");
    input.input_parameters = vec![ParameterDescriptor::input(
        "id",
        "not a number",
        ParameterType::NVarchar2,
    )];

    let out = execute_command(input, affected_rows(), &soft_options(), no_cancel())
        .await
        .unwrap();
    assert!(!out.success);
    let message = out.message.unwrap();
    assert!(message.starts_with("ORA-01722"), "unexpected message: {}", message);
}

#[tokio::test]
async fn test_insert_returns_affected_rows() {
    let conn_str = conn_str_or_skip!();
    recreate_table(&conn_str, "OT_INSERT_TEST", "name VARCHAR2(50), value NUMBER(10)").await;

    let mut input = command(
        &conn_str,
        "insert into OT_INSERT_TEST (name, value) select 'hodor', 123 from dual union all select 'jon', 321 from dual",
    );
    input.timeout_seconds = 0;
    let out = execute_command(input, affected_rows(), &Options::default(), no_cancel())
        .await
        .unwrap();
    assert!(out.success);
    assert_eq!(out.result.unwrap().rows_affected(), Some(2));
}

#[tokio::test]
async fn test_query_renders_csv() {
    let conn_str = conn_str_or_skip!();
    recreate_table(&conn_str, "OT_CSV_TEST", "name VARCHAR2(50), value NUMBER(10)").await;
    run(
        &conn_str,
        "insert into OT_CSV_TEST (name, value) select 'hodor', 123 from dual union all select 'jon', 321 from dual",
    )
    .await;

    let props = QueryProperties {
        query: r#"select name as "name", value as "value" from OT_CSV_TEST where value > :min order by value"#
            .to_string(),
        parameters: vec![ParameterDescriptor::input("min", 0i64, ParameterType::Int32)],
    };
    let output = QueryOutputProperties {
        return_type: QueryReturnType::Csv,
        csv_output: CsvOutputProperties {
            include_headers: true,
            csv_separator: ";".to_string(),
        },
        ..Default::default()
    };

    let out = query(
        props,
        output,
        connection(&conn_str),
        &Options::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(out.success);
    assert_eq!(
        out.result.unwrap().as_text().unwrap(),
        "name;value\r\nhodor;123\r\njon;321\r\n"
    );
}

#[tokio::test]
async fn test_zero_rows_is_success() {
    let conn_str = conn_str_or_skip!();
    recreate_table(&conn_str, "OT_EMPTY_TEST", "id NUMBER(10)").await;

    let props = QueryProperties {
        query: "select * from OT_EMPTY_TEST where id = 42".to_string(),
        parameters: Vec::new(),
    };
    let out = execute_query(
        connection(&conn_str),
        props,
        &Options::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(out.success);
    match out.result.unwrap() {
        ExecutionResult::Rows {
            rows_affected,
            rows,
        } => {
            assert_eq!(rows_affected, 0);
            assert!(rows.is_empty());
        }
        other => panic!("Expected Rows, got {:?}", other),
    }
}

#[tokio::test]
async fn test_statement_runs_at_configured_isolation_level() {
    let conn_str = conn_str_or_skip!();
    // SET TRANSACTION must open the transaction, so it fails when the task
    // has already issued one.
    let props = || QueryProperties {
        query: "SET TRANSACTION ISOLATION LEVEL READ COMMITTED".to_string(),
        parameters: Vec::new(),
    };

    let serializable = Options {
        throw_error_on_failure: false,
        isolation_level: IsolationLevel::Serializable,
        ..Default::default()
    };
    let out = execute_query(connection(&conn_str), props(), &serializable, no_cancel())
        .await
        .unwrap();
    assert!(!out.success);
    let message = out.message.unwrap();
    assert!(message.starts_with("ORA-01453"), "unexpected message: {}", message);

    let unset = Options {
        isolation_level: IsolationLevel::None,
        ..Default::default()
    };
    let out = execute_query(connection(&conn_str), props(), &unset, no_cancel())
        .await
        .unwrap();
    assert!(out.success);
}

#[tokio::test]
async fn test_positional_binding_ignores_names() {
    let conn_str = conn_str_or_skip!();
    recreate_table(&conn_str, "OT_POSITIONAL_TEST", "a VARCHAR2(20), b VARCHAR2(20)").await;

    // Names are swapped relative to placeholders; binding follows order.
    let mut input = command(&conn_str, "insert into OT_POSITIONAL_TEST (a, b) values (:b, :a)");
    input.bind_parameters_by_name = false;
    input.input_parameters = vec![
        ParameterDescriptor::input("a", "first", ParameterType::Varchar2),
        ParameterDescriptor::input("b", "second", ParameterType::Varchar2),
    ];
    execute_command(input, affected_rows(), &Options::default(), no_cancel())
        .await
        .unwrap();

    let props = QueryProperties {
        query: "select a, b from OT_POSITIONAL_TEST".to_string(),
        parameters: Vec::new(),
    };
    let out = execute_query(
        connection(&conn_str),
        props,
        &Options::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    let result = out.result.unwrap();
    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_by_name("A").and_then(Value::as_str), Some("first"));
    assert_eq!(rows[0].get_by_name("B").and_then(Value::as_str), Some("second"));
}

#[tokio::test]
async fn test_stored_procedure_output_as_json() {
    let conn_str = conn_str_or_skip!();
    run(
        &conn_str,
        "CREATE OR REPLACE PROCEDURE OT_ADDRESS_PROC (name IN VARCHAR2, address OUT VARCHAR2) AS \
         BEGIN address := 'haapatie 9'; END;",
    )
    .await;

    let mut input = command(&conn_str, "OT_ADDRESS_PROC");
    input.command_type = CommandKind::StoredProcedure;
    input.bind_parameters_by_name = true;
    input.input_parameters = vec![ParameterDescriptor::input("name", "risto", ParameterType::Varchar2)];
    let output = CommandOutputProperties {
        output_parameters: vec![ParameterDescriptor::output("address", ParameterType::Varchar2, 255)],
        data_return_type: ReturnType::JsonString,
    };

    let out = execute_command(input, output, &Options::default(), no_cancel()).await.unwrap();
    assert_eq!(
        out.result.unwrap().as_text().unwrap(),
        r#"{"address":"haapatie 9"}"#
    );
}

#[tokio::test]
async fn test_ref_cursor_matches_direct_query() {
    let conn_str = conn_str_or_skip!();
    recreate_table(&conn_str, "OT_CURSOR_TEST", "name VARCHAR2(50), value NUMBER(10)").await;
    run(
        &conn_str,
        "insert into OT_CURSOR_TEST (name, value) select 'hodor', 123 from dual union all select 'jon', 321 from dual",
    )
    .await;
    run(
        &conn_str,
        "CREATE OR REPLACE PROCEDURE OT_CURSOR_PROC (rows_out OUT SYS_REFCURSOR) AS \
         BEGIN OPEN rows_out FOR SELECT name, value FROM OT_CURSOR_TEST ORDER BY value; END;",
    )
    .await;

    let mut input = command(&conn_str, "OT_CURSOR_PROC");
    input.command_type = CommandKind::StoredProcedure;
    let output = CommandOutputProperties {
        output_parameters: vec![ParameterDescriptor::output("rows_out", ParameterType::RefCursor, 0)],
        data_return_type: ReturnType::Parameters,
    };
    let out = execute_command(input, output, &Options::default(), no_cancel()).await.unwrap();
    let mut params = out.result.unwrap().into_parameters().unwrap();
    assert!(params[0].value.is_cursor());

    let bridged = read_ref_cursor(&mut params[0], &Options::default(), CancellationToken::new())
        .await
        .unwrap();
    let bridged = bridged.result.unwrap();
    let bridged_rows = bridged.rows().unwrap();

    let direct = execute_query(
        connection(&conn_str),
        QueryProperties {
            query: "SELECT name, value FROM OT_CURSOR_TEST ORDER BY value".to_string(),
            parameters: Vec::new(),
        },
        &Options::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    let direct = direct.result.unwrap();
    let direct_rows = direct.rows().unwrap();

    assert_eq!(bridged_rows.len(), 2);
    assert_eq!(bridged_rows.len(), direct_rows.len());
    for (a, b) in bridged_rows.iter().zip(direct_rows) {
        assert_eq!(a.column_names(), b.column_names());
        assert_eq!(a.to_strings(), b.to_strings());
    }

    // A handle is single-use.
    let again = read_ref_cursor(&mut params[0], &soft_options(), CancellationToken::new())
        .await
        .unwrap();
    assert!(!again.success);
}

#[tokio::test]
async fn test_connection_cache_reuses_connection() {
    let conn_str = conn_str_or_skip!();
    let cache = ConnectionCache::global();

    for _ in 0..2 {
        let mut input = command(&conn_str, "BEGIN NULL; END;");
        input.use_connection_cache = true;
        let out = execute_command(input, affected_rows(), &Options::default(), no_cancel())
            .await
            .unwrap();
        assert_eq!(out.result.unwrap().rows_affected(), Some(0));
    }
    assert!(cache.contains(&conn_str));

    let evicted = cache.evict(&conn_str).unwrap();
    evicted.close_blocking().unwrap();
    assert!(!cache.contains(&conn_str));
}

#[tokio::test]
async fn test_dropped_lease_closes_connection() {
    let conn_str = conn_str_or_skip!();
    let lease = oracle_tasks::connection::acquire(&conn_str, None).await.unwrap();
    let conn = std::sync::Arc::clone(lease.connection());
    assert!(conn.is_open());

    // Dropped on the async worker; the close runs on the blocking pool.
    drop(lease);
    for _ in 0..50 {
        if !conn.is_open() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Connection was not closed after its lease was dropped");
}
