use crate::constants::fixed_queries;
use crate::error::{EtlError, Result};
use crate::load::format_number;
use crate::logging::ProgressLog;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, instrument};

/// Rows returned by one statement, in the order SQLite produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// First column of the first row, if any.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// Renders a row as a tuple, e.g. `('JPMorgan Chase', 432.92)`.
pub fn format_row(row: &[Value]) -> String {
    let cells: Vec<String> = row
        .iter()
        .map(|value| match value {
            Value::Null => "None".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => format_number(*f),
            Value::Text(s) => format!("'{}'", s.replace('\'', "\\'")),
            Value::Blob(b) => format!("<{} bytes>", b.len()),
        })
        .collect();
    if cells.len() == 1 {
        format!("({},)", cells[0])
    } else {
        format!("({})", cells.join(", "))
    }
}

/// Executes `sql`, prints each row to stdout and returns them.
#[instrument(skip(conn, log))]
pub fn run_query(conn: &Connection, sql: &str, log: &ProgressLog) -> Result<QueryResult> {
    log.record(&format!("Executing SQL query: {}", sql));

    let query_err = |source| EtlError::Query {
        sql: sql.to_string(),
        source,
    };
    let mut stmt = conn.prepare(sql).map_err(query_err)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<Value>>>()
        })
        .map_err(query_err)?
        .collect::<std::result::Result<Vec<Vec<Value>>, _>>()
        .map_err(query_err)?;

    println!("{}", sql);
    for row in &rows {
        println!("{}", format_row(row));
    }
    debug!("{} rows", rows.len());

    Ok(QueryResult {
        sql: sql.to_string(),
        columns,
        rows,
    })
}

/// Opens `db_path` and runs the fixed analytical queries against `table_name`.
///
/// The connection is released on every exit path.
pub fn run_fixed_queries(db_path: &Path, table_name: &str, log: &ProgressLog) -> Result<Vec<QueryResult>> {
    let conn = Connection::open(db_path)?;
    let results = fixed_queries(table_name)
        .iter()
        .map(|sql| run_query(&conn, sql, log))
        .collect::<Result<Vec<_>>>()?;
    log.record("All queries executed successfully.");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::load_to_db;
    use crate::types::{BankRecord, BankTable};
    use tempfile::tempdir;

    fn converted(name: &str, gbp: f64) -> BankRecord {
        BankRecord {
            name: name.to_string(),
            market_cap_usd: gbp * 1.25,
            market_cap_gbp: Some(gbp),
            market_cap_eur: Some(gbp * 1.1),
            market_cap_inr: Some(gbp * 100.0),
        }
    }

    fn memory_db(gbp_values: &[f64]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Largest_banks (Name TEXT, MC_USD_Billion REAL, MC_GBP_Billion REAL, MC_EUR_Billion REAL, MC_INR_Billion REAL);",
        )
        .unwrap();
        for (i, gbp) in gbp_values.iter().enumerate() {
            conn.execute(
                "INSERT INTO Largest_banks VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![format!("Bank {}", i + 1), gbp * 1.25, gbp, gbp, gbp],
            )
            .unwrap();
        }
        conn
    }

    #[test]
    fn test_average_gbp() {
        let dir = tempdir().unwrap();
        let log = ProgressLog::new(dir.path().join("code_log.txt"));
        let conn = memory_db(&[10.0, 20.0, 30.0]);

        let result = run_query(&conn, "SELECT AVG(MC_GBP_Billion) FROM Largest_banks", &log).unwrap();
        assert_eq!(result.scalar(), Some(&Value::Real(20.0)));
    }

    #[test]
    fn test_select_all_keeps_engine_order() {
        let dir = tempdir().unwrap();
        let log = ProgressLog::new(dir.path().join("code_log.txt"));
        let conn = memory_db(&[3.0, 1.0, 2.0]);

        let result = run_query(&conn, "SELECT * FROM Largest_banks", &log).unwrap();
        assert_eq!(result.columns.len(), 5);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0][0], Value::Text("Bank 1".to_string()));
        assert_eq!(result.rows[1][2], Value::Real(1.0));
    }

    #[test]
    fn test_missing_table_is_query_error() {
        let dir = tempdir().unwrap();
        let log = ProgressLog::new(dir.path().join("code_log.txt"));
        let conn = Connection::open_in_memory().unwrap();

        let err = run_query(&conn, "SELECT * FROM Largest_banks", &log).unwrap_err();
        assert_eq!(err.category(), "QueryError");
        assert!(err.to_string().contains("SELECT * FROM Largest_banks"));

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("Executing SQL query: SELECT * FROM Largest_banks"));
    }

    #[test]
    fn test_format_row() {
        assert_eq!(format_row(&[Value::Text("A".into()), Value::Real(80.0)]), "('A', 80.0)");
        assert_eq!(format_row(&[Value::Real(151.99)]), "(151.99,)");
        assert_eq!(format_row(&[Value::Null]), "(None,)");
    }

    #[test]
    fn test_fixed_queries_return_first_five_names_in_insertion_order() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("Banks.db");
        let log = ProgressLog::new(dir.path().join("code_log.txt"));
        let names = ["G", "A", "F", "B", "E", "C", "D"];
        let table: BankTable = names
            .iter()
            .enumerate()
            .map(|(i, n)| converted(n, (i + 1) as f64 * 10.0))
            .collect::<Vec<_>>()
            .into();
        load_to_db(&table, &db, "Largest_banks", &log).unwrap();

        let results = run_fixed_queries(&db, "Largest_banks", &log).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].rows.len(), 7);
        assert_eq!(results[1].scalar(), Some(&Value::Real(40.0)));

        let top5: Vec<Value> = results[2].rows.iter().map(|r| r[0].clone()).collect();
        let expected: Vec<Value> = names[..5].iter().map(|n| Value::Text(n.to_string())).collect();
        assert_eq!(top5, expected);

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.trim_end().ends_with("All queries executed successfully."));
    }
}
