use crate::config::is_sql_identifier;
use crate::constants::{COL_MC_EUR, COL_MC_GBP, COL_MC_INR, COL_MC_USD, COL_NAME, OUTPUT_COLUMNS};
use crate::error::{EtlError, Result};
use crate::logging::ProgressLog;
use crate::types::{BankRecord, BankTable};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Renders a float the way the output file expects: whole numbers keep one decimal.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}

/// Writes the table as CSV with a header row, replacing any existing file.
#[instrument(skip(table, log), fields(rows = table.len()))]
pub fn load_to_csv(table: &BankTable, path: &Path, log: &ProgressLog) -> Result<()> {
    log.record("Initiating CSV loading process.");

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(OUTPUT_COLUMNS)?;
    for record in table {
        writer.write_record([
            record.name.clone(),
            format_number(record.market_cap_usd),
            format_optional(record.market_cap_gbp),
            format_optional(record.market_cap_eur),
            format_optional(record.market_cap_inr),
        ])?;
    }
    writer.flush()?;

    info!("Wrote {} rows to {}", table.len(), path.display());
    log.record(&format!("Data saved to CSV file: {}", path.display()));
    Ok(())
}

/// Reads back a file produced by [`load_to_csv`].
pub fn read_csv(path: &Path) -> Result<BankTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut table = BankTable::new();
    for row in reader.deserialize() {
        let (name, usd, gbp, eur, inr): (String, f64, Option<f64>, Option<f64>, Option<f64>) = row?;
        table.push(BankRecord {
            name,
            market_cap_usd: usd,
            market_cap_gbp: gbp,
            market_cap_eur: eur,
            market_cap_inr: inr,
        });
    }
    Ok(table)
}

/// Replaces `table_name` in the SQLite file at `db_path` with the rows of `table`.
///
/// Drop, create and inserts run in one transaction, so a failed load leaves
/// the previous table untouched. Rows are inserted in table order into a plain
/// rowid table, which keeps a full scan in rank order.
#[instrument(skip(table, log), fields(rows = table.len()))]
pub fn load_to_db(table: &BankTable, db_path: &Path, table_name: &str, log: &ProgressLog) -> Result<()> {
    log.record("Initiating database loading process.");

    if !is_sql_identifier(table_name) {
        return Err(EtlError::Config(format!(
            "table_name '{}' is not a plain SQL identifier",
            table_name
        )));
    }

    let mut conn = Connection::open(db_path)?;
    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        r#"
        DROP TABLE IF EXISTS "{table_name}";
        CREATE TABLE "{table_name}" (
            {COL_NAME}       TEXT,
            {COL_MC_USD}     REAL,
            {COL_MC_GBP}     REAL,
            {COL_MC_EUR}     REAL,
            {COL_MC_INR}     REAL
        );
        "#
    ))?;
    {
        let mut stmt = tx.prepare(&format!(
            r#"INSERT INTO "{table_name}" ({COL_NAME}, {COL_MC_USD}, {COL_MC_GBP}, {COL_MC_EUR}, {COL_MC_INR})
               VALUES (?1, ?2, ?3, ?4, ?5)"#
        ))?;
        for record in table {
            stmt.execute(params![
                record.name,
                record.market_cap_usd,
                record.market_cap_gbp,
                record.market_cap_eur,
                record.market_cap_inr,
            ])?;
        }
    }
    tx.commit()?;
    conn.close().map_err(|(_, e)| EtlError::Storage(e))?;

    debug!("Replaced {} with {} rows", table_name, table.len());
    log.record(&format!(
        "Data loaded to SQLite database. Database file: {}, Table name: {}",
        db_path.display(),
        table_name
    ));
    Ok(())
}
