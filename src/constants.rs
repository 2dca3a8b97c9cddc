/// Defaults and fixed labels shared across the pipeline stages

// Sources
pub const DEFAULT_SOURCE_URL: &str =
    "https://web.archive.org/web/20230908091635/https://en.wikipedia.org/wiki/List_of_largest_banks";
pub const DEFAULT_RATE_SOURCE: &str = "https://cf-courses-data.s3.us.cloud-object-storage.appdomain.cloud/IBMSkillsNetwork-PY0221EN-Coursera/labs/v2/exchange_rate.csv";

// Outputs
pub const DEFAULT_CSV_OUTPUT_PATH: &str = "./Largest_banks_data.csv";
pub const DEFAULT_DB_PATH: &str = "Banks.db";
pub const DEFAULT_TABLE_NAME: &str = "Largest_banks";
pub const DEFAULT_LOG_PATH: &str = "code_log.txt";
pub const DEFAULT_CONFIG_PATH: &str = "banks_etl.toml";

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ROW_LIMIT: usize = 10;

// Source table selector
pub const DEFAULT_TABLE_TAG: &str = "table";
pub const DEFAULT_TABLE_CLASS: &str = "wikitable";

// Source header labels
pub const SOURCE_NAME_LABEL: &str = "Bank name";
pub const SOURCE_MARKET_CAP_LABEL: &str = "Market cap(US$ billion)";

// Canonical column labels, in output order
pub const COL_NAME: &str = "Name";
pub const COL_MC_USD: &str = "MC_USD_Billion";
pub const COL_MC_GBP: &str = "MC_GBP_Billion";
pub const COL_MC_EUR: &str = "MC_EUR_Billion";
pub const COL_MC_INR: &str = "MC_INR_Billion";

pub const OUTPUT_COLUMNS: [&str; 5] = [COL_NAME, COL_MC_USD, COL_MC_GBP, COL_MC_EUR, COL_MC_INR];

// Exchange rate file
pub const RATE_CURRENCY_COLUMN: &str = "Currency";
pub const RATE_VALUE_COLUMN: &str = "Rate";
pub const CURRENCY_GBP: &str = "GBP";
pub const CURRENCY_EUR: &str = "EUR";
pub const CURRENCY_INR: &str = "INR";

/// The analytical queries run against the loaded table, in order.
pub fn fixed_queries(table_name: &str) -> [String; 3] {
    [
        format!("SELECT * FROM {table_name}"),
        format!("SELECT AVG({COL_MC_GBP}) FROM {table_name}"),
        format!("SELECT {COL_NAME} FROM {table_name} LIMIT 5"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_queries_for_default_table() {
        let queries = fixed_queries(DEFAULT_TABLE_NAME);
        assert_eq!(queries[0], "SELECT * FROM Largest_banks");
        assert_eq!(queries[1], "SELECT AVG(MC_GBP_Billion) FROM Largest_banks");
        assert_eq!(queries[2], "SELECT Name FROM Largest_banks LIMIT 5");
    }
}
