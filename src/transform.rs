use crate::app::ports::HttpClientPort;
use crate::constants::{
    CURRENCY_EUR, CURRENCY_GBP, CURRENCY_INR, RATE_CURRENCY_COLUMN, RATE_VALUE_COLUMN,
};
use crate::error::{EtlError, Result};
use crate::logging::ProgressLog;
use crate::types::{BankTable, ExchangeRateTable};
use std::io::Read;
use tracing::{debug, info, instrument, warn};

/// Rounds half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parses a delimited `Currency,Rate` table. Extra columns (e.g. an index) are ignored.
pub fn parse_rates<R: Read>(reader: R) -> Result<ExchangeRateTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| EtlError::RateParse(format!("unreadable header row: {}", e)))?
        .clone();
    debug!("Exchange rate columns: {:?}", headers);

    let position = |label: &str| {
        headers
            .iter()
            .position(|h| h == label)
            .ok_or_else(|| EtlError::RateParse(format!("missing '{}' column", label)))
    };
    let currency_col = position(RATE_CURRENCY_COLUMN)?;
    let rate_col = position(RATE_VALUE_COLUMN)?;

    let mut rates = ExchangeRateTable::new();
    for (i, result) in csv_reader.records().enumerate() {
        let line = i + 2;
        let record =
            result.map_err(|e| EtlError::RateParse(format!("line {}: {}", line, e)))?;
        let currency = record
            .get(currency_col)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| EtlError::RateParse(format!("line {}: empty currency code", line)))?;
        let raw_rate = record.get(rate_col).unwrap_or_default();
        let rate = raw_rate
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite() && *r > 0.0)
            .ok_or_else(|| {
                EtlError::RateParse(format!(
                    "line {}: rate {:?} for {} is not a positive number",
                    line, raw_rate, currency
                ))
            })?;
        rates.insert(currency, rate);
    }
    Ok(rates)
}

/// Reads the rate table from a local path or an http(s) URL. Never cached.
pub async fn load_rates(http: &dyn HttpClientPort, source: &str) -> Result<ExchangeRateTable> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = http.get(source).await?;
        if !response.is_success() {
            return Err(EtlError::Extraction(format!(
                "GET {} returned HTTP {}",
                source, response.status
            )));
        }
        parse_rates(response.bytes.as_slice())
    } else {
        let file = std::fs::File::open(source).map_err(|e| {
            EtlError::RateParse(format!("could not open rate source {}: {}", source, e))
        })?;
        parse_rates(file)
    }
}

/// Adds the GBP, EUR and INR columns. Fails before touching any row if a rate is missing.
pub fn apply_rates(mut table: BankTable, rates: &ExchangeRateTable) -> Result<BankTable> {
    let gbp = rates.rate(CURRENCY_GBP)?;
    let eur = rates.rate(CURRENCY_EUR)?;
    let inr = rates.rate(CURRENCY_INR)?;

    for record in table.iter_mut() {
        record.market_cap_gbp = Some(round2(record.market_cap_usd * gbp));
        record.market_cap_eur = Some(round2(record.market_cap_usd * eur));
        record.market_cap_inr = Some(round2(record.market_cap_usd * inr));
    }
    Ok(table)
}

/// Transform stage: load the rates, then convert every row.
#[instrument(skip(table, http, log), fields(rows = table.len()))]
pub async fn transform(
    table: BankTable,
    http: &dyn HttpClientPort,
    log: &ProgressLog,
    rate_source: &str,
) -> Result<BankTable> {
    log.record("Initiating data transformation process.");

    let rates = load_rates(http, rate_source).await?;
    if rates.is_empty() {
        warn!("Rate source {} has no rows", rate_source);
    } else {
        info!("Loaded {} exchange rates from {}", rates.len(), rate_source);
    }
    let table = apply_rates(table, &rates)?;

    log.record("Data transformation complete. Initiating Loading process.");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use crate::types::BankRecord;
    use async_trait::async_trait;
    use tempfile::tempdir;

    const RATES_CSV: &str = ",Currency,Rate\n0,EUR,0.93\n1,GBP,0.8\n2,INR,82.95\n";

    struct NoNetwork;

    #[async_trait]
    impl HttpClientPort for NoNetwork {
        async fn get(&self, url: &str) -> Result<HttpGetResult> {
            Err(EtlError::Extraction(format!("unexpected fetch of {}", url)))
        }
    }

    enum RemoteRates {
        TimesOut,
        Status(u16),
    }

    #[async_trait]
    impl HttpClientPort for RemoteRates {
        async fn get(&self, url: &str) -> Result<HttpGetResult> {
            match self {
                RemoteRates::TimesOut => Err(EtlError::Timeout {
                    url: url.to_string(),
                    secs: 1,
                }),
                RemoteRates::Status(status) => Ok(HttpGetResult {
                    status: *status,
                    bytes: RATES_CSV.as_bytes().to_vec(),
                    content_type: "text/csv".to_string(),
                }),
            }
        }
    }

    fn rates(pairs: &[(&str, f64)]) -> ExchangeRateTable {
        pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect()
    }

    #[test]
    fn test_conversion_scenario() {
        let table = BankTable::from(vec![BankRecord::new("A", 100.0)]);
        let out = apply_rates(table, &rates(&[("GBP", 0.8), ("EUR", 0.93), ("INR", 82.5)])).unwrap();
        let record = out.get(0).unwrap();
        assert_eq!(record.market_cap_usd, 100.0);
        assert_eq!(record.market_cap_gbp, Some(80.0));
        assert_eq!(record.market_cap_eur, Some(93.0));
        assert_eq!(record.market_cap_inr, Some(8250.0));
    }

    #[test]
    fn test_rounding_to_two_decimals() {
        assert_eq!(round2(432.92 * 0.8), 346.34);
        assert_eq!(round2(0.125), 0.13);
    }

    #[test]
    fn test_transform_preserves_order_and_count() {
        let table = BankTable::from(vec![
            BankRecord::new("First", 3.0),
            BankRecord::new("Second", 2.0),
            BankRecord::new("Third", 1.0),
        ]);
        let out = apply_rates(table, &rates(&[("GBP", 1.0), ("EUR", 1.0), ("INR", 1.0)])).unwrap();
        let names: Vec<&str> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
        assert_eq!(out.columns().len(), 5);
    }

    #[test]
    fn test_each_missing_currency_fails() {
        for missing in ["GBP", "EUR", "INR"] {
            let pairs: Vec<(&str, f64)> = [("GBP", 0.8), ("EUR", 0.93), ("INR", 82.5)]
                .into_iter()
                .filter(|(c, _)| *c != missing)
                .collect();
            let table = BankTable::from(vec![BankRecord::new("A", 1.0)]);
            let err = apply_rates(table, &rates(&pairs)).unwrap_err();
            assert!(matches!(err, EtlError::MissingRate(ref c) if c == missing));
            assert_eq!(err.category(), "MissingRateError");
        }
    }

    #[test]
    fn test_parse_rates_ignores_index_column() {
        let table = parse_rates(RATES_CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rate("INR").unwrap(), 82.95);
    }

    #[test]
    fn test_parse_rates_requires_columns() {
        let err = parse_rates("Code,Value\nGBP,0.8\n".as_bytes()).unwrap_err();
        assert_eq!(err.category(), "RateParseError");
        assert!(err.to_string().contains("Currency"));
    }

    #[test]
    fn test_parse_rates_rejects_bad_rate() {
        let err = parse_rates("Currency,Rate\nGBP,abc\n".as_bytes()).unwrap_err();
        assert!(matches!(err, EtlError::RateParse(_)));
        let err = parse_rates("Currency,Rate\nGBP,-1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, EtlError::RateParse(_)));
    }

    #[tokio::test]
    async fn test_transform_from_local_file() {
        let dir = tempdir().unwrap();
        let rate_path = dir.path().join("exchange_rate.csv");
        std::fs::write(&rate_path, RATES_CSV).unwrap();
        let log = ProgressLog::new(dir.path().join("code_log.txt"));

        let table = BankTable::from(vec![BankRecord::new("A", 10.0)]);
        let out = transform(table, &NoNetwork, &log, rate_path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(out.get(0).unwrap().market_cap_inr, Some(829.5));

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("Initiating data transformation process."));
        assert!(content.contains("Data transformation complete. Initiating Loading process."));
    }

    #[tokio::test]
    async fn test_missing_local_rate_file() {
        let dir = tempdir().unwrap();
        let log = ProgressLog::new(dir.path().join("code_log.txt"));
        let missing = dir.path().join("nope.csv");

        let err = transform(BankTable::new(), &NoNetwork, &log, missing.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.category(), "RateParseError");
    }

    #[tokio::test]
    async fn test_remote_rate_timeout_stays_a_timeout() {
        let err = load_rates(&RemoteRates::TimesOut, "https://example.com/exchange_rate.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::Timeout { secs: 1, .. }));
        assert_eq!(err.category(), "ExtractionError");
    }

    #[tokio::test]
    async fn test_remote_rate_error_status_is_an_extraction_error() {
        let err = load_rates(&RemoteRates::Status(404), "https://example.com/exchange_rate.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::Extraction(_)));
        assert!(err.to_string().contains("HTTP 404"));

        let table = load_rates(&RemoteRates::Status(200), "https://example.com/exchange_rate.csv")
            .await
            .unwrap();
        assert_eq!(table.rate("GBP").unwrap(), 0.8);
    }
}
