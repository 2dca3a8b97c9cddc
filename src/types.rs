use crate::constants::{
    COL_MC_USD, COL_NAME, DEFAULT_TABLE_CLASS, DEFAULT_TABLE_TAG, OUTPUT_COLUMNS,
    SOURCE_MARKET_CAP_LABEL, SOURCE_NAME_LABEL,
};
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One ranked bank. The converted columns stay `None` until the transform stage runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankRecord {
    pub name: String,
    pub market_cap_usd: f64,
    pub market_cap_gbp: Option<f64>,
    pub market_cap_eur: Option<f64>,
    pub market_cap_inr: Option<f64>,
}

impl BankRecord {
    pub fn new(name: impl Into<String>, market_cap_usd: f64) -> Self {
        Self {
            name: name.into(),
            market_cap_usd,
            market_cap_gbp: None,
            market_cap_eur: None,
            market_cap_inr: None,
        }
    }

    pub fn is_converted(&self) -> bool {
        self.market_cap_gbp.is_some() && self.market_cap_eur.is_some() && self.market_cap_inr.is_some()
    }
}

/// Banks in source ranking order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BankTable {
    records: Vec<BankRecord>,
}

impl BankTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: BankRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BankRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BankRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, BankRecord> {
        self.records.iter_mut()
    }

    /// Labels of the columns currently populated, in output order.
    pub fn columns(&self) -> &'static [&'static str] {
        const EXTRACTED: &[&str] = &[COL_NAME, COL_MC_USD];
        if !self.records.is_empty() && self.records.iter().all(BankRecord::is_converted) {
            &OUTPUT_COLUMNS
        } else {
            EXTRACTED
        }
    }
}

impl From<Vec<BankRecord>> for BankTable {
    fn from(records: Vec<BankRecord>) -> Self {
        Self { records }
    }
}

impl<'a> IntoIterator for &'a BankTable {
    type Item = &'a BankRecord;
    type IntoIter = std::slice::Iter<'a, BankRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for BankTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self.columns();
        let name_width = self
            .records
            .iter()
            .map(|r| r.name.chars().count())
            .chain(std::iter::once(COL_NAME.len()))
            .max()
            .unwrap_or(COL_NAME.len());

        write!(f, "{:>3}  {:<name_width$}", "", COL_NAME)?;
        for col in &columns[1..] {
            write!(f, "  {:>14}", col)?;
        }
        writeln!(f)?;

        for (i, record) in self.records.iter().enumerate() {
            write!(f, "{:>3}  {:<name_width$}  {:>14.2}", i, record.name, record.market_cap_usd)?;
            if columns.len() > 2 {
                for value in [record.market_cap_gbp, record.market_cap_eur, record.market_cap_inr] {
                    write!(f, "  {:>14.2}", value.unwrap_or(f64::NAN))?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Units of each currency per one USD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRateTable {
    rates: HashMap<String, f64>,
}

impl ExchangeRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, currency: impl Into<String>, rate: f64) {
        self.rates.insert(currency.into(), rate);
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rate(&self, currency: &str) -> Result<f64> {
        self.rates
            .get(currency)
            .copied()
            .ok_or_else(|| EtlError::MissingRate(currency.to_string()))
    }
}

impl FromIterator<(String, f64)> for ExchangeRateTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            rates: iter.into_iter().collect(),
        }
    }
}

/// Structural selector for the source table: a tag plus a required class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSelector {
    pub tag: String,
    pub class: String,
}

impl TableSelector {
    pub fn new(tag: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            class: class.into(),
        }
    }

    pub fn to_css(&self) -> String {
        if self.class.is_empty() {
            self.tag.clone()
        } else {
            format!("{}.{}", self.tag, self.class)
        }
    }
}

impl Default for TableSelector {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_TAG, DEFAULT_TABLE_CLASS)
    }
}

/// Declared source-label to canonical-label pairs for the extracted columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pairs: Vec<(String, String)>,
}

impl ColumnMapping {
    pub fn new<S: Into<String>>(pairs: impl IntoIterator<Item = (S, S)>) -> Self {
        Self {
            pairs: pairs.into_iter().map(|(s, c)| (s.into(), c.into())).collect(),
        }
    }

    /// Bank name and USD market cap, renamed to `Name` and `MC_USD_Billion`.
    pub fn banks() -> Self {
        Self::new([(SOURCE_NAME_LABEL, COL_NAME), (SOURCE_MARKET_CAP_LABEL, COL_MC_USD)])
    }

    pub fn canonical_labels(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, c)| c.as_str())
    }

    /// Position of each mapped column within `headers`, in mapping order.
    pub fn resolve(&self, headers: &[String]) -> Result<Vec<usize>> {
        self.pairs
            .iter()
            .map(|(source, _)| {
                headers.iter().position(|h| h == source).ok_or_else(|| {
                    EtlError::Extraction(format!(
                        "source table has no '{}' column (found: {})",
                        source,
                        headers.join(", ")
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_mapping_resolves_by_label() {
        let headers = vec![
            "Rank".to_string(),
            "Bank name".to_string(),
            "Market cap(US$ billion)".to_string(),
        ];
        let positions = ColumnMapping::banks().resolve(&headers).unwrap();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_column_mapping_fails_on_missing_label() {
        let headers = vec!["Rank".to_string(), "Bank name".to_string()];
        let err = ColumnMapping::banks().resolve(&headers).unwrap_err();
        assert_eq!(err.category(), "ExtractionError");
        assert!(err.to_string().contains("Market cap(US$ billion)"));
    }

    #[test]
    fn test_missing_rate() {
        let rates: ExchangeRateTable = vec![("GBP".to_string(), 0.8)].into_iter().collect();
        assert_eq!(rates.rate("GBP").unwrap(), 0.8);
        assert!(matches!(rates.rate("INR"), Err(EtlError::MissingRate(c)) if c == "INR"));
    }

    #[test]
    fn test_table_columns_follow_conversion_state() {
        let mut table = BankTable::from(vec![BankRecord::new("JPMorgan Chase", 432.92)]);
        assert_eq!(table.columns(), &["Name", "MC_USD_Billion"]);

        for record in table.iter_mut() {
            record.market_cap_gbp = Some(346.34);
            record.market_cap_eur = Some(402.62);
            record.market_cap_inr = Some(35910.71);
        }
        assert_eq!(table.columns().len(), 5);
        let rendered = table.to_string();
        assert!(rendered.contains("MC_INR_Billion"));
        assert!(rendered.contains("35910.71"));
    }

    #[test]
    fn test_selector_css() {
        assert_eq!(TableSelector::default().to_css(), "table.wikitable");
        assert_eq!(TableSelector::new("table", "").to_css(), "table");
    }
}
