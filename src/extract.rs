use crate::app::ports::HttpClientPort;
use crate::constants::DEFAULT_ROW_LIMIT;
use crate::error::{EtlError, Result};
use crate::logging::ProgressLog;
use crate::types::{BankRecord, BankTable, ColumnMapping, TableSelector};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

/// Pulls the ranked bank table out of the source page.
#[derive(Debug, Clone)]
pub struct BankTableExtractor {
    selector: TableSelector,
    mapping: ColumnMapping,
    row_limit: usize,
}

impl BankTableExtractor {
    pub fn new(selector: TableSelector) -> Self {
        Self {
            selector,
            mapping: ColumnMapping::banks(),
            row_limit: DEFAULT_ROW_LIMIT,
        }
    }

    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        self.row_limit = row_limit;
        self
    }

    /// Fetches `url` and parses the first table matching the selector.
    #[instrument(skip(self, http, log))]
    pub async fn extract(
        &self,
        http: &dyn HttpClientPort,
        log: &ProgressLog,
        url: &str,
    ) -> Result<BankTable> {
        log.record("Initiating data extraction process.");

        let response = http.get(url).await?;
        if !response.is_success() {
            return Err(EtlError::Extraction(format!(
                "GET {} returned HTTP {}",
                url, response.status
            )));
        }
        let table = self.parse(&response.text())?;

        info!("Extracted {} banks from {}", table.len(), url);
        log.record("Data extraction complete. Initiating Transformation process.");
        Ok(table)
    }

    /// Parses an HTML document into a `BankTable` of at most `row_limit` rows.
    pub fn parse(&self, html: &str) -> Result<BankTable> {
        let document = Html::parse_document(html);
        let css = self.selector.to_css();
        let table_selector = Selector::parse(&css)
            .map_err(|e| EtlError::Extraction(format!("invalid table selector '{}': {:?}", css, e)))?;
        let row_selector = selector("tr")?;
        let header_selector = selector("th")?;
        let cell_selector = selector("td")?;

        let table = document
            .select(&table_selector)
            .next()
            .ok_or_else(|| EtlError::Extraction(format!("no table matching '{}' found", css)))?;

        let headers: Vec<String> = table
            .select(&row_selector)
            .map(|row| row.select(&header_selector).map(cell_text).collect::<Vec<_>>())
            .find(|cells| !cells.is_empty())
            .unwrap_or_default();
        debug!("Source table headers: {:?}", headers);

        let positions = self.mapping.resolve(&headers)?;
        let (name_pos, cap_pos) = (positions[0], positions[1]);
        let cap_label = self
            .mapping
            .canonical_labels()
            .nth(1)
            .unwrap_or_default()
            .to_string();

        let mut banks = BankTable::new();
        let data_rows = table
            .select(&row_selector)
            .skip(1)
            .map(|row| row.select(&cell_selector).map(cell_text).collect::<Vec<_>>())
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .take(self.row_limit);

        for (i, cells) in data_rows.enumerate() {
            let row = i + 1;
            let cell = |pos: usize| {
                cells.get(pos).ok_or_else(|| {
                    EtlError::Extraction(format!(
                        "row {} has {} cells, expected at least {}",
                        row,
                        cells.len(),
                        pos + 1
                    ))
                })
            };
            let name = cell(name_pos)?;
            let raw_cap = cell(cap_pos)?;
            if name.is_empty() {
                warn!("Row {} has an empty bank name", row);
            }
            banks.push(BankRecord::new(name.clone(), parse_market_cap(raw_cap, row, &cap_label)?));
        }

        if banks.is_empty() {
            warn!("No data rows found - the page structure may have changed");
        }
        Ok(banks)
    }
}

impl Default for BankTableExtractor {
    fn default() -> Self {
        Self::new(TableSelector::default())
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| EtlError::Extraction(format!("invalid selector '{}': {:?}", css, e)))
}

fn cell_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Strips embedded newlines and surrounding whitespace, then parses as a
/// non-negative decimal.
pub fn parse_market_cap(raw: &str, row: usize, column: &str) -> Result<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| EtlError::Parse {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        })
}
