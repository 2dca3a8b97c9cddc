use crate::app::ports::HttpClientPort;
use crate::config::Config;
use crate::error::{EtlError, Result};
use crate::extract::BankTableExtractor;
use crate::load::{load_to_csv, load_to_db};
use crate::logging::ProgressLog;
use crate::query::{run_fixed_queries, QueryResult};
use crate::transform::transform;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Position of a run in the linear extract, transform, load, query sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Extracting,
    Transforming,
    LoadingCsv,
    LoadingDb,
    Querying,
    Done,
    Failed,
}

impl PipelineStage {
    /// The only stage reachable from `self` on success.
    pub fn next(self) -> Option<PipelineStage> {
        use PipelineStage::*;
        match self {
            Idle => Some(Extracting),
            Extracting => Some(Transforming),
            Transforming => Some(LoadingCsv),
            LoadingCsv => Some(LoadingDb),
            LoadingDb => Some(Querying),
            Querying => Some(Done),
            Done | Failed => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "Setup",
            PipelineStage::Extracting => "Extraction",
            PipelineStage::Transforming => "Transformation",
            PipelineStage::LoadingCsv => "CSV loading",
            PipelineStage::LoadingDb => "Database loading",
            PipelineStage::Querying => "Query",
            PipelineStage::Done => "Done",
            PipelineStage::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Summary of a completed run
#[derive(Debug)]
pub struct PipelineReport {
    pub rows_extracted: usize,
    pub csv_path: PathBuf,
    pub db_path: PathBuf,
    pub table_name: String,
    pub queries: Vec<QueryResult>,
    pub duration_secs: f64,
}

pub struct Pipeline {
    config: Config,
    http: Arc<dyn HttpClientPort>,
    log: ProgressLog,
    stage: PipelineStage,
}

impl Pipeline {
    pub fn new(config: Config, http: Arc<dyn HttpClientPort>) -> Self {
        let log = ProgressLog::new(&config.log_path);
        Self {
            config,
            http,
            log,
            stage: PipelineStage::Idle,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            self.stage = next;
        }
    }

    /// Runs every stage in order. The first failure is recorded in the progress
    /// log and aborts the run.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<PipelineReport> {
        if self.stage != PipelineStage::Idle {
            return Err(EtlError::Config(format!(
                "pipeline already ran (stage: {})",
                self.stage
            )));
        }
        info!("🚀 Starting banks ETL run");
        self.log.record("Preliminaries complete. Initiating ETL process");
        let started = Instant::now();

        match self.run_stages().await {
            Ok(mut report) => {
                self.advance();
                report.duration_secs = started.elapsed().as_secs_f64();
                info!(
                    "✅ Run finished: {} banks in {:.2}s",
                    report.rows_extracted, report.duration_secs
                );
                Ok(report)
            }
            Err(e) => {
                error!("{} failed ({}): {}", self.stage, e.category(), e);
                self.log.record(&format!("{} failed: {}", self.stage, e));
                self.stage = PipelineStage::Failed;
                Err(e)
            }
        }
    }

    async fn run_stages(&mut self) -> Result<PipelineReport> {
        self.config.validate()?;
        let http = Arc::clone(&self.http);

        self.advance();
        let extractor = BankTableExtractor::new(self.config.table_selector.clone())
            .with_row_limit(self.config.row_limit);
        let table = extractor
            .extract(http.as_ref(), &self.log, &self.config.source_url)
            .await?;
        println!("{table}");
        let rows_extracted = table.len();

        self.advance();
        let table = transform(table, http.as_ref(), &self.log, &self.config.rate_source).await?;
        println!("{table}");
        if let Some(fifth) = table.get(4) {
            println!(
                "MC_EUR_Billion of row 4 ({}): {}",
                fifth.name,
                fifth.market_cap_eur.unwrap_or(f64::NAN)
            );
        }

        self.advance();
        let csv_path = PathBuf::from(&self.config.csv_output_path);
        load_to_csv(&table, &csv_path, &self.log)?;

        self.advance();
        let db_path = PathBuf::from(&self.config.db_path);
        load_to_db(&table, &db_path, &self.config.table_name, &self.log)?;

        self.advance();
        let queries = run_fixed_queries(&db_path, &self.config.table_name, &self.log)?;

        Ok(PipelineReport {
            rows_extracted,
            csv_path,
            db_path,
            table_name: self.config.table_name.clone(),
            queries,
            duration_secs: 0.0,
        })
    }
}
