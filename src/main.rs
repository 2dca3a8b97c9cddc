use anyhow::Context;
use banks_etl::config::Config;
use banks_etl::constants::DEFAULT_CONFIG_PATH;
use banks_etl::infra::http_client::ReqwestHttp;
use banks_etl::logging::{self, ProgressLog};
use banks_etl::pipeline::Pipeline;
use banks_etl::query::run_fixed_queries;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "banks_etl")]
#[command(about = "Extract, convert and load the world's largest banks by market cap")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults are used when it does not exist)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[arg(long)]
    source_url: Option<String>,

    /// Local path or URL of the Currency,Rate file
    #[arg(long)]
    rate_source: Option<String>,

    #[arg(long)]
    csv_output: Option<String>,

    #[arg(long)]
    db: Option<String>,

    #[arg(long)]
    table: Option<String>,

    #[arg(long)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full extract, transform, load and query sequence (default)
    Run,
    /// Run only the fixed queries against an existing database
    Query,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        let overrides = [
            (&self.source_url, &mut config.source_url),
            (&self.rate_source, &mut config.rate_source),
            (&self.csv_output, &mut config.csv_output_path),
            (&self.db, &mut config.db_path),
            (&self.table, &mut config.table_name),
            (&self.log_file, &mut config.log_path),
        ];
        for (flag, field) in overrides {
            if let Some(value) = flag {
                *field = value.clone();
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let http = ReqwestHttp::new(config.fetch_timeout_secs)?;
            let mut pipeline = Pipeline::new(config, Arc::new(http));

            match pipeline.run().await {
                Ok(report) => {
                    println!("\n📊 Run summary:");
                    println!("   Banks extracted: {}", report.rows_extracted);
                    println!("   CSV file: {}", report.csv_path.display());
                    println!(
                        "   Database: {} (table {})",
                        report.db_path.display(),
                        report.table_name
                    );
                    println!("   Queries run: {}", report.queries.len());
                    println!("   Duration: {:.2}s", report.duration_secs);
                }
                Err(e) => {
                    error!("Run failed at {}: {}", pipeline.stage(), e);
                    return Err(anyhow::anyhow!("{}: {}", e.category(), e));
                }
            }
        }
        Commands::Query => {
            let log = ProgressLog::new(&config.log_path);
            let db_path = Path::new(&config.db_path);
            if !db_path.exists() {
                anyhow::bail!("database {} does not exist; run the pipeline first", db_path.display());
            }
            let results = run_fixed_queries(db_path, &config.table_name, &log)
                .map_err(|e| anyhow::anyhow!("{}: {}", e.category(), e))?;
            info!("Ran {} queries against {}", results.len(), db_path.display());
        }
    }
    Ok(())
}
