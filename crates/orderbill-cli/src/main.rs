//! OrderBill CLI
//!
//! Generates billing reports from a JSON document holding the customer
//! services and the orders to bill.
//!
//! # Usage
//!
//! ```bash
//! orderbill report --input month.json --customer acme --from 2024-01-01 --to 2024-01-31
//! orderbill report --input month.json --customer acme --from 2024-01-01 --to 2024-01-31 \
//!     --services cs-pick,cs-store --format csv --output acme.csv
//! orderbill validate --input month.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orderbill_common::{Order, VERSION};
use orderbill_engine::{export, EngineConfig, EngineMetrics, OrderBill, ReportRequest, ServiceCatalog};

#[derive(Parser)]
#[command(name = "orderbill")]
#[command(version)]
#[command(about = "Rule-driven billing reports for order history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a billing report
    Report {
        /// JSON document with `services` and `orders`
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Customer to bill
        #[arg(long, short = 'c')]
        customer: String,

        /// First order date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last order date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Only bill these customer-service IDs
        #[arg(long, value_delimiter = ',')]
        services: Option<Vec<String>>,

        /// Output format
        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Write the report here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Worker threads (defaults to ORDERBILL_MAX_WORKERS or the CPU count)
        #[arg(long, env = "ORDERBILL_MAX_WORKERS")]
        workers: Option<usize>,

        /// Print engine metrics to stderr when done
        #[arg(long)]
        metrics: bool,
    },
    /// Validate the services of an input document
    Validate {
        #[arg(long, short = 'i')]
        input: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Deserialize)]
struct InputDocument {
    #[serde(default)]
    services: Vec<Value>,
    #[serde(default)]
    orders: Vec<Order>,
}

fn read_input(path: &Path) -> Result<InputDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Report {
            input,
            customer,
            from,
            to,
            services,
            format,
            output,
            workers,
            metrics,
        } => {
            let mut config = EngineConfig::load();
            if let Some(workers) = workers {
                config.max_workers = workers;
            }
            let request = ReportRequest {
                customer_id: customer,
                start_date: from,
                end_date: to,
                included_customer_service_ids: services.map(|ids| ids.into_iter().collect()),
            };
            run_report(&input, request, config, format, output.as_deref(), metrics).await
        }
        Commands::Validate { input } => {
            let document = read_input(&input)?;
            let catalog = ServiceCatalog::from_values(document.services)?;
            println!(
                "{}: {} services valid, {} orders",
                input.display(),
                catalog.len(),
                document.orders.len()
            );
            Ok(())
        }
    }
}

async fn run_report(
    input: &Path,
    request: ReportRequest,
    config: EngineConfig,
    format: OutputFormat,
    output: Option<&Path>,
    print_metrics: bool,
) -> Result<()> {
    info!("OrderBill v{}", VERSION);
    if request.start_date > request.end_date {
        bail!("--from {} is after --to {}", request.start_date, request.end_date);
    }

    let document = read_input(input)?;
    let catalog = ServiceCatalog::from_values(document.services)?;
    let registry = prometheus::Registry::new();
    let engine_metrics = Arc::new(EngineMetrics::new()?);
    engine_metrics.register(&registry)?;
    let engine = OrderBill::new(catalog, config).with_metrics(engine_metrics);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with a partial report");
            on_interrupt.cancel();
        }
    });

    let run = engine
        .generate_report(request, Arc::new(document.orders), Some(cancel))
        .await?;
    for skipped in &run.skipped {
        warn!(
            order_id = %skipped.order_id,
            service_id = skipped.service_id.as_deref().unwrap_or("-"),
            reason = %skipped.reason,
            "Charge skipped"
        );
    }

    let rendered = match format {
        OutputFormat::Json => export::to_json(&run.report)?,
        OutputFormat::Csv => export::to_csv(&run.report)?,
    };
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote report");
        }
        None => print!("{}", rendered),
    }

    if print_metrics {
        let encoder = prometheus::TextEncoder::new();
        eprint!("{}", encoder.encode_to_string(&registry.gather())?);
    }
    if run.cancelled {
        bail!("report generation was interrupted; output is partial");
    }
    Ok(())
}
