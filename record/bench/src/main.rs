//! Workload driver for the record adapter.

mod workload;

use std::path::PathBuf;

use clap::Parser;
use record::{Config, Endpoints};
use tracing_subscriber::EnvFilter;

use crate::workload::Params;

/// CLI arguments for the workload driver.
#[derive(Parser, Debug)]
#[command(about = "Record adapter workload driver")]
struct Args {
    /// Path to config file (TOML). Defaults to an in-memory store.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated endpoints, overriding `hosts` from the config file.
    #[arg(long)]
    hosts: Option<String>,

    /// Number of concurrent worker clients.
    #[arg(short, long, default_value_t = 8)]
    workers: usize,

    /// Number of records inserted during the load phase.
    #[arg(short, long, default_value_t = 10_000)]
    records: usize,

    /// Number of operations in the run phase, split across workers.
    #[arg(short, long, default_value_t = 100_000)]
    operations: usize,

    /// Fraction of run-phase operations that are reads; the rest are updates.
    #[arg(long, default_value_t = 0.95)]
    read_proportion: f64,

    /// Number of fields per record.
    #[arg(long, default_value_t = 10)]
    field_count: usize,

    /// Size of each field value in bytes.
    #[arg(long, default_value_t = 100)]
    field_length: usize,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config {
                hosts: Endpoints::parse("127.0.0.1:2379"),
                ..Default::default()
            },
        };
        if let Some(hosts) = &self.hosts {
            config.hosts = Endpoints::parse(hosts);
        }
        Ok(config)
    }

    fn params(&self) -> anyhow::Result<Params> {
        if self.workers == 0 {
            anyhow::bail!("--workers must be at least 1");
        }
        if self.records == 0 {
            anyhow::bail!("--records must be at least 1");
        }
        if self.field_count == 0 {
            anyhow::bail!("--field-count must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.read_proportion) {
            anyhow::bail!("--read-proportion must be between 0 and 1");
        }
        Ok(Params {
            workers: self.workers,
            records: self.records,
            operations: self.operations,
            read_proportion: self.read_proportion,
            field_count: self.field_count,
            field_length: self.field_length,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.load_config()?;
    let params = args.params()?;
    tracing::info!(?params, encoding = ?config.encoding, "Starting workload");

    let summary = workload::run(config, &params).await?;
    println!("{}", summary);
    Ok(())
}
