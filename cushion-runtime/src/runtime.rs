//! Command-line benchmark runner
//!
//! Loads a [`BenchmarkConfig`] from a JSON file and/or flags, prepares the target database,
//! drives an HTTP bulk-insert benchmark and reports the [`RunStatistics`].
use crate::error::RuntimeError;
use clap::Parser;
use cushion::http::{create_database, BulkInsertWorkload};
use cushion::{Benchmark, ValueGenerator};
use cushion_core::{BenchmarkConfig, RunStatistics};
use serde_json::{json, Value};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};
use url::Url;

#[derive(Parser, Debug)]
#[command(version, about = "Benchmark the write path of a CouchDB-compatible database")]
struct CushionCli {
    /// JSON file holding a benchmark configuration; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    url: Option<String>,

    #[arg(short, long)]
    database: Option<String>,

    #[arg(short('c'), long)]
    connections: Option<usize>,

    #[arg(long)]
    bulk_inserts: Option<usize>,

    #[arg(long)]
    bulk_size: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Stop the run after this long, e.g. `30s` or `2m`.
    #[arg(long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Print the run statistics as JSON.
    #[arg(long)]
    json: bool,
}

impl CushionCli {
    fn into_config(self) -> Result<(BenchmarkConfig, bool), RuntimeError> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => BenchmarkConfig::default(),
        };

        if let Some(url) = self.url {
            config.database_url = url;
        }
        if let Some(database) = self.database {
            config.database_name = database;
        }
        if let Some(connections) = self.connections {
            config.num_connections =
                NonZeroUsize::new(connections).ok_or(RuntimeError::NoConnections)?;
        }
        if let Some(bulk_inserts) = self.bulk_inserts {
            config.bulk_inserts_per_connection = bulk_inserts;
        }
        if let Some(bulk_size) = self.bulk_size {
            config.docs_per_bulk_insert =
                NonZeroUsize::new(bulk_size).ok_or(RuntimeError::EmptyBulkInsert)?;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.duration.is_some() {
            config.duration = self.duration;
        }

        Ok((config, self.json))
    }
}

/// Document shape written by the runner.
pub fn default_document(values: &mut ValueGenerator) -> Value {
    json!({
        "title": values.next_string(),
        "body": values.next_string(),
        "views": values.next_i32_below(1_000_000),
        "score": values.next_f32(),
        "published": values.next_bool(),
        "tags": [values.next_string(), values.next_string()],
        "author": {
            "name": values.next_string(),
            "karma": values.next_i32(),
        },
    })
}

/// # Example
///
/// ```ignore
/// #[tokio::main]
/// async fn main() {
///     CushionRuntime::new().with_args().run().await.unwrap();
/// }
/// ```
#[derive(Debug, Default)]
pub struct CushionRuntime {
    config: BenchmarkConfig,
    json: bool,
}

impl CushionRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: BenchmarkConfig) -> Self {
        self.config = config;
        self
    }

    /// Use the command-line arguments, exiting with usage on invalid flags.
    pub fn with_args(self) -> Result<Self, RuntimeError> {
        let (config, json) = CushionCli::parse().into_config()?;
        Ok(Self { config, json })
    }

    #[instrument(name = "cushion", skip_all, fields(database = %self.config.database_name))]
    pub async fn run(self) -> Result<RunStatistics, RuntimeError> {
        info!("Running with config {:?}", &self.config);

        let base = Url::parse(&self.config.database_url)?;
        create_database(&base, &self.config.database_name).await?;

        let mut benchmark = Benchmark::new(
            BulkInsertWorkload::new(self.config.clone(), default_document)?,
            self.config.num_connections,
        );
        if let Some(duration) = self.config.duration {
            benchmark = benchmark.duration(duration);
        }

        let trigger = benchmark.shutdown_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; closing all connections.");
                trigger.shutdown();
            }
        });

        let stats = benchmark.run().await;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).map_err(RuntimeError::Output)?
            );
        } else {
            println!("{stats}");
        }
        Ok(stats)
    }
}
