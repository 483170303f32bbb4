use crate::{
    DEFAULT_BULK_INSERTS, DEFAULT_DATABASE_NAME, DEFAULT_DATABASE_URL,
    DEFAULT_DOCS_PER_BULK_INSERT, DEFAULT_NUM_CONNECTIONS,
};
#[cfg(feature = "rt")]
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
#[cfg(feature = "rt")]
use serde_with::{serde_as, DurationSeconds};
use std::num::NonZeroUsize;
use std::time::Duration;

/// Configuration of a single bulk-insert benchmark run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "rt", cfg_eval::cfg_eval, serde_as)]
#[cfg_attr(feature = "rt", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "rt", serde(default))]
pub struct BenchmarkConfig {
    pub database_url: String,
    pub database_name: String,
    pub num_connections: NonZeroUsize,
    pub bulk_inserts_per_connection: usize,
    pub docs_per_bulk_insert: NonZeroUsize,
    pub seed: Option<u64>,
    #[cfg_attr(feature = "rt", serde_as(as = "Option<DurationSeconds>"))]
    pub duration: Option<Duration>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            num_connections: DEFAULT_NUM_CONNECTIONS,
            bulk_inserts_per_connection: DEFAULT_BULK_INSERTS,
            docs_per_bulk_insert: DEFAULT_DOCS_PER_BULK_INSERT,
            seed: None,
            duration: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn new(database_url: &str, database_name: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            database_name: database_name.to_string(),
            ..Self::default()
        }
    }

    /// Total number of documents the run writes when every connection completes naturally.
    pub fn total_documents(&self) -> usize {
        self.num_connections.get() * self.bulk_inserts_per_connection * self.docs_per_bulk_insert.get()
    }
}
