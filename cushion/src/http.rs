//! Bulk document inserts over HTTP against a CouchDB-compatible server.
use crate::benchmark::Workload;
use crate::connection::{CloseFuture, Connection, ResponseHandler};
use crate::error::{ConnectionError, GeneratorError};
use crate::generator::ValueGenerator;
use crate::words::WordPool;
use cushion_core::BenchmarkConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Builds one document from a connection's value generator.
///
/// Implemented for any `Fn(&mut ValueGenerator) -> Value`.
pub trait DocumentFactory: Send + Sync + 'static {
    fn document(&self, values: &mut ValueGenerator) -> Value;
}

impl<F> DocumentFactory for F
where
    F: Fn(&mut ValueGenerator) -> Value + Send + Sync + 'static,
{
    fn document(&self, values: &mut ValueGenerator) -> Value {
        self(values)
    }
}

#[derive(Debug, Clone)]
pub struct BulkInsertResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// `{base}/{database}/{segment}`, independent of trailing slashes on `base`.
fn database_url(base: &Url, database: &str, segment: Option<&str>) -> Result<Url, ConnectionError> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| ConnectionError::Connect(format!("{base} cannot be a base URL")))?;
        segments.pop_if_empty().push(database);
        if let Some(segment) = segment {
            segments.push(segment);
        }
    }
    Ok(url)
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One benchmark connection: a client with a single pooled socket to the server.
pub struct HttpConnection {
    client: Option<Client>,
    bulk_docs: Url,
}

impl HttpConnection {
    /// Opens the connection and checks that the target database answers.
    pub async fn open(base: &Url, database: &str) -> Result<Self, ConnectionError> {
        let client = Client::builder()
            .pool_max_idle_per_host(1)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        let db = database_url(base, database, None)?;

        let res = client
            .get(db)
            .send()
            .await
            .map_err(|err| ConnectionError::Connect(err.to_string()))?;
        if !res.status().is_success() {
            return Err(ConnectionError::Connect(format!(
                "database {database} answered {}",
                res.status()
            )));
        }

        Ok(Self {
            client: Some(client),
            bulk_docs: database_url(base, database, Some("_bulk_docs"))?,
        })
    }
}

impl Connection for HttpConnection {
    type Request = Vec<Value>;
    type Response = BulkInsertResponse;

    async fn send(&mut self, docs: Vec<Value>) -> Result<BulkInsertResponse, ConnectionError> {
        let client = self.client.as_ref().ok_or(ConnectionError::Closed)?;
        let res = client
            .post(self.bulk_docs.clone())
            .json(&json!({ "docs": docs }))
            .send()
            .await?;

        let status = res.status();
        let body = res.json().await?;
        Ok(BulkInsertResponse { status, body })
    }

    fn close(&mut self) -> CloseFuture {
        // Dropping the client releases its pooled socket.
        self.client.take();
        CloseFuture::ready(Ok(()))
    }
}

/// Issues a fixed number of bulk inserts of generated documents.
pub struct BulkInsertHandler<D> {
    values: ValueGenerator,
    documents: Arc<D>,
    remaining: usize,
    docs_per_insert: usize,
}

impl<D: DocumentFactory> BulkInsertHandler<D> {
    pub fn new(
        values: ValueGenerator,
        documents: Arc<D>,
        bulk_inserts: usize,
        docs_per_insert: usize,
    ) -> Self {
        Self {
            values,
            documents,
            remaining: bulk_inserts,
            docs_per_insert,
        }
    }

    fn next_batch(&mut self) -> Option<Vec<Value>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(
            (0..self.docs_per_insert)
                .map(|_| self.documents.document(&mut self.values))
                .collect(),
        )
    }
}

impl<D: DocumentFactory> ResponseHandler for BulkInsertHandler<D> {
    type Request = Vec<Value>;
    type Response = BulkInsertResponse;

    fn on_open(&mut self) -> Option<Vec<Value>> {
        self.next_batch()
    }

    fn on_response(
        &mut self,
        response: BulkInsertResponse,
    ) -> Result<Option<Vec<Value>>, ConnectionError> {
        if !matches!(response.status, StatusCode::CREATED | StatusCode::ACCEPTED) {
            return Err(ConnectionError::UnexpectedStatus(response.status.as_u16()));
        }

        let results = response
            .body
            .as_array()
            .ok_or_else(|| ConnectionError::Malformed("bulk insert result is not an array".into()))?;
        if results.len() != self.docs_per_insert {
            return Err(ConnectionError::Malformed(format!(
                "expected {} results, got {}",
                self.docs_per_insert,
                results.len()
            )));
        }
        if let Some(failed) = results.iter().find(|r| r.get("error").is_some()) {
            return Err(ConnectionError::Malformed(format!("document rejected: {failed}")));
        }

        Ok(self.next_batch())
    }
}

/// Bulk-insert workload over HTTP, driven by a [`BenchmarkConfig`].
///
/// The word pool and a base seed are drawn up front from one source seeded with `config.seed`.
/// Connection `i` seeds its generator from `base + i`, so a seeded run writes the same documents
/// every time, for any number of connections.
pub struct BulkInsertWorkload<D> {
    base: Url,
    config: BenchmarkConfig,
    words: Arc<WordPool>,
    seed: u64,
    documents: Arc<D>,
}

impl<D: DocumentFactory> BulkInsertWorkload<D> {
    pub fn new(config: BenchmarkConfig, documents: D) -> Result<Self, ConnectionError> {
        let base = Url::parse(&config.database_url)?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let words = Arc::new(WordPool::create(&mut rng));
        let seed = rng.gen();

        Ok(Self {
            base,
            config,
            words,
            seed,
            documents: Arc::new(documents),
        })
    }

    pub fn with_words(mut self, words: Vec<String>) -> Result<Self, GeneratorError> {
        self.words = Arc::new(WordPool::from_words(words)?);
        Ok(self)
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn values(&self, index: usize) -> ValueGenerator {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(index as u64));
        ValueGenerator::from_rng(self.words.clone(), &mut rng)
    }
}

impl<D: DocumentFactory> Workload for BulkInsertWorkload<D> {
    type Connection = HttpConnection;
    type Handler = BulkInsertHandler<D>;

    async fn connect(&self, _index: usize) -> Result<HttpConnection, ConnectionError> {
        HttpConnection::open(&self.base, &self.config.database_name).await
    }

    fn handler(&self, index: usize) -> BulkInsertHandler<D> {
        BulkInsertHandler::new(
            self.values(index),
            self.documents.clone(),
            self.config.bulk_inserts_per_connection,
            self.config.docs_per_bulk_insert.get(),
        )
    }
}

/// Creates `database`; an already existing database is not an error.
pub async fn create_database(base: &Url, database: &str) -> Result<(), ConnectionError> {
    let res = Client::new()
        .put(database_url(base, database, None)?)
        .send()
        .await?;
    match res.status() {
        StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::PRECONDITION_FAILED => {
            debug!("Database {database} ready ({}).", res.status());
            Ok(())
        }
        status => Err(ConnectionError::UnexpectedStatus(status.as_u16())),
    }
}

/// Deletes `database`; a missing database is not an error.
pub async fn delete_database(base: &Url, database: &str) -> Result<(), ConnectionError> {
    let res = Client::new()
        .delete(database_url(base, database, None)?)
        .send()
        .await?;
    match res.status() {
        StatusCode::OK | StatusCode::ACCEPTED | StatusCode::NOT_FOUND => Ok(()),
        status => Err(ConnectionError::UnexpectedStatus(status.as_u16())),
    }
}
