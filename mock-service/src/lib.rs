use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use metrics::counter;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// In-memory stand-in for a CouchDB-style document database.
#[derive(Debug, Default)]
pub struct MockDatabase {
    databases: RwLock<HashMap<String, Vec<Value>>>,
    failure_rate: f64,
    delay: Duration,
    next_id: AtomicU64,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of bulk inserts answered with a 500.
    pub fn failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate;
        self
    }

    /// Artificial latency added to every bulk insert.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn doc_count(&self, db: &str) -> Option<usize> {
        self.databases.read().ok()?.get(db).map(Vec::len)
    }
}

pub fn router(db: Arc<MockDatabase>) -> Router {
    Router::new()
        .route("/:db", get(info).put(create).delete(remove))
        .route("/:db/_bulk_docs", post(bulk_docs))
        .with_state(db)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(addr: SocketAddr, db: Arc<MockDatabase>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    debug!("Mock database listening on {addr}");
    axum::serve(listener, router(db)).await?;
    Ok(())
}

type Db = State<Arc<MockDatabase>>;

#[debug_handler(state = Arc<MockDatabase>)]
async fn info(State(db): Db, Path(name): Path<String>) -> Result<Json<Value>, StatusCode> {
    let count = db.doc_count(&name).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "db_name": name, "doc_count": count })))
}

#[debug_handler(state = Arc<MockDatabase>)]
async fn create(State(db): Db, Path(name): Path<String>) -> Result<StatusCode, StatusCode> {
    let mut databases = db
        .databases
        .write()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if databases.contains_key(&name) {
        return Err(StatusCode::PRECONDITION_FAILED);
    }
    databases.insert(name, vec![]);
    Ok(StatusCode::CREATED)
}

#[debug_handler(state = Arc<MockDatabase>)]
async fn remove(State(db): Db, Path(name): Path<String>) -> Result<StatusCode, StatusCode> {
    let mut databases = db
        .databases
        .write()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    databases
        .remove(&name)
        .map(|_| StatusCode::OK)
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Deserialize)]
struct BulkDocs {
    docs: Vec<Value>,
}

#[debug_handler(state = Arc<MockDatabase>)]
async fn bulk_docs(
    State(db): Db,
    Path(name): Path<String>,
    Json(body): Json<BulkDocs>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    counter!("mock-service.bulk_docs").increment(1);
    if !db.delay.is_zero() {
        tokio::time::sleep(db.delay).await;
    }

    if db.failure_rate > 0. && rand::thread_rng().gen_bool(db.failure_rate.min(1.)) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "injected_failure" })),
        ));
    }

    let mut databases = db.databases.write().map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "poisoned" })),
        )
    })?;
    let docs = databases.get_mut(&name).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "not_found", "reason": "Database does not exist." })),
        )
    })?;

    let results: Vec<Value> = body
        .docs
        .into_iter()
        .map(|doc| {
            let id = db.next_id.fetch_add(1, Ordering::Relaxed).to_string();
            docs.push(doc);
            json!({ "ok": true, "id": id, "rev": "1-0" })
        })
        .collect();

    Ok((StatusCode::CREATED, Json(Value::Array(results))))
}
