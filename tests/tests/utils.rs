use cushion::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub const MOCK_ADDR: &str = "127.0.0.1:3002";

/// Starts the tracing subscriber and a shared mock database, once per test binary.
#[allow(unused)]
pub async fn init() -> Arc<mock_service::MockDatabase> {
    static DB: OnceLock<Arc<mock_service::MockDatabase>> = OnceLock::new();

    let wait = DB.get().is_none();

    let db = DB
        .get_or_init(|| {
            let _ = FmtSubscriber::builder()
                .with_env_filter(EnvFilter::new("cushion=debug,mock_service=info"))
                .try_init();

            let db = Arc::new(mock_service::MockDatabase::new());
            let server_db = db.clone();
            // Each test owns its runtime, so the server gets a thread of its own.
            std::thread::spawn(move || {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async move {
                    let addr: SocketAddr = MOCK_ADDR.parse().unwrap();
                    if let Err(err) = mock_service::run(addr, server_db).await {
                        error!("Mock service failed: {err}");
                    }
                });
            });
            db
        })
        .clone();

    if wait {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    db
}

/// Global sequence clock for ordering observations across connections.
#[derive(Debug, Default)]
pub struct Clock(AtomicU64);

impl Clock {
    pub fn tick(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// What one connection observed, stamped with the shared clock. Zero means "never".
#[derive(Debug, Default)]
pub struct Observer {
    pub timer_stops: AtomicU64,
    pub stopped_at: AtomicU64,
    pub close_requests: AtomicU64,
    pub close_requested_at: AtomicU64,
}

pub struct ObservedTimer {
    pub inner: ConnectionTimer,
    pub clock: Arc<Clock>,
    pub observer: Arc<Observer>,
}

impl Timer for ObservedTimer {
    fn start(&mut self) {
        self.inner.start();
    }

    fn stop(&mut self) {
        self.observer.timer_stops.fetch_add(1, Ordering::SeqCst);
        self.observer
            .stopped_at
            .store(self.clock.tick(), Ordering::SeqCst);
        self.inner.stop();
    }

    fn elapsed(&self) -> Option<Duration> {
        self.inner.elapsed()
    }
}

/// Echo connection with random latency, random transport faults and out-of-order close completion.
pub struct MockConnection {
    pub rng: SmallRng,
    pub fail_rate: f64,
    pub clock: Arc<Clock>,
    pub observer: Arc<Observer>,
}

impl Connection for MockConnection {
    type Request = u32;
    type Response = u32;

    async fn send(&mut self, request: u32) -> Result<u32, ConnectionError> {
        let delay = Duration::from_micros(self.rng.gen_range(0..500));
        tokio::time::sleep(delay).await;
        if self.rng.gen_bool(self.fail_rate) {
            return Err(ConnectionError::Io(
                std::io::ErrorKind::ConnectionReset.into(),
            ));
        }
        Ok(request)
    }

    fn close(&mut self) -> CloseFuture {
        self.observer.close_requests.fetch_add(1, Ordering::SeqCst);
        self.observer
            .close_requested_at
            .store(self.clock.tick(), Ordering::SeqCst);

        let (signal, fut) = close_channel();
        let delay = Duration::from_micros(self.rng.gen_range(0..2_000));
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            signal.complete(Ok(()));
        });
        fut
    }
}

/// Issues `remaining` requests; each response is malformed with probability `fail_rate`.
pub struct Requests {
    pub remaining: u32,
    pub fail_rate: f64,
    pub rng: SmallRng,
}

impl ResponseHandler for Requests {
    type Request = u32;
    type Response = u32;

    fn on_open(&mut self) -> Option<u32> {
        self.next()
    }

    fn on_response(&mut self, response: u32) -> Result<Option<u32>, ConnectionError> {
        if self.rng.gen_bool(self.fail_rate) {
            return Err(ConnectionError::Malformed(format!("response {response}")));
        }
        Ok(self.next())
    }
}

impl Requests {
    fn next(&mut self) -> Option<u32> {
        let current = self.remaining.checked_sub(1)?;
        self.remaining = current;
        Some(current)
    }
}

/// Mock workload: connection `i` fails to connect with probability `connect_fail_rate`.
pub struct MockWorkload {
    pub seed: u64,
    pub requests: u32,
    pub connect_fail_rate: f64,
    pub send_fail_rate: f64,
    pub response_fail_rate: f64,
    pub clock: Arc<Clock>,
    pub observers: Vec<Arc<Observer>>,
}

impl MockWorkload {
    pub fn new(seed: u64, connections: usize) -> Self {
        Self {
            seed,
            requests: 10,
            connect_fail_rate: 0.,
            send_fail_rate: 0.,
            response_fail_rate: 0.,
            clock: Arc::new(Clock::default()),
            observers: (0..connections).map(|_| Arc::default()).collect(),
        }
    }

    fn rng(&self, index: usize, stream: u64) -> SmallRng {
        SmallRng::seed_from_u64(self.seed ^ ((index as u64) << 8) ^ stream)
    }
}

impl Workload for MockWorkload {
    type Connection = MockConnection;
    type Handler = Requests;

    async fn connect(&self, index: usize) -> Result<MockConnection, ConnectionError> {
        let mut rng = self.rng(index, 1);
        tokio::time::sleep(Duration::from_micros(rng.gen_range(0..300))).await;
        if rng.gen_bool(self.connect_fail_rate) {
            return Err(ConnectionError::Connect(format!("connection {index} refused")));
        }
        Ok(MockConnection {
            rng,
            fail_rate: self.send_fail_rate,
            clock: self.clock.clone(),
            observer: self.observers[index].clone(),
        })
    }

    fn handler(&self, index: usize) -> Requests {
        Requests {
            remaining: self.requests,
            fail_rate: self.response_fail_rate,
            rng: self.rng(index, 2),
        }
    }
}
