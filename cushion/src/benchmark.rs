//! Orchestrates a run: one task per connection, all sharing one completion counter.
use crate::completion::CompletionCounter;
use crate::connection::{shutdown_channel, Connection, ResponseHandler, Shutdown, ShutdownHandle};
use crate::error::ConnectionError;
use crate::handler::BenchmarkHandler;
use crate::timer::ConnectionTimer;
use cushion_core::{ConnectionReport, RunStatistics};
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Supplies the per-connection pieces of a run.
pub trait Workload: Send + Sync + 'static {
    type Connection: Connection;
    type Handler: ResponseHandler<
            Request = <Self::Connection as Connection>::Request,
            Response = <Self::Connection as Connection>::Response,
        > + 'static;

    /// Opens connection `index`.
    fn connect(
        &self,
        index: usize,
    ) -> impl Future<Output = Result<Self::Connection, ConnectionError>> + Send;

    /// Response handler driving the stream over connection `index`.
    fn handler(&self, index: usize) -> Self::Handler;
}

/// A benchmark run over a fixed number of concurrent connections.
///
/// # Example
///
/// ```ignore
/// let stats = Benchmark::new(workload, NonZeroUsize::new(50).unwrap())
///     .duration(Duration::from_secs(60))
///     .run()
///     .await;
/// ```
pub struct Benchmark<W> {
    workload: Arc<W>,
    connections: NonZeroUsize,
    duration: Option<Duration>,
    trigger: ShutdownHandle,
    shutdown: Shutdown,
}

impl<W> Benchmark<W>
where
    W: Workload,
    W::Connection: 'static,
{
    pub fn new(workload: W, connections: NonZeroUsize) -> Self {
        let (trigger, shutdown) = shutdown_channel();
        Self {
            workload: Arc::new(workload),
            connections,
            duration: None,
            trigger,
            shutdown,
        }
    }

    /// Stop issuing requests and close every connection once `duration` has passed.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Handle for triggering a global shutdown from outside the run.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.trigger.clone()
    }

    #[instrument(name = "benchmark", skip_all, fields(connections = self.connections.get()))]
    pub async fn run(self) -> RunStatistics {
        let total = self.connections.get();
        info!("Starting benchmark over {total} connections.");

        let completion = Arc::new(CompletionCounter::new(total));
        let start = Instant::now();

        let tasks: Vec<_> = (0..total)
            .map(|index| {
                let workload = self.workload.clone();
                let completion = completion.clone();
                let mut shutdown = self.shutdown.clone();
                tokio::spawn(
                    async move {
                        // No handler owns the completion slot yet, so a panic here releases it.
                        let responses = match panic::catch_unwind(AssertUnwindSafe(|| {
                            workload.handler(index)
                        })) {
                            Ok(responses) => responses,
                            Err(_) => return abandon(index, &completion),
                        };
                        let handler = BenchmarkHandler::new(
                            index,
                            ConnectionTimer::new(),
                            responses,
                            completion,
                        );

                        let connected = tokio::select! {
                            biased;
                            _ = shutdown.triggered() => None,
                            res = workload.connect(index) => Some(res),
                        };
                        match connected {
                            Some(Ok(connection)) => handler.run(connection, shutdown).await,
                            Some(Err(err)) => handler.fail(err).await,
                            None => handler.cancel().await,
                        }
                    }
                    .in_current_span(),
                )
            })
            .collect();

        match self.duration {
            Some(duration) => {
                tokio::select! {
                    _ = completion.wait() => {}
                    _ = tokio::time::sleep(duration) => {
                        info!("Run duration of {} reached; shutting down.", humantime::format_duration(duration));
                        self.trigger.shutdown();
                        completion.wait().await;
                    }
                }
            }
            None => completion.wait().await,
        }
        let elapsed = start.elapsed();

        let mut reports = Vec::with_capacity(total);
        for (index, task) in tasks.into_iter().enumerate() {
            match task.await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    error!(connection = index, "Connection task failed: {err}");
                    reports.push(ConnectionReport {
                        index,
                        elapsed: Duration::ZERO,
                        requests: 0,
                        faulted: true,
                    });
                }
            }
        }

        let stats = RunStatistics::from_reports(&reports, elapsed);
        info!("Benchmark complete: {stats}");
        stats
    }
}

/// Releases the slot of a connection whose response handler could not be built.
fn abandon(index: usize, completion: &CompletionCounter) -> ConnectionReport {
    error!(connection = index, "Building the response handler panicked.");
    if let Err(err) = completion.count_down() {
        error!(connection = index, "{err}");
    }
    ConnectionReport {
        index,
        elapsed: Duration::ZERO,
        requests: 0,
        faulted: true,
    }
}
