//! Per-connection lifecycle and the exactly-once completion protocol.
use crate::completion::CompletionCounter;
use crate::connection::{CloseFuture, Connection, ResponseHandler, Shutdown};
use crate::error::ConnectionError;
use crate::timer::Timer;
use cushion_core::ConnectionReport;
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

/// Drives one connection's benchmark stream and guarantees its teardown happens once.
///
/// `Open -> Closing` happens on natural completion, on a fault, or on shutdown, and is where the
/// timer stops and the close is requested. `Closing -> Closed` happens when the close completes
/// and is the only place the shared [`CompletionCounter`] is decremented. Neither transition
/// can fire twice, so every connection decrements the counter exactly once however it ends.
pub struct BenchmarkHandler<T: Timer, H: ResponseHandler> {
    index: usize,
    state: ConnectionState,
    timer: T,
    responses: H,
    completion: Arc<CompletionCounter>,
    requests: u64,
    faulted: bool,
}

impl<T: Timer, H: ResponseHandler> BenchmarkHandler<T, H> {
    pub fn new(index: usize, timer: T, responses: H, completion: Arc<CompletionCounter>) -> Self {
        Self {
            index,
            state: ConnectionState::Open,
            timer,
            responses,
            completion,
            requests: 0,
            faulted: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The connection is established; starts the timer and returns the first request.
    pub fn on_open(&mut self) -> Option<H::Request> {
        if self.state != ConnectionState::Open {
            return None;
        }
        self.timer.start();
        self.responses.on_open()
    }

    pub fn on_response(
        &mut self,
        response: H::Response,
    ) -> Result<Option<H::Request>, ConnectionError> {
        if self.state != ConnectionState::Open {
            trace!("Response arrived after close was requested; ignoring.");
            return Ok(None);
        }

        self.requests += 1;
        #[cfg(feature = "metrics")]
        metrics::counter!("cushion.requests").increment(1);

        self.responses.on_response(response)
    }

    /// Stops the timer and requests the channel close.
    ///
    /// Returns `None` if a close is already under way; the caller must then not wait on anything.
    pub fn close<C: Connection>(&mut self, connection: &mut C) -> Option<CloseFuture> {
        if !self.begin_close() {
            return None;
        }
        Some(connection.close())
    }

    /// Reports `cause` and closes through the same path as a natural completion.
    ///
    /// An error arriving once a close is under way does not fault the connection.
    pub fn on_error<C: Connection>(
        &mut self,
        connection: &mut C,
        cause: ConnectionError,
    ) -> Option<CloseFuture> {
        self.fault(&cause);
        self.close(connection)
    }

    /// The connection could not be established; there is no channel to release.
    pub fn on_connect_failed(&mut self, cause: ConnectionError) -> Option<CloseFuture> {
        self.fault(&cause);
        self.release()
    }

    /// Shutdown arrived before the connection was established.
    pub fn on_connect_cancelled(&mut self) -> Option<CloseFuture> {
        debug!(connection = self.index, "Shutdown before the connection opened.");
        self.release()
    }

    /// The requested close finished. Returns whether this call closed the connection.
    pub fn on_close_complete(&mut self, result: Result<(), ConnectionError>) -> bool {
        if self.state != ConnectionState::Closing {
            warn!(
                connection = self.index,
                "Close completion in state {:?}; ignoring.", self.state
            );
            return false;
        }

        if let Err(err) = result {
            warn!(connection = self.index, "Channel close failed: {err}");
        }
        self.finish();
        true
    }

    pub fn report(&self) -> ConnectionReport {
        ConnectionReport {
            index: self.index,
            elapsed: self.timer.elapsed().unwrap_or_default(),
            requests: self.requests,
            faulted: self.faulted,
        }
    }

    /// Runs the stream until it completes, faults, or `shutdown` fires, then closes it.
    #[instrument(name = "connection", skip_all, fields(index = self.index))]
    pub async fn run<C>(mut self, mut connection: C, mut shutdown: Shutdown) -> ConnectionReport
    where
        C: Connection<Request = H::Request, Response = H::Response>,
    {
        let mut next = self.on_open();

        let close = loop {
            let Some(request) = next.take() else {
                trace!("Stream complete.");
                break self.close(&mut connection);
            };

            let sent = tokio::select! {
                biased;
                _ = shutdown.triggered() => None,
                res = connection.send(request) => Some(res),
            };

            match sent {
                None => {
                    debug!("Shutdown requested; closing.");
                    break self.close(&mut connection);
                }
                Some(Ok(response)) => match self.on_response(response) {
                    Ok(request) => next = request,
                    Err(err) => break self.on_error(&mut connection, err),
                },
                Some(Err(err)) => break self.on_error(&mut connection, err),
            }
        };

        if let Some(close) = close {
            let res = close.await;
            self.on_close_complete(res);
        }
        self.report()
    }

    /// Settles a connection whose connect attempt failed.
    pub async fn fail(mut self, cause: ConnectionError) -> ConnectionReport {
        let close = self.on_connect_failed(cause);
        self.settle(close).await
    }

    /// Settles a connection whose connect attempt was abandoned on shutdown.
    pub async fn cancel(mut self) -> ConnectionReport {
        let close = self.on_connect_cancelled();
        self.settle(close).await
    }

    async fn settle(&mut self, close: Option<CloseFuture>) -> ConnectionReport {
        if let Some(close) = close {
            let res = close.await;
            self.on_close_complete(res);
        }
        self.report()
    }

    fn release(&mut self) -> Option<CloseFuture> {
        if !self.begin_close() {
            return None;
        }
        Some(CloseFuture::ready(Ok(())))
    }

    fn fault(&mut self, cause: &ConnectionError) {
        if self.state != ConnectionState::Open {
            debug!(
                connection = self.index,
                "Error after close was requested: {cause}"
            );
            return;
        }
        error!(connection = self.index, "Connection fault: {cause}");
        self.faulted = true;
        #[cfg(feature = "metrics")]
        metrics::counter!("cushion.connection.faulted").increment(1);
    }

    fn begin_close(&mut self) -> bool {
        if self.state != ConnectionState::Open {
            debug!(
                connection = self.index,
                "Close already requested ({:?}).", self.state
            );
            return false;
        }
        self.state = ConnectionState::Closing;
        self.timer.stop();
        true
    }

    fn finish(&mut self) {
        self.state = ConnectionState::Closed;
        #[cfg(feature = "metrics")]
        metrics::counter!("cushion.connection.closed").increment(1);

        match self.completion.count_down() {
            Ok(remaining) => trace!(connection = self.index, "Closed, {remaining} remaining."),
            Err(err) => error!(connection = self.index, "{err}"),
        }
    }
}

/// A handler dropped before `Closed` (task panic or abort) releases its completion slot here.
///
/// From `Closing` this decrements without waiting for the pending close to complete, since the
/// close future went away with the task. It is the one path where `Closed` is reached before the
/// channel is known to be released.
impl<T: Timer, H: ResponseHandler> Drop for BenchmarkHandler<T, H> {
    fn drop(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        warn!(
            connection = self.index,
            "Handler dropped in state {:?}; releasing its completion slot.", self.state
        );
        if self.state == ConnectionState::Open {
            self.timer.stop();
        }
        self.finish();
    }
}
