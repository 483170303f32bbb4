//! Seams between the benchmark handler and the wire.
use crate::error::ConnectionError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{oneshot, watch};

/// One logical connection to the database.
///
/// `send` is the only place a benchmark stream waits on the server. `close` only *requests* the
/// close; completion is delivered through the returned [`CloseFuture`].
#[trait_variant::make(Connection: Send)]
pub trait LocalConnection {
    type Request: Send;
    type Response: Send;

    async fn send(&mut self, request: Self::Request) -> Result<Self::Response, ConnectionError>;

    fn close(&mut self) -> CloseFuture;
}

/// Interprets responses and decides what the stream does next.
///
/// Returning `None` ends the stream naturally; returning an error faults the connection.
pub trait ResponseHandler: Send {
    type Request: Send;
    type Response: Send;

    /// First request once the connection is open.
    fn on_open(&mut self) -> Option<Self::Request>;

    fn on_response(
        &mut self,
        response: Self::Response,
    ) -> Result<Option<Self::Request>, ConnectionError>;
}

/// Creates a linked close signal/future pair.
pub fn close_channel() -> (CloseSignal, CloseFuture) {
    let (tx, rx) = oneshot::channel();
    (CloseSignal { tx }, CloseFuture { rx })
}

/// Completion side of a close request, held by whatever actually releases the channel.
#[derive(Debug)]
pub struct CloseSignal {
    tx: oneshot::Sender<Result<(), ConnectionError>>,
}

impl CloseSignal {
    pub fn complete(self, result: Result<(), ConnectionError>) {
        // The requester may have gone away already; nothing left to notify.
        let _ = self.tx.send(result);
    }
}

/// Resolves when the channel a close was requested on has been released.
///
/// Resolves to [`ConnectionError::CloseAborted`] if the [`CloseSignal`] is dropped without
/// completing.
#[pin_project::pin_project]
#[derive(Debug)]
pub struct CloseFuture {
    #[pin]
    rx: oneshot::Receiver<Result<(), ConnectionError>>,
}

impl CloseFuture {
    /// A close that has already completed, for connections with nothing to release.
    pub fn ready(result: Result<(), ConnectionError>) -> Self {
        let (signal, fut) = close_channel();
        signal.complete(result);
        fut
    }
}

impl Future for CloseFuture {
    type Output = Result<(), ConnectionError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().rx.poll(cx) {
            Poll::Ready(Ok(res)) => Poll::Ready(res),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ConnectionError::CloseAborted)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Creates a run-wide shutdown trigger and the listener handed to each connection.
pub fn shutdown_channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (
        ShutdownHandle { tx: Arc::new(tx) },
        Shutdown { rx: Some(rx) },
    )
}

/// Triggers a global shutdown: connections stop issuing requests and close.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: Option<watch::Receiver<bool>>,
}

impl Shutdown {
    /// A listener that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_triggered(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once shutdown has been requested.
    ///
    /// If every [`ShutdownHandle`] is dropped without triggering, this never resolves.
    pub async fn triggered(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        let res = rx.wait_for(|triggered| *triggered).await.map(|_| ());
        if res.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
