use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Records how long a connection was active.
///
/// The benchmark handler calls [`Timer::stop`] at most once, strictly before it requests the
/// channel close, so the recorded duration never includes teardown.
pub trait Timer: Send {
    fn start(&mut self);
    fn stop(&mut self);
    fn elapsed(&self) -> Option<Duration>;
}

#[derive(Debug, Default)]
pub struct ConnectionTimer {
    started: Option<Instant>,
    elapsed: Option<Duration>,
}

impl ConnectionTimer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Timer for ConnectionTimer {
    fn start(&mut self) {
        self.started = Some(Instant::now());
        self.elapsed = None;
    }

    fn stop(&mut self) {
        if self.elapsed.is_some() {
            warn!("Connection timer stopped twice; keeping the first measurement.");
            return;
        }
        // NOTE: A timer that never started (failed connect) reports zero.
        self.elapsed = Some(
            self.started
                .map(|started| started.elapsed())
                .unwrap_or_default(),
        );
    }

    fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }
}

impl std::fmt::Display for ConnectionTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self.elapsed {
            Some(elapsed) => write!(f, "{}", humantime::format_duration(elapsed)),
            None => write!(f, "running"),
        }
    }
}
