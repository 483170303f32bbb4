#[cfg(feature = "rt")]
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// What a single connection reports once it reaches its closed state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionReport {
    pub index: usize,
    /// Active duration captured by the connection timer; excludes teardown.
    pub elapsed: Duration,
    pub requests: u64,
    pub faulted: bool,
}

/// Run-level summary assembled by the orchestrator after every connection has closed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "rt", derive(Serialize))]
pub struct RunStatistics {
    pub connections: usize,
    pub faulted: usize,
    pub requests: u64,
    pub elapsed: Duration,
    pub mean_connection_time: Duration,
    pub max_connection_time: Duration,
}

impl RunStatistics {
    pub fn from_reports(reports: &[ConnectionReport], elapsed: Duration) -> Self {
        let connections = reports.len();
        let total: Duration = reports.iter().map(|r| r.elapsed).sum();
        let mean_connection_time = if connections == 0 {
            Duration::ZERO
        } else {
            total / connections as u32
        };

        Self {
            connections,
            faulted: reports.iter().filter(|r| r.faulted).count(),
            requests: reports.iter().map(|r| r.requests).sum(),
            elapsed,
            mean_connection_time,
            max_connection_time: reports
                .iter()
                .map(|r| r.elapsed)
                .max()
                .unwrap_or_default(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.connections - self.faulted
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "connections={} faulted={} requests={} elapsed={} mean={} max={}",
            self.connections,
            self.faulted,
            self.requests,
            humantime::format_duration(self.elapsed),
            humantime::format_duration(self.mean_connection_time),
            humantime::format_duration(self.max_connection_time),
        )
    }
}
