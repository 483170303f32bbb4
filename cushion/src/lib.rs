#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod benchmark;
pub mod completion;
pub mod connection;
pub mod error;
pub mod generator;
pub mod handler;
#[cfg(feature = "http")]
#[cfg_attr(docsrs, doc(cfg(feature = "http")))]
pub mod http;
pub mod timer;
pub mod words;

pub use benchmark::{Benchmark, Workload};
pub use completion::CompletionCounter;
pub use generator::ValueGenerator;
pub use handler::{BenchmarkHandler, ConnectionState};
pub use words::WordPool;

pub mod prelude {
    pub use crate::benchmark::{Benchmark, Workload};
    pub use crate::connection::{
        close_channel, shutdown_channel, CloseFuture, CloseSignal, Connection, ResponseHandler,
        Shutdown, ShutdownHandle,
    };
    pub use crate::error::{CompletionError, ConnectionError, GeneratorError};
    pub use crate::generator::ValueGenerator;
    pub use crate::timer::{ConnectionTimer, Timer};
    pub use crate::words::WordPool;
    pub use crate::{BenchmarkHandler, CompletionCounter, ConnectionState};

    #[cfg(feature = "http")]
    pub use crate::http::{BulkInsertWorkload, DocumentFactory};

    pub use cushion_core::{BenchmarkConfig, ConnectionReport, RunStatistics};
}
