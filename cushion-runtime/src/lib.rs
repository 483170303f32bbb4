pub mod runtime;

mod error;

pub use crate::error::RuntimeError;
pub use crate::runtime::CushionRuntime;
