//! Pipeline execution: the outcome resolver and the run engine

pub mod engine;
pub mod resolver;

pub use engine::{EventHandler, ExecutionEngine, ExecutionError, ExecutionEvent};
pub use resolver::{resolve, resolve_run, ResolveError};
