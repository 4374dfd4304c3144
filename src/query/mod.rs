//! Query execution.

mod executor;

pub use executor::{ExecutionOutcome, QueryExecutor};
