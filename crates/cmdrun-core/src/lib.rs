pub mod error;
pub use error::{CoreError, ExecutorError, OperationError, StoreError};

pub mod limits;
pub use limits::StoreLimits;

pub mod filter;
pub use filter::{CommandIo, FilteredStream, FlushPolicy, LineFilter};

pub mod cache;
pub use cache::{CacheBackend, CacheConfig, FileCache, MemoryCache};

pub mod store;
pub use store::StatusStore;

pub mod catalog;
pub use catalog::{Catalog, HelpCache, Operation, OperationRegistry};

pub mod runner;
pub use runner::{JobContext, JobTicket, run_job};

pub mod executor;
pub use executor::{Admission, IsolatedExecutor, TaskExecutor};

pub mod service;
pub use service::JobService;

pub mod metrics;
pub use metrics::{JobOutcome, MetricsBackend, MetricsHandle, NoopMetrics};

#[cfg(test)]
mod testing;
