mod error;
pub use error::{ExecError, ExecResult};

pub mod limits;
pub use limits::RlimitConfig;

#[cfg(feature = "proc")]
pub mod proc;
#[cfg(feature = "proc")]
pub use proc::{ProcessConfig, ProcessExecutor};

pub mod worker;
pub use worker::{WorkerRequest, exit_code, run_worker};

mod util;
