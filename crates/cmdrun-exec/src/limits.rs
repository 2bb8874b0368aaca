//! POSIX rlimits for worker processes.
//!
//! ## Overview
//!
//! A process-mode job runs its operation inside a separate worker, and [`RlimitConfig`] caps what
//! that worker may consume without touching the server itself.
//! - On **Unix platforms** (`Linux`, `macOS`, `*BSD`):
//!   limits are applied in a `pre_exec` hook, in the child after `fork()` and right before `execve()`.
//!   The worker binary therefore never runs unrestricted, not even during its own startup.
//! - On **non-Unix platforms** rlimits do not exist.
//!   A non-empty config is logged once per spawn and otherwise ignored, so the same configuration
//!   works everywhere.
//!
//! ## Interaction with job records
//!
//! A worker killed by the kernel for crossing a limit exits through a signal. The process executor
//! treats that like any other crash and writes the terminal record on the worker's behalf.
use serde::{Deserialize, Serialize};
use tokio::process::Command;
#[cfg(not(unix))]
use tracing::warn;

/// Declarative resource limits of a worker process.
///
/// Every field is optional:
/// - `None` keeps the limit inherited from the server.
/// - `disable_core_dumps = false` keeps the inherited core-dump setting.
///
/// The struct deserializes from partial JSON, missing fields taking their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RlimitConfig {
    /// Maximum number of open file descriptors (`RLIMIT_NOFILE`).
    ///
    /// A worker needs a handful for stdio, its status cache and the operation itself.
    /// Typical values:
    /// - `Some(256)` for operations that only print
    /// - `Some(1024)` or more for operations that open files or sockets
    ///
    /// `None` leaves the inherited limit unchanged.
    #[serde(default)]
    pub max_open_files: Option<u64>,

    /// Maximum size in bytes of any file the worker creates or grows (`RLIMIT_FSIZE`).
    ///
    /// Crossing it delivers `SIGXFSZ`, which terminates the worker and shows up as a crash in the
    /// job record. Keep it well above the status record bound when the cache lives on disk,
    /// since the worker writes its own status entries.
    /// `None` leaves the inherited limit unchanged.
    #[serde(default)]
    pub max_file_size_bytes: Option<u64>,

    /// Disable core dumps (`RLIMIT_CORE = 0`) when set to `true`.
    ///
    /// Stops crashing workers from leaving large core files behind on busy hosts.
    /// When `false`, the inherited core limit is preserved.
    #[serde(default)]
    pub disable_core_dumps: bool,
}

impl RlimitConfig {
    /// Returns `true` if no explicit limit is configured.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max_open_files.is_none()
            && !self.disable_core_dumps
            && self.max_file_size_bytes.is_none()
    }
}

/// Attach `config` to a worker command about to be spawned.
///
/// On Unix:
/// - installs a `pre_exec` hook calling `setrlimit` in the child before `execve`.
/// On non-Unix:
/// - logs a warning for a non-empty `config` and does nothing else.
pub fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
    if config.is_empty() {
        return;
    }

    #[cfg(unix)]
    {
        unix_impl::attach_rlimits(cmd, config);
    }

    #[cfg(not(unix))]
    {
        let _ = cmd;
        warn!(
            target: "cmdrun.exec.proc",
            ?config,
            "rlimits requested on a non-Unix OS; ignored"
        );
    }
}

#[cfg(unix)]
mod unix_impl {
    use std::io;

    use tokio::process::Command;

    use super::RlimitConfig;

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    type Resource = libc::__rlimit_resource_t;
    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    type Resource = libc::c_int;

    pub fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
        let max_file_size_bytes = config.max_file_size_bytes;
        let max_open_files = config.max_open_files;
        let disable_core_dumps = config.disable_core_dumps;

        // SAFETY: the hook only calls async-signal-safe `setrlimit`.
        unsafe {
            cmd.pre_exec(move || {
                if let Some(nofile) = max_open_files {
                    apply_rlimit(libc::RLIMIT_NOFILE, nofile)?;
                }
                if let Some(fsize) = max_file_size_bytes {
                    apply_rlimit(libc::RLIMIT_FSIZE, fsize)?;
                }
                if disable_core_dumps {
                    apply_rlimit(libc::RLIMIT_CORE, 0)?;
                }
                Ok(())
            });
        }
    }

    fn apply_rlimit(resource: Resource, value: u64) -> io::Result<()> {
        let rlim = libc::rlimit {
            rlim_cur: value as libc::rlim_t,
            rlim_max: value as libc::rlim_t,
        };

        let rc = unsafe { libc::setrlimit(resource, &rlim) };
        if rc != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}
