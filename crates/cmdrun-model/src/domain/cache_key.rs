use std::fmt;

use serde::{Deserialize, Serialize};

use crate::JobId;

const JOB_NAMESPACE: &str = "command_runner";
const HELP_NAMESPACE: &str = "command_help";

/// Namespaced key of an entry in the shared cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key of the status record of a job: `command_runner:{id}`.
    pub fn for_job(id: &JobId) -> Self {
        Self(format!("{JOB_NAMESPACE}:{id}"))
    }

    /// Key of the cached help text of an operation: `command_help:{name}`.
    pub fn for_help(command: &str) -> Self {
        Self(format!("{HELP_NAMESPACE}:{command}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_key_is_deterministic() {
        let id = JobId::from("1234");
        assert_eq!(CacheKey::for_job(&id), CacheKey::for_job(&id));
        assert_eq!(CacheKey::for_job(&id).as_str(), "command_runner:1234");
    }

    #[test]
    fn help_key_uses_own_namespace() {
        assert_eq!(CacheKey::for_help("migrate").as_str(), "command_help:migrate");
    }
}
