use std::{sync::Arc, time::Duration};

use cmdrun_model::{CacheKey, OperationInfo};
use tracing::{trace, warn};

use super::Catalog;
use crate::cache::CacheBackend;

/// Help text is static; cache it for a day unless configured otherwise.
pub const DEFAULT_HELP_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Name of the built-in help command, listed without help text.
const HELP_COMMAND: &str = "help";

/// Help texts cached under `command_help:{name}`.
///
/// Cache failures are logged and the text is recomputed from the catalog.
#[derive(Clone)]
pub struct HelpCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Option<Duration>,
}

impl HelpCache {
    /// `ttl == None` keeps entries until overwritten.
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Option<Duration>) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn describe(&self, catalog: &dyn Catalog, name: &str) -> Option<String> {
        let key = CacheKey::for_help(name);
        match self.backend.get(&key) {
            Ok(Some(text)) => {
                trace!(target: "cmdrun.store", %key, "help cache hit");
                return Some(text);
            }
            Ok(None) => {}
            Err(e) => warn!(target: "cmdrun.store", %key, error = %e, "help cache read failed"),
        }

        let text = catalog.describe(name)?;
        if let Err(e) = self.backend.set(&key, text.clone(), self.ttl) {
            warn!(target: "cmdrun.store", %key, error = %e, "help cache write failed");
        }
        Some(text)
    }

    /// Every operation with its help text, sorted by name.
    pub fn list_operations(&self, catalog: &dyn Catalog) -> Vec<OperationInfo> {
        let mut ops: Vec<_> = catalog
            .list()
            .into_iter()
            .map(|entry| {
                let help = if entry.name == HELP_COMMAND {
                    None
                } else {
                    self.describe(catalog, &entry.name)
                };
                OperationInfo {
                    name: entry.name,
                    group: entry.group,
                    help,
                }
            })
            .collect();
        ops.sort_by(|a, b| a.name.cmp(&b.name));
        ops
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        cache::MemoryCache,
        catalog::{Operation, OperationRegistry},
        error::OperationError,
        filter::CommandIo,
        testing::FailingCache,
    };

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl Operation for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn help(&self) -> &str {
            self.1
        }
        async fn run(&self, _args: &[String], _io: &mut CommandIo) -> Result<(), OperationError> {
            Ok(())
        }
    }

    fn registry() -> OperationRegistry {
        OperationRegistry::new()
            .with(Named("zeta", "Last one."))
            .unwrap()
            .with(Named("help", "Shows help."))
            .unwrap()
            .with(Named("alpha", "First one."))
            .unwrap()
    }

    #[test]
    fn listing_is_sorted_and_skips_help_for_help() {
        let cache = HelpCache::new(Arc::new(MemoryCache::default()), Some(DEFAULT_HELP_TTL));
        let ops = cache.list_operations(&registry());
        let names: Vec<_> = ops.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["alpha", "help", "zeta"]);
        assert_eq!(ops[0].help.as_deref(), Some("First one."));
        assert_eq!(ops[1].help, None);
    }

    #[test]
    fn cached_text_wins_over_catalog() {
        let backend = Arc::new(MemoryCache::default());
        backend
            .set(&CacheKey::for_help("alpha"), "stale".into(), None)
            .unwrap();
        let cache = HelpCache::new(backend, None);
        assert_eq!(cache.describe(&registry(), "alpha").as_deref(), Some("stale"));
    }

    #[test]
    fn describe_populates_cache() {
        let backend = Arc::new(MemoryCache::default());
        let cache = HelpCache::new(backend.clone(), None);
        cache.describe(&registry(), "zeta");
        assert_eq!(
            backend.get(&CacheKey::for_help("zeta")).unwrap().as_deref(),
            Some("Last one.")
        );
        assert_eq!(cache.describe(&registry(), "nope"), None);
    }

    #[test]
    fn broken_cache_falls_back_to_catalog() {
        let cache = HelpCache::new(Arc::new(FailingCache::default()), None);
        assert_eq!(cache.describe(&registry(), "alpha").as_deref(), Some("First one."));
    }
}
