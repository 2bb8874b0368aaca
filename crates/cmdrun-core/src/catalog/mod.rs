//! Registry of invokable operations.
//!
//! An [`Operation`] receives its arguments and an explicit [`CommandIo`]; it never prints to the
//! process streams. [`Catalog`] is the narrow lookup interface the job runner and the API use.
use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;

use crate::{error::CoreError, error::OperationError, filter::CommandIo};

mod help;
pub use help::{DEFAULT_HELP_TTL, HelpCache};

/// Group name of operations registered without one.
pub const DEFAULT_GROUP: &str = "default";

/// A named unit of backend logic.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Application or group the operation belongs to.
    fn group(&self) -> &str {
        DEFAULT_GROUP
    }

    /// One-paragraph description.
    fn help(&self) -> &str {
        ""
    }

    /// Argument synopsis, e.g. `NAME [--shout]`.
    fn usage(&self) -> Option<String> {
        None
    }

    /// Run with whitespace-split `args`, writing everything through `io`.
    async fn run(&self, args: &[String], io: &mut CommandIo) -> Result<(), OperationError>;
}

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationEntry {
    pub name: String,
    pub group: String,
}

/// Lookup of operations by name.
pub trait Catalog: Send + Sync + 'static {
    /// All operations, sorted by name.
    fn list(&self) -> Vec<OperationEntry>;

    fn resolve(&self, name: &str) -> Option<Arc<dyn Operation>>;

    /// Help text of `name`, with the usage line appended when the operation has one.
    fn describe(&self, name: &str) -> Option<String> {
        let op = self.resolve(name)?;
        let mut text = op.help().to_owned();
        if let Some(usage) = op.usage() {
            text.push_str("\n\nUsage: ");
            text.push_str(&usage);
        }
        Some(text)
    }
}

/// In-memory [`Catalog`] keyed by operation name.
#[derive(Default, Clone)]
pub struct OperationRegistry {
    ops: BTreeMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation. Names are unique.
    pub fn register(&mut self, op: Arc<dyn Operation>) -> Result<(), CoreError> {
        let name = op.name().to_owned();
        if self.ops.contains_key(&name) {
            return Err(CoreError::DuplicateOperation(name));
        }
        self.ops.insert(name, op);
        Ok(())
    }

    /// Builder-style [`OperationRegistry::register`].
    pub fn with(mut self, op: impl Operation) -> Result<Self, CoreError> {
        self.register(Arc::new(op))?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl Catalog for OperationRegistry {
    fn list(&self) -> Vec<OperationEntry> {
        self.ops
            .values()
            .map(|op| OperationEntry {
                name: op.name().to_owned(),
                group: op.group().to_owned(),
            })
            .collect()
    }

    fn resolve(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.ops.get(name).cloned()
    }
}
