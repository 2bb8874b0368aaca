use serde::{Deserialize, Serialize};

use crate::{CommandName, OperationGroup};

/// Catalog entry as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInfo {
    pub name: CommandName,
    /// Application / module the operation belongs to.
    #[serde(rename = "app")]
    pub group: OperationGroup,
    /// Help and usage text; `None` when the operation has none to show.
    pub help: Option<String>,
}
