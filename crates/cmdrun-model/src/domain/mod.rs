mod job_id;
pub use job_id::JobId;

mod cache_key;
pub use cache_key::CacheKey;

mod status_record;
pub use status_record::{StatusRecord, StreamKind};

mod status_reply;
pub use status_reply::{NOT_FOUND_MESSAGE, StatusReply};

mod operation_info;
pub use operation_info::OperationInfo;

mod arguments;
pub use arguments::{split_arguments, validate_command_name};

/// Name of a catalog-registered operation (e.g. `"with_args_command"`).
pub type CommandName = String;

/// Logical grouping of an operation inside the catalog (application / module name).
pub type OperationGroup = String;
