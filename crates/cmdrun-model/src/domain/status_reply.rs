use serde::{Deserialize, Serialize};

use crate::StatusRecord;

/// Error text of the not-found reply.
pub const NOT_FOUND_MESSAGE: &str = "not found";

/// Answer to a status poll.
///
/// A job id that never existed or whose record expired is reported with the same terminal shape
/// as a finished job, so clients stop polling on `finished: true` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusReply {
    Record(StatusRecord),
    NotFound { error: String, finished: bool },
}

impl StatusReply {
    pub fn not_found() -> Self {
        StatusReply::NotFound {
            error: NOT_FOUND_MESSAGE.to_string(),
            finished: true,
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            StatusReply::Record(rec) => rec.finished,
            StatusReply::NotFound { finished, .. } => *finished,
        }
    }

    pub fn record(&self) -> Option<&StatusRecord> {
        match self {
            StatusReply::Record(rec) => Some(rec),
            StatusReply::NotFound { .. } => None,
        }
    }
}

impl From<Option<StatusRecord>> for StatusReply {
    fn from(value: Option<StatusRecord>) -> Self {
        value.map_or_else(StatusReply::not_found, StatusReply::Record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_wire_shape() {
        let json = serde_json::to_value(StatusReply::not_found()).unwrap();
        assert_eq!(json, serde_json::json!({"error": "not found", "finished": true}));
    }

    #[test]
    fn record_serializes_flat() {
        let reply = StatusReply::Record(StatusRecord::finished("out", ""));
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"output": "out", "error": "", "finished": true})
        );
    }

    #[test]
    fn absent_record_becomes_not_found() {
        let reply = StatusReply::from(None);
        assert!(reply.is_finished());
        assert!(reply.record().is_none());
    }
}
