use serde::{Deserialize, Serialize};

/// Live status of a command run as stored in the cache and returned to pollers.
///
/// `finished` flips to `true` exactly once; a finished record is never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Filtered standard output transcript (possibly truncated).
    #[serde(default)]
    pub output: String,
    /// Filtered standard error transcript and/or the failure message.
    #[serde(default)]
    pub error: String,
    /// Whether the run reached its terminal state.
    pub finished: bool,
}

impl StatusRecord {
    /// Initial record committed at start: empty transcripts, not finished.
    pub fn pending() -> Self {
        Self::default()
    }

    /// Terminal record.
    pub fn finished(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: error.into(),
            finished: true,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.finished
    }

    /// Transcript field fed by the given stream.
    pub fn field(&self, kind: StreamKind) -> &str {
        match kind {
            StreamKind::Stdout => &self.output,
            StreamKind::Stderr => &self.error,
        }
    }

    pub fn set_field(&mut self, kind: StreamKind, text: String) {
        match kind {
            StreamKind::Stdout => self.output = text,
            StreamKind::Stderr => self.error = text,
        }
    }
}

/// Which output stream of an operation a transcript belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    /// Short label for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}
