//! Size and lifetime bounds of status records.
use std::{borrow::Cow, time::Duration};

use cmdrun_model::StatusRecord;
use serde::{Deserialize, Serialize};

/// Largest payload a single cache entry may hold (1 MiB).
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Room left for encoding overhead when fitting a record under [`MAX_RECORD_BYTES`].
pub const SAFETY_MARGIN_BYTES: usize = 10_000;

/// Status records expire one hour after their last write.
pub const STATUS_TTL_SECS: u64 = 3600;

/// Bytes of the error text kept in a fallback record.
pub const FALLBACK_ERROR_BYTES: usize = 1000;

pub const OUTPUT_TRUNCATED_NOTICE: &str = "\n... (output truncated due to size limit)";
pub const ERROR_TRUNCATED_NOTICE: &str = "\n... (error output truncated due to size limit)";

/// Bounds applied to every status record write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLimits {
    /// Hard bound of an encoded record.
    pub max_record_bytes: usize,
    /// Subtracted from `max_record_bytes` to get the transcript budget.
    pub safety_margin: usize,
    /// Entry lifetime counted from the last write.
    pub ttl_secs: u64,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_record_bytes: MAX_RECORD_BYTES,
            safety_margin: SAFETY_MARGIN_BYTES,
            ttl_secs: STATUS_TTL_SECS,
        }
    }
}

impl StoreLimits {
    pub fn validate(&self) -> Result<(), String> {
        if self.safety_margin >= self.max_record_bytes {
            return Err(format!(
                "safety margin ({}) must be smaller than max record size ({})",
                self.safety_margin, self.max_record_bytes
            ));
        }
        if self.ttl_secs == 0 {
            return Err("status ttl must be positive".into());
        }
        Ok(())
    }

    #[inline]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Combined byte budget of `output` and `error`.
    #[inline]
    pub fn budget(&self) -> usize {
        self.max_record_bytes.saturating_sub(self.safety_margin)
    }
}

/// Truncate both transcripts so that together they take at most `budget` bytes.
///
/// The output keeps its tail. The error keeps at least a quarter of the budget when both are large.
pub fn fit_within(record: &StatusRecord, budget: usize) -> StatusRecord {
    if record.output.len() + record.error.len() <= budget {
        return record.clone();
    }

    let error_cap = budget
        .saturating_sub(record.output.len())
        .max(budget / 4)
        .min(budget);
    let error = truncate_tail(&record.error, error_cap, ERROR_TRUNCATED_NOTICE);

    let output_cap = budget.saturating_sub(error.len());
    let output = truncate_tail(&record.output, output_cap, OUTPUT_TRUNCATED_NOTICE);

    StatusRecord {
        output: output.into_owned(),
        error: error.into_owned(),
        finished: record.finished,
    }
}

/// Keep the last bytes of `text` and append `notice` so the result is at most `limit` bytes.
///
/// Text already within the limit is returned untouched. Cuts never split a UTF-8 sequence.
pub fn truncate_tail<'a>(text: &'a str, limit: usize, notice: &str) -> Cow<'a, str> {
    if text.len() <= limit {
        return Cow::Borrowed(text);
    }
    if notice.len() > limit {
        return Cow::Borrowed(&text[ceil_char_boundary(text, text.len() - limit)..]);
    }

    let keep = limit - notice.len();
    let start = ceil_char_boundary(text, text.len() - keep);
    let mut out = String::with_capacity(text.len() - start + notice.len());
    out.push_str(&text[start..]);
    out.push_str(notice);
    Cow::Owned(out)
}

/// First `limit` bytes of `text`, cut on a character boundary.
pub fn truncate_head(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
