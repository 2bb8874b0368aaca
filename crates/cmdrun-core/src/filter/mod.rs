//! Line-oriented noise filter for command transcripts.
//!
//! Commands print progress bars and, through backend debug logging, multi-line query blocks whose
//! continuation lines are indented. [`LineFilter`] drops both while keeping the rest of the
//! transcript verbatim. It carries the unterminated tail of every chunk over to the next call, so
//! the result does not depend on how the text was split into chunks.
use std::sync::LazyLock;

use regex::Regex;

mod stream;
pub use stream::{CommandIo, FilteredStream, FlushPolicy, StreamSink};

/// Carriage-return driven progress output (`\r 42%|####  |`, `\rDownloading ...`) and `| NN%` bars.
static PROGRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\r.*\|.*\|.*%|\r.*downloading|\r.*progress|\|\s*\d+%)")
        .expect("invalid progress pattern")
});

/// Lines opening a suppressed block once leading whitespace is stripped.
static BLOCK_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(SELECT|INSERT|UPDATE|DELETE|FROM|WHERE|ORDER BY|LIMIT|Status for)\b")
        .expect("invalid block opener pattern")
});

/// Stateful filter over a text stream.
#[derive(Debug, Default, Clone)]
pub struct LineFilter {
    /// Unterminated line carried over from previous chunks.
    carry: String,
    /// Inside a suppressed block: indented lines are continuations.
    in_block: bool,
}

impl LineFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and append every kept complete line to `kept`.
    pub fn push(&mut self, chunk: &str, kept: &mut String) {
        if !chunk.contains('\n') {
            self.carry.push_str(chunk);
            return;
        }
        self.carry.push_str(chunk);

        let Some(last_newline) = self.carry.rfind('\n') else {
            return;
        };
        let rest = self.carry.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.carry, rest);

        for line in complete.split_inclusive('\n') {
            if self.accept(line) {
                kept.push_str(line);
            }
        }
    }

    /// Run the carried, unterminated line through the rules (end of stream).
    pub fn finish(&mut self, kept: &mut String) {
        if self.carry.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.carry);
        if self.accept(&line) {
            kept.push_str(&line);
        }
    }

    /// Whether a suppressed block is currently open.
    #[inline]
    pub fn in_block(&self) -> bool {
        self.in_block
    }

    /// Bytes waiting for a newline.
    #[inline]
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    fn accept(&mut self, line: &str) -> bool {
        if PROGRESS_LINE.is_match(line) {
            return false;
        }
        if self.in_block {
            if line.starts_with(' ') || line.starts_with('\t') {
                return false;
            }
            self.in_block = false;
        }
        if BLOCK_OPENER.is_match(line.trim_start()) {
            self.in_block = true;
            return false;
        }
        true
    }
}

/// Filter a complete text in one go.
pub fn filter_text(text: &str) -> String {
    let mut filter = LineFilter::new();
    let mut kept = String::with_capacity(text.len());
    filter.push(text, &mut kept);
    filter.finish(&mut kept);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = concat!(
        "Starting the simple test command...\n",
        "SELECT \"auth_user\".\"id\"\n",
        "    FROM \"auth_user\"\n",
        "\tWHERE \"auth_user\".\"username\" = 'admin'\n",
        "Doing some work...\n",
        "\rTraining: |#####     | 45%\n",
        "Downloading model weights\n",
        "\rDownloading model weights\n",
        "UPDATE \"app_item\" SET \"x\" = 1\n",
        "    WHERE \"id\" = 2\n",
        "insert into log values (1)\n",
        "Test command finished successfully!\n",
    );

    const EXPECTED: &str = concat!(
        "Starting the simple test command...\n",
        "Doing some work...\n",
        "Downloading model weights\n",
        "Test command finished successfully!\n",
    );

    #[test]
    fn drops_blocks_and_progress() {
        assert_eq!(filter_text(TRANSCRIPT), EXPECTED);
    }

    #[test]
    fn result_is_independent_of_chunk_boundaries() {
        let bytes = TRANSCRIPT.as_bytes();
        for size in 1..=bytes.len() {
            let mut filter = LineFilter::new();
            let mut kept = String::new();
            let mut start = 0;
            while start < bytes.len() {
                let mut end = (start + size).min(bytes.len());
                while !TRANSCRIPT.is_char_boundary(end) {
                    end += 1;
                }
                filter.push(&TRANSCRIPT[start..end], &mut kept);
                start = end;
            }
            filter.finish(&mut kept);
            assert_eq!(kept, EXPECTED, "chunk size {size}");
        }
    }

    #[test]
    fn uneven_chunks_match_whole_text() {
        let cuts = [3, 17, 18, 40, 41, 99, 150, 151, 200];
        let mut filter = LineFilter::new();
        let mut kept = String::new();
        let mut start = 0;
        for cut in cuts {
            let cut = cut.min(TRANSCRIPT.len());
            filter.push(&TRANSCRIPT[start..cut], &mut kept);
            start = cut;
        }
        filter.push(&TRANSCRIPT[start..], &mut kept);
        filter.finish(&mut kept);
        assert_eq!(kept, EXPECTED);
    }

    #[test]
    fn block_ends_exactly_at_first_unindented_line() {
        let text = "SELECT 1\n  a\n\tb\n    c\nafter\n  indented but kept\n";
        assert_eq!(filter_text(text), "after\n  indented but kept\n");
    }

    #[test]
    fn unindented_line_can_open_next_block() {
        let text = "SELECT 1\n  x\nDELETE FROM t\n  y\nkept\n";
        assert_eq!(filter_text(text), "kept\n");
    }

    #[test]
    fn keywords_are_case_insensitive_and_whole_words() {
        assert_eq!(filter_text("select 1\n"), "");
        assert_eq!(filter_text("  Order By name\n"), "");
        assert_eq!(filter_text("status for 42: {}\n"), "");
        assert_eq!(filter_text("Selection done\n"), "Selection done\n");
        assert_eq!(filter_text("Limits applied\n"), "Limits applied\n");
    }

    #[test]
    fn block_state_survives_chunk_split_inside_continuation() {
        let mut filter = LineFilter::new();
        let mut kept = String::new();
        filter.push("SELECT *\n   ", &mut kept);
        assert!(filter.in_block());
        filter.push("FROM t\nok", &mut kept);
        assert_eq!(filter.pending(), 2);
        filter.push("\n", &mut kept);
        assert_eq!(kept, "ok\n");
        assert!(!filter.in_block());
    }

    #[test]
    fn empty_line_closes_block_and_is_kept() {
        assert_eq!(filter_text("SELECT 1\n\nnext\n"), "\nnext\n");
    }

    #[test]
    fn trailing_partial_line_is_filtered_on_finish() {
        assert_eq!(filter_text("done"), "done");
        assert_eq!(filter_text("SELECT 1"), "");
        assert_eq!(filter_text("ok\n\r|#   | 10%"), "ok\n");
    }

    #[test]
    fn percentage_bar_without_carriage_return_is_dropped() {
        assert_eq!(filter_text("Epoch 1 | 100%\nloss 0.1\n"), "loss 0.1\n");
        assert_eq!(filter_text("Progress: 5 seconds elapsed\n"), "Progress: 5 seconds elapsed\n");
    }
}
