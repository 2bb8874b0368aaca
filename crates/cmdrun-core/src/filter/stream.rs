use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use cmdrun_model::{CacheKey, StreamKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::LineFilter;
use crate::{metrics::MetricsBackend, store::StatusStore};

/// When a stream pushes its transcript into the status store.
///
/// A flush happens on the first kept line, then whenever `threshold_bytes` new bytes accumulated,
/// or `interval_ms` passed since the previous flush and there is something new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushPolicy {
    pub threshold_bytes: usize,
    pub interval_ms: u64,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            threshold_bytes: 1000,
            interval_ms: 2000,
        }
    }
}

impl FlushPolicy {
    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Where a stream flushes to: one transcript field of one job's record.
#[derive(Clone)]
pub struct StreamSink {
    pub store: StatusStore,
    pub key: CacheKey,
    pub metrics: Arc<dyn MetricsBackend>,
}

/// One output stream of a running operation.
///
/// Filters every write through a [`LineFilter`], keeps the whole filtered transcript in memory and
/// throttles flushes into the status store. A failing flush is logged and turns further flushes off
/// for this stream; writes keep working and the transcript is still handed over at the end.
pub struct FilteredStream {
    kind: StreamKind,
    filter: LineFilter,
    transcript: String,
    sink: Option<StreamSink>,
    policy: FlushPolicy,
    flushed_len: usize,
    last_flush: Option<Instant>,
    flush_disabled: bool,
}

impl FilteredStream {
    /// Stream that only accumulates, without a store behind it.
    pub fn detached(kind: StreamKind) -> Self {
        Self::build(kind, None, FlushPolicy::default())
    }

    /// Stream flushing into `sink`.
    pub fn bound(kind: StreamKind, sink: StreamSink, policy: FlushPolicy) -> Self {
        Self::build(kind, Some(sink), policy)
    }

    fn build(kind: StreamKind, sink: Option<StreamSink>, policy: FlushPolicy) -> Self {
        Self {
            kind,
            filter: LineFilter::new(),
            transcript: String::new(),
            sink,
            policy,
            flushed_len: 0,
            last_flush: None,
            flush_disabled: false,
        }
    }

    pub fn write(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.filter.push(chunk, &mut self.transcript);
        if self.flush_due() {
            self.flush();
        }
    }

    /// Filtered text so far (complete lines only).
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn flushes_disabled(&self) -> bool {
        self.flush_disabled
    }

    /// Close the stream and return the full transcript, trailing partial line included.
    pub fn finish(mut self) -> String {
        self.filter.finish(&mut self.transcript);
        self.transcript
    }

    fn flush_due(&self) -> bool {
        if self.flush_disabled || self.sink.is_none() {
            return false;
        }
        let fresh = self.transcript.len() - self.flushed_len;
        if fresh == 0 {
            return false;
        }
        match self.last_flush {
            None => true,
            Some(at) => fresh >= self.policy.threshold_bytes || at.elapsed() >= self.policy.interval(),
        }
    }

    fn flush(&mut self) {
        let Some(sink) = &self.sink else {
            return;
        };
        match sink
            .store
            .update_transcript(&sink.key, self.kind, &self.transcript)
        {
            Ok(()) => {
                trace!(
                    target: "cmdrun.filter",
                    key = %sink.key,
                    stream = self.kind.as_str(),
                    bytes = self.transcript.len(),
                    "transcript flushed"
                );
                self.flushed_len = self.transcript.len();
                self.last_flush = Some(Instant::now());
            }
            Err(e) => {
                warn!(
                    target: "cmdrun.filter",
                    key = %sink.key,
                    stream = self.kind.as_str(),
                    error = %e,
                    "flush failed; live updates disabled for this stream"
                );
                sink.metrics.record_store_error(e.kind());
                self.flush_disabled = true;
            }
        }
    }
}

impl fmt::Write for FilteredStream {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}

/// Output sinks handed to an operation: everything it prints goes through these,
/// never through the process-wide standard streams.
pub struct CommandIo {
    stdout: FilteredStream,
    stderr: FilteredStream,
}

impl CommandIo {
    pub fn new(stdout: FilteredStream, stderr: FilteredStream) -> Self {
        Self { stdout, stderr }
    }

    /// Sinks that only accumulate.
    pub fn detached() -> Self {
        Self::new(
            FilteredStream::detached(StreamKind::Stdout),
            FilteredStream::detached(StreamKind::Stderr),
        )
    }

    /// Sinks flushing into the record stored under `key`.
    pub fn bound(
        store: &StatusStore,
        key: &CacheKey,
        policy: FlushPolicy,
        metrics: Arc<dyn MetricsBackend>,
    ) -> Self {
        let sink = StreamSink {
            store: store.clone(),
            key: key.clone(),
            metrics,
        };
        debug!(target: "cmdrun.filter", %key, "output streams bound");
        Self::new(
            FilteredStream::bound(StreamKind::Stdout, sink.clone(), policy),
            FilteredStream::bound(StreamKind::Stderr, sink, policy),
        )
    }

    pub fn stdout(&mut self) -> &mut FilteredStream {
        &mut self.stdout
    }

    pub fn stderr(&mut self) -> &mut FilteredStream {
        &mut self.stderr
    }

    /// Write one line to stdout, newline appended.
    pub fn outln(&mut self, line: impl AsRef<str>) {
        self.stdout.write(line.as_ref());
        self.stdout.write("\n");
    }

    /// Write one line to stderr, newline appended.
    pub fn errln(&mut self, line: impl AsRef<str>) {
        self.stderr.write(line.as_ref());
        self.stderr.write("\n");
    }

    /// Close both streams: `(output, error)`.
    pub fn into_transcripts(self) -> (String, String) {
        (self.stdout.finish(), self.stderr.finish())
    }
}
