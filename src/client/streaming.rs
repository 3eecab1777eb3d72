// Line-framed event stream parsing for the daemon's streaming endpoints
//
// Model install, chat and generate all answer with newline-delimited JSON,
// optionally prefixed with "data:". They differ only in how completion is
// signalled, so the reader takes the completion check as a parameter.

use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::fmt;

use crate::errors::{ErrorKind, OadinError};

/// Prefix stripped from each line before JSON parsing
pub const FRAMING_MARKER: &str = "data:";

/// One callback invocation produced while reading a stream
#[derive(Debug)]
pub enum StreamEvent {
    /// A parsed document
    Data(Value),
    /// A line that failed to parse or lacked its completion field, or a
    /// transport failure mid-body
    Error(OadinError),
    /// Fired exactly once, after a completion document or end of body
    End,
}

/// Totals reported after a stream has been read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub data_events: usize,
    pub error_events: usize,
    /// True when reading stopped on a completion document
    pub completed: bool,
}

/// Install and generate streams: `status` is "success" or "error"
///
/// A document without a `status` field, or with a non-string one, is an error.
/// An explicit `null` status is neither terminal nor an error.
pub fn status_sentinel(document: &Value) -> Result<bool, OadinError> {
    match document.get("status") {
        Some(Value::String(status)) => Ok(status == "success" || status == "error"),
        Some(Value::Null) => Ok(false),
        Some(other) => Err(sentinel_error(format!(
            "`status` is not a string: {}",
            other
        ))),
        None => Err(sentinel_error("missing `status` field")),
    }
}

/// Chat streams: `finished` is boolean true
///
/// A missing `finished` field is not terminal; a non-boolean one is an error.
pub fn finished_flag(document: &Value) -> Result<bool, OadinError> {
    match document.get("finished") {
        None => Ok(false),
        Some(Value::Bool(finished)) => Ok(*finished),
        Some(other) => Err(sentinel_error(format!(
            "`finished` is not a boolean: {}",
            other
        ))),
    }
}

fn sentinel_error(detail: impl fmt::Display) -> OadinError {
    OadinError::new(
        ErrorKind::Parse,
        format!("Failed to parse stream data: {}", detail),
    )
}

/// Splits a byte stream into lines across chunk boundaries
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line, without its `\n` or `\r\n` terminator
    pub fn next_line(&mut self) -> Option<String> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        Some(decode_line(&line_bytes))
    }

    /// Whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

/// Parse one line: `None` for blank lines, otherwise the document or the parse failure
pub fn parse_line(line: &str) -> Option<Result<Value, OadinError>> {
    if line.trim().is_empty() {
        return None;
    }

    let raw = line.strip_prefix(FRAMING_MARKER).unwrap_or(line);
    Some(
        serde_json::from_str(raw.trim())
            .map_err(|e| OadinError::parse("Failed to parse stream data", e)),
    )
}

enum LineOutcome {
    Skipped,
    Continue,
    Complete,
}

fn dispatch_line<P, F>(
    line: &str,
    is_complete: &P,
    on_event: &mut F,
    summary: &mut StreamSummary,
) -> LineOutcome
where
    P: Fn(&Value) -> Result<bool, OadinError>,
    F: FnMut(StreamEvent),
{
    match parse_line(line) {
        None => LineOutcome::Skipped,
        Some(Ok(document)) => {
            let complete = is_complete(&document);
            summary.data_events += 1;
            on_event(StreamEvent::Data(document));
            match complete {
                Ok(true) => LineOutcome::Complete,
                Ok(false) => LineOutcome::Continue,
                Err(e) => {
                    tracing::debug!(
                        line = %line,
                        error = %e,
                        "Stream document failed completion check"
                    );
                    summary.error_events += 1;
                    on_event(StreamEvent::Error(e));
                    LineOutcome::Continue
                }
            }
        }
        Some(Err(e)) => {
            tracing::debug!(line = %line, error = %e, "Skipping malformed stream line");
            summary.error_events += 1;
            on_event(StreamEvent::Error(e));
            LineOutcome::Continue
        }
    }
}

/// Read a line-framed body to completion, one line at a time
///
/// Each well-formed line becomes `StreamEvent::Data`; malformed lines become
/// `StreamEvent::Error` and reading continues. When `is_complete` rejects a
/// document, its `Data` is followed by an `Error`. Reading stops after the
/// first document for which `is_complete` returns `Ok(true)`, or on a
/// transport failure. `StreamEvent::End` is always
/// emitted last, exactly once.
pub async fn read_event_stream<S, B, E, P, F>(
    stream: S,
    is_complete: P,
    mut on_event: F,
) -> StreamSummary
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
    P: Fn(&Value) -> Result<bool, OadinError>,
    F: FnMut(StreamEvent),
{
    futures::pin_mut!(stream);

    let mut summary = StreamSummary::default();
    let mut lines = LineBuffer::new();
    let mut interrupted = false;

    'read: while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                lines.push(bytes.as_ref());
                while let Some(line) = lines.next_line() {
                    if let LineOutcome::Complete =
                        dispatch_line(&line, &is_complete, &mut on_event, &mut summary)
                    {
                        summary.completed = true;
                        break 'read;
                    }
                }
            }
            Err(e) => {
                tracing::error!("Stream error: {}", e);
                summary.error_events += 1;
                on_event(StreamEvent::Error(OadinError::new(
                    ErrorKind::Transport,
                    format!("Stream interrupted: {}", e),
                )));
                interrupted = true;
                break 'read;
            }
        }
    }

    // A partial line left behind by a transport failure is discarded
    if !summary.completed && !interrupted {
        if let Some(line) = lines.finish() {
            if let LineOutcome::Complete =
                dispatch_line(&line, &is_complete, &mut on_event, &mut summary)
            {
                summary.completed = true;
            }
        }
    }

    on_event(StreamEvent::End);
    tracing::debug!(
        data = summary.data_events,
        errors = summary.error_events,
        completed = summary.completed,
        "Stream finished"
    );
    summary
}
