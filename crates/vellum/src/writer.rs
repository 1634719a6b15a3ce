//! The span-aware output writer.
//!
//! String runs buffer into one growing string; a deferred span flushes
//! the buffer and takes its place in the span list. `result` joins
//! everything in insertion order, waiting on spans whose content is still
//! being computed by a `<parallel>` task.

use crate::cancel::CancelToken;
use crate::error::RenderError;
use tokio::sync::oneshot;

/// A fragment of output whose final text may arrive later.
#[derive(Debug)]
pub enum OutputSpan {
    /// Finished text.
    Literal(String),
    /// Text being produced by a parallel task.
    Pending(oneshot::Receiver<String>),
}

/// The sink render output accumulates into.
pub trait Writer {
    /// Append a string run.
    fn write_str(&mut self, s: &str);
    /// Append a deferred span.
    fn write_span(&mut self, span: OutputSpan);
}

/// The standard writer: buffered string runs plus a span list.
#[derive(Debug, Default)]
pub struct ListWriter {
    buffer: String,
    spans: Vec<OutputSpan>,
}

impl ListWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            self.spans
                .push(OutputSpan::Literal(std::mem::take(&mut self.buffer)));
        }
    }

    /// Join the output, blocking on pending spans in insertion order.
    ///
    /// Must be called from outside the async runtime (the engine entry
    /// points are synchronous). The token is checked before each wait.
    pub fn result(mut self, cancel: &CancelToken) -> Result<String, RenderError> {
        if self.spans.is_empty() {
            return Ok(self.buffer);
        }
        self.flush();
        let mut out = String::new();
        for span in self.spans {
            match span {
                OutputSpan::Literal(s) => out.push_str(&s),
                OutputSpan::Pending(rx) => {
                    cancel.check()?;
                    match rx.blocking_recv() {
                        Ok(s) => out.push_str(&s),
                        Err(_) => out.push_str("err: render task failed"),
                    }
                }
            }
        }
        Ok(out)
    }

    /// Join the output from inside a parallel task, awaiting pending
    /// spans instead of blocking a runtime worker.
    pub async fn result_async(mut self) -> String {
        self.flush();
        let mut out = String::new();
        if self.spans.is_empty() {
            return out;
        }
        for span in self.spans {
            match span {
                OutputSpan::Literal(s) => out.push_str(&s),
                OutputSpan::Pending(rx) => match rx.await {
                    Ok(s) => out.push_str(&s),
                    Err(_) => out.push_str("err: render task failed"),
                },
            }
        }
        out
    }
}

impl Writer for ListWriter {
    fn write_str(&mut self, s: &str) {
        self.buffer.push_str(s);
    }

    fn write_span(&mut self, span: OutputSpan) {
        self.flush();
        self.spans.push(span);
    }
}
