//! Deadline-bounded line reading
//!
//! The read is registered against the deadline with `timeout_at`; when the
//! deadline wins, bytes already pulled off the stream stay in `pending` and
//! the next call carries on from there.

use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::time::{Instant, timeout_at};

/// Outcome of a single read attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// A complete line, terminator stripped
    Line(String),
    /// Nothing complete arrived before the deadline; the stream is still open
    Idle,
    /// End of stream
    Closed,
}

/// Reads newline-terminated text from a child's output stream
pub struct LineReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    closed: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap an output stream
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
            closed: false,
        }
    }

    /// Read one line, waiting no later than `deadline`.
    ///
    /// A final unterminated line before end-of-stream is returned as a line;
    /// the call after that reports [`LineRead::Closed`].
    pub async fn read_line(&mut self, deadline: Instant) -> io::Result<LineRead> {
        if self.closed {
            return Ok(self.take_tail());
        }

        // read_until keeps whatever it appended to `pending` if the timeout
        // drops it mid-line.
        match timeout_at(deadline, self.reader.read_until(b'\n', &mut self.pending)).await {
            Err(_elapsed) => Ok(LineRead::Idle),
            Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => Ok(LineRead::Idle),
            Ok(Err(e)) => Err(e),
            Ok(Ok(0)) => {
                self.closed = true;
                Ok(self.take_tail())
            }
            Ok(Ok(_)) => {
                if self.pending.last() == Some(&b'\n') {
                    Ok(LineRead::Line(self.take_line()))
                } else {
                    // read_until only stops short of the delimiter at EOF
                    self.closed = true;
                    Ok(self.take_tail())
                }
            }
        }
    }

    /// The incomplete line buffered so far, if any
    pub fn partial(&self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }

    /// Whether end-of-stream has been seen
    pub fn is_closed(&self) -> bool {
        self.closed && self.pending.is_empty()
    }

    fn take_tail(&mut self) -> LineRead {
        if self.pending.is_empty() {
            LineRead::Closed
        } else {
            LineRead::Line(self.take_line())
        }
    }

    fn take_line(&mut self) -> String {
        let bytes = std::mem::take(&mut self.pending);
        let mut line = String::from_utf8_lossy(&bytes).into_owned();
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        line
    }
}
