//! Streams shell-script work items out of a batch file, splitting on the
//! sentinel line `#####--END`. Not an `Iterator` on purpose: a single
//! malformed line has to surface as an `io::Result::Err` for the item being
//! accumulated, not as an `Iterator::next` panic.

use std::io::{self, BufRead};

/// Separator line, as written in the batch file (without its trailing
/// newline — `BufRead::read_line` lines are compared after trimming theirs).
pub const SEPARATOR: &str = "#####--END";

/// Matches the reference implementation's line-length cap.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024 * 1024;

pub struct BatchReader<R> {
    reader: R,
    max_line_len: usize,
    line_buf: String,
}

impl<R: BufRead> BatchReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_line_len(reader, DEFAULT_MAX_LINE_LEN)
    }

    pub fn with_max_line_len(reader: R, max_line_len: usize) -> Self {
        Self {
            reader,
            max_line_len,
            line_buf: String::new(),
        }
    }

    /// Returns the next work item (script body, sentinel stripped), or
    /// `None` once the stream is exhausted. Back-to-back sentinels and a
    /// leading sentinel both yield empty items, which are silently skipped.
    pub fn next_item(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut item = Vec::new();

        loop {
            self.line_buf.clear();
            let n = self.reader.read_line(&mut self.line_buf)?;
            if n == 0 {
                return Ok(if item.is_empty() { None } else { Some(item) });
            }

            if line_overflow(&self.line_buf, self.max_line_len) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line length exceeds {} bytes", self.max_line_len),
                ));
            }

            if self.line_buf.trim_end_matches(['\n', '\r']) == SEPARATOR {
                if item.is_empty() {
                    continue;
                }
                return Ok(Some(item));
            }

            item.extend_from_slice(self.line_buf.as_bytes());
        }
    }
}

fn line_overflow(line: &str, max_line_len: usize) -> bool {
    line.len() > max_line_len || (line.len() == max_line_len && !line.ends_with('\n'))
}
