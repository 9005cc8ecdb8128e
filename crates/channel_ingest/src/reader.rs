use std::io::{self, BufRead};

/// One physical line of the contact stream, newline and trailing `\r`
/// removed.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum RawLine {
    Bytes(Vec<u8>),
    /// The line exceeded the byte limit. Only its length was kept.
    TooLong { observed_bytes: usize },
}

/// Splits a buffered source into lines while holding at most
/// `max_line_bytes` of any single line in memory.
pub(crate) struct LineSplitter<R: BufRead> {
    source: R,
    max_line_bytes: usize,
    line: Vec<u8>,
    lines_read: usize,
    exhausted: bool,
}

impl<R: BufRead> LineSplitter<R> {
    pub(crate) fn new(source: R, max_line_bytes: usize) -> Self {
        Self {
            source,
            max_line_bytes,
            line: Vec::new(),
            lines_read: 0,
            exhausted: false,
        }
    }

    /// Number of lines returned so far, including oversized ones.
    pub(crate) fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Returns `Ok(None)` at end of input. After an error the splitter is
    /// exhausted and keeps returning `Ok(None)`.
    pub(crate) fn next_line(&mut self) -> io::Result<Option<RawLine>> {
        if self.exhausted {
            return Ok(None);
        }

        self.line.clear();
        let mut observed_bytes = 0usize;
        let mut too_long = false;

        loop {
            let chunk = match self.source.fill_buf() {
                Ok(chunk) => chunk,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.exhausted = true;
                    return Err(err);
                }
            };

            if chunk.is_empty() {
                self.exhausted = true;
                if observed_bytes == 0 {
                    return Ok(None);
                }
                break;
            }

            let newline = chunk.iter().position(|b| *b == b'\n');
            let content_len = newline.unwrap_or(chunk.len());
            observed_bytes = observed_bytes.saturating_add(content_len);

            if !too_long {
                if observed_bytes > self.max_line_bytes {
                    too_long = true;
                    self.line = Vec::new();
                } else {
                    self.line.extend_from_slice(&chunk[..content_len]);
                }
            }

            let consumed = content_len + usize::from(newline.is_some());
            self.source.consume(consumed);
            if newline.is_some() {
                break;
            }
        }

        self.lines_read += 1;
        if too_long {
            return Ok(Some(RawLine::TooLong { observed_bytes }));
        }
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        Ok(Some(RawLine::Bytes(std::mem::take(&mut self.line))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};

    fn split(input: &[u8], capacity: usize, max_line_bytes: usize) -> Vec<RawLine> {
        let source = BufReader::with_capacity(capacity, Cursor::new(input.to_vec()));
        let mut splitter = LineSplitter::new(source, max_line_bytes);
        let mut lines = Vec::new();
        while let Some(line) = splitter.next_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    fn bytes(text: &str) -> RawLine {
        RawLine::Bytes(text.as_bytes().to_vec())
    }

    #[test]
    fn blank_lines_and_unterminated_tail_are_lines() {
        assert_eq!(
            split(b"T:1\n\nM:a@b", 64, 64),
            vec![bytes("T:1"), bytes(""), bytes("M:a@b")]
        );
        assert_eq!(split(b"T:1\n", 64, 64), vec![bytes("T:1")]);
        assert!(split(b"", 64, 64).is_empty());
    }

    #[test]
    fn carriage_return_before_newline_is_dropped() {
        assert_eq!(
            split(b"T:1\r\nT:2\r", 64, 64),
            vec![bytes("T:1"), bytes("T:2")]
        );
    }

    #[test]
    fn lines_spanning_small_buffers_are_reassembled() {
        assert_eq!(
            split(b"T:12345M:a@b.com\nT:9\n", 3, 64),
            vec![bytes("T:12345M:a@b.com"), bytes("T:9")]
        );
    }

    #[test]
    fn limit_counts_line_content_only() {
        assert_eq!(
            split(b"T:123456\nT:1234567\nT:1\n", 4, 8),
            vec![
                bytes("T:123456"),
                RawLine::TooLong { observed_bytes: 9 },
                bytes("T:1"),
            ]
        );
    }

    struct Flaky {
        data: Cursor<Vec<u8>>,
        interrupted: bool,
        fail_at_end: bool,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::ErrorKind::Interrupted.into());
            }
            match self.data.read(buf)? {
                0 if self.fail_at_end => Err(io::Error::new(io::ErrorKind::TimedOut, "stalled")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn interrupted_reads_are_retried_and_other_errors_end_the_stream() {
        let source = BufReader::new(Flaky {
            data: Cursor::new(b"T:1\nT:2".to_vec()),
            interrupted: false,
            fail_at_end: true,
        });
        let mut splitter = LineSplitter::new(source, 64);

        assert_eq!(splitter.next_line().unwrap(), Some(bytes("T:1")));
        let err = splitter.next_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(splitter.lines_read(), 1);
        assert_eq!(splitter.next_line().unwrap(), None);
    }
}
