//! Byte-to-line decoding.

use std::io::BufRead;

/// Lazily splits a byte stream into lines.
///
/// Lines end at `\n`. Each line is decoded as UTF-8 with every invalid
/// sequence replaced by U+FFFD, then stripped of trailing whitespace. A final
/// line without `\n` is still produced.
///
/// The reader is single-pass. [`consumed`](Self::consumed) reports how many
/// bytes the produced lines covered, which is what the tailer commits.
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
    consumed: u64,
    error: Option<std::io::Error>,
    finished: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            consumed: 0,
            error: None,
            finished: false,
        }
    }

    /// Bytes covered by the lines produced so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// The I/O error that ended the sequence early, if any.
    pub fn take_error(&mut self) -> Option<std::io::Error> {
        self.error.take()
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.finished = true;
                None
            }
            Ok(n) => {
                self.consumed += n as u64;
                Some(decode_line(&self.buf))
            }
            Err(e) => {
                self.error = Some(e);
                self.finished = true;
                None
            }
        }
    }
}

/// Decode one raw line.
pub fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end().to_owned()
}
