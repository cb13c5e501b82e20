//! Line splitting for child-process output.

use std::io::{self, Write};

/// `io::Write` adapter that hands complete lines to a callback.
///
/// Both `\r` and `\n` end a line, since ffmpeg redraws its stats line with
/// carriage returns. Empty lines are dropped. A trailing partial line is kept
/// until more bytes arrive or `finish` is called.
pub struct LineSplitter<F: FnMut(&str)> {
    buffer: Vec<u8>,
    on_line: F,
}

impl<F: FnMut(&str)> LineSplitter<F> {
    pub fn new(on_line: F) -> Self {
        Self {
            buffer: Vec::new(),
            on_line,
        }
    }

    /// Emit any buffered partial line.
    pub fn finish(&mut self) {
        let rest = std::mem::take(&mut self.buffer);
        self.emit(&rest);
    }

    fn emit(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(bytes);
        let line = line.trim_end();
        if !line.is_empty() {
            (self.on_line)(line);
        }
    }
}

impl<F: FnMut(&str)> Write for LineSplitter<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        for (i, &b) in buf.iter().enumerate() {
            if b == b'\n' || b == b'\r' {
                if self.buffer.is_empty() {
                    self.emit(&buf[start..i]);
                } else {
                    self.buffer.extend_from_slice(&buf[start..i]);
                    let line = std::mem::take(&mut self.buffer);
                    self.emit(&line);
                }
                start = i + 1;
            }
        }
        self.buffer.extend_from_slice(&buf[start..]);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(chunks: &[&[u8]]) -> Vec<String> {
        let mut lines = Vec::new();
        {
            let mut splitter = LineSplitter::new(|l: &str| lines.push(l.to_string()));
            for chunk in chunks {
                splitter.write_all(chunk).unwrap();
            }
            splitter.finish();
        }
        lines
    }

    #[test]
    fn splits_on_cr_and_lf() {
        let lines = collect(&[b"frame=1\rframe=2\r\nDone\n"]);
        assert_eq!(lines, vec!["frame=1", "frame=2", "Done"]);
    }

    #[test]
    fn joins_lines_split_across_writes() {
        let lines = collect(&[b"Wid", b"th: 19", b"20\nHei", b"ght: 1080"]);
        assert_eq!(lines, vec!["Width: 1920", "Height: 1080"]);
    }

    #[test]
    fn partial_line_waits_for_finish() {
        let mut lines = Vec::new();
        let mut splitter = LineSplitter::new(|l: &str| lines.push(l.to_string()));
        splitter.write_all(b"no newline yet").unwrap();
        splitter.finish();
        drop(splitter);
        assert_eq!(lines, vec!["no newline yet"]);
    }

    #[test]
    fn lossy_on_invalid_utf8() {
        let lines = collect(&[b"bad \xff byte\n"]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("bad "));
    }
}
