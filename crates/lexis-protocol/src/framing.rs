//! Newline framing over blocking byte streams.
//!
//! A frame is one line of UTF-8 JSON terminated by `\n` (an optional `\r`
//! before it is dropped). Lines longer than the configured limit are never
//! buffered whole: the reader discards bytes up to the next newline and
//! reports [`Frame::Oversized`] so the connection can answer and carry on.

use std::io::{BufRead, BufReader, ErrorKind, Read, Write};

use serde::Serialize;

use crate::error::ProtocolError;

#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    Oversized { discarded: usize },
}

pub struct FrameReader<R> {
    inner: BufReader<R>,
    max_bytes: usize,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, max_bytes: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            max_bytes,
        }
    }

    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Next non-blank frame, or `None` on clean end of stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        loop {
            match self.read_line()? {
                None => return Ok(None),
                Some(Frame::Line(line)) if line.trim().is_empty() => continue,
                Some(frame) => return Ok(Some(frame)),
            }
        }
    }

    fn read_line(&mut self) -> Result<Option<Frame>, ProtocolError> {
        let mut buf: Vec<u8> = Vec::new();
        let mut oversized = false;
        let mut discarded = 0usize;
        let mut saw_any = false;

        loop {
            let (used, done) = {
                let available = match self.inner.fill_buf() {
                    Ok(bytes) => bytes,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };
                if available.is_empty() {
                    // EOF: a partial trailing line still counts as a frame.
                    if !saw_any {
                        return Ok(None);
                    }
                    break;
                }
                saw_any = true;
                let (chunk, used, done) = match available.iter().position(|b| *b == b'\n') {
                    Some(i) => (&available[..i], i + 1, true),
                    None => (available, available.len(), false),
                };
                if oversized {
                    discarded += chunk.len();
                } else if buf.len() + chunk.len() > self.max_bytes {
                    oversized = true;
                    discarded = buf.len() + chunk.len();
                    buf = Vec::new();
                } else {
                    buf.extend_from_slice(chunk);
                }
                (used, done)
            };
            self.inner.consume(used);
            if done {
                break;
            }
        }

        if oversized {
            return Ok(Some(Frame::Oversized { discarded }));
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        String::from_utf8(buf)
            .map(|s| Some(Frame::Line(s)))
            .map_err(|_| ProtocolError::InvalidUtf8)
    }
}

/// Serialise `frame` as one line and flush it.
///
/// Callers sharing a stream across threads must hold that stream's write
/// lock for the duration of this call.
pub fn write_frame<W: Write, T: Serialize>(out: &mut W, frame: &T) -> Result<(), ProtocolError> {
    let mut bytes = serde_json::to_vec(frame).map_err(ProtocolError::Encode)?;
    bytes.push(b'\n');
    out.write_all(&bytes)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    fn reader(input: &str, max: usize) -> FrameReader<Cursor<Vec<u8>>> {
        FrameReader::new(Cursor::new(input.as_bytes().to_vec()), max)
    }

    #[test]
    fn splits_lines_and_strips_cr() {
        let mut r = reader("{\"a\":1}\r\n{\"b\":2}\n", 1024);
        assert_eq!(r.next_frame().unwrap(), Some(Frame::Line("{\"a\":1}".into())));
        assert_eq!(r.next_frame().unwrap(), Some(Frame::Line("{\"b\":2}".into())));
        assert_eq!(r.next_frame().unwrap(), None);
    }

    #[test]
    fn skips_blank_lines() {
        let mut r = reader("\n\n   \n{}\n", 1024);
        assert_eq!(r.next_frame().unwrap(), Some(Frame::Line("{}".into())));
        assert_eq!(r.next_frame().unwrap(), None);
    }

    #[test]
    fn trailing_line_without_newline_is_a_frame() {
        let mut r = reader("{}", 1024);
        assert_eq!(r.next_frame().unwrap(), Some(Frame::Line("{}".into())));
        assert_eq!(r.next_frame().unwrap(), None);
    }

    #[test]
    fn oversized_line_is_discarded_and_stream_recovers() {
        let long = "x".repeat(100);
        let input = format!("{long}\n{{\"ok\":true}}\n");
        let mut r = reader(&input, 16);
        assert_matches!(r.next_frame().unwrap(), Some(Frame::Oversized { discarded }) if discarded == 100);
        assert_eq!(r.next_frame().unwrap(), Some(Frame::Line("{\"ok\":true}".into())));
    }

    #[test]
    fn exactly_at_limit_is_accepted() {
        let line = "y".repeat(16);
        let mut r = reader(&format!("{line}\n"), 16);
        assert_eq!(r.next_frame().unwrap(), Some(Frame::Line(line)));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let mut r = FrameReader::new(Cursor::new(vec![0xff, 0xfe, b'\n']), 64);
        assert_matches!(r.next_frame(), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn write_frame_emits_single_line() {
        let mut out = Vec::new();
        write_frame(&mut out, &serde_json::json!({"text": "line1\nline2"})).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
    }
}
