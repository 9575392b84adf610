//! Streaming console annotator.
//!
//! Wraps a log sink and consumes the raw byte stream of a subprocess's
//! combined output. Bytes are buffered until a line terminator (CR, LF, or
//! CRLF) completes a line; each complete line is classified and forwarded
//! unmodified, preceded by any markers it earned. The downstream renderer
//! turns markers into styling; the bytes themselves are never altered.

use crate::classify::{self, Marker};
use memchr::memchr2;
use std::io::{self, Write};

/// Downstream sink for annotated console output.
///
/// For every line the annotator forwards, `marker` is called zero or more
/// times followed by exactly one `data` call carrying the original line
/// bytes, terminator included.
pub trait LogSink {
    /// Receive a marker decorating the next `data` call's line.
    fn marker(&mut self, marker: Marker) -> io::Result<()>;

    /// Receive raw console bytes, unmodified.
    fn data(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Called exactly once when the annotated stream ends.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl<S: LogSink + ?Sized> LogSink for &mut S {
    fn marker(&mut self, marker: Marker) -> io::Result<()> {
        (**self).marker(marker)
    }

    fn data(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).data(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Marker-discarding sink over any writer; forwards bytes unchanged.
#[derive(Debug)]
pub struct PlainSink<W: Write> {
    inner: W,
}

impl<W: Write> PlainSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> LogSink for PlainSink<W> {
    fn marker(&mut self, _marker: Marker) -> io::Result<()> {
        Ok(())
    }

    fn data(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Line-buffering annotator over a [`LogSink`].
///
/// Keeps exactly one bit of classification state: whether the previous line
/// was empty. Decoding is UTF-8 with lossy substitution, so malformed
/// sequences never abort the stream; sink errors propagate to the caller.
pub struct LineAnnotator<S: LogSink> {
    sink: S,
    buf: Vec<u8>,
    prev_line_empty: bool,
    closed: bool,
}

impl<S: LogSink> LineAnnotator<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            buf: Vec::new(),
            prev_line_empty: false,
            closed: false,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Consume a chunk of raw output, forwarding any completed lines.
    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "annotator is closed",
            ));
        }
        self.buf.extend_from_slice(bytes);

        let buf = std::mem::take(&mut self.buf);
        let mut start = 0;
        let result = (|| -> io::Result<()> {
            while start < buf.len() {
                let Some(off) = memchr2(b'\r', b'\n', &buf[start..]) else {
                    break;
                };
                let term = start + off;
                let end = if buf[term] == b'\n' {
                    term + 1
                } else if term + 1 < buf.len() {
                    // CR followed by LF consumes both; a bare CR stands alone
                    if buf[term + 1] == b'\n' { term + 2 } else { term + 1 }
                } else {
                    // Lone CR at the buffer end may be half of a CRLF; hold
                    // it until the next chunk or close decides.
                    break;
                };
                self.on_line(&buf[start..end], term - start)?;
                start = end;
            }
            Ok(())
        })();
        self.buf = buf[start..].to_vec();
        result
    }

    /// Flush the trailing partial line, if any, and close the sink.
    ///
    /// End-of-stream acts as an implicit terminator. Closing twice is a
    /// no-op; the sink is closed exactly once.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let buf = std::mem::take(&mut self.buf);
        if !buf.is_empty() {
            // A held CR is a real terminator; anything else is an
            // unterminated final line.
            let content_len = if buf[buf.len() - 1] == b'\r' {
                buf.len() - 1
            } else {
                buf.len()
            };
            self.on_line(&buf, content_len)?;
        }
        self.sink.close()
    }

    fn on_line(&mut self, line: &[u8], content_len: usize) -> io::Result<()> {
        let text = String::from_utf8_lossy(&line[..content_len]);
        let classification = classify::classify(&text, self.prev_line_empty);
        for marker in classification.markers() {
            self.sink.marker(marker)?;
        }
        self.sink.data(line)?;
        self.prev_line_empty = text.is_empty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{BuildOutcome, Marker};
    use crate::testing::{SinkEvent, VecSink};
    use proptest::prelude::*;

    fn run(chunks: &[&[u8]]) -> VecSink {
        let mut annotator = LineAnnotator::new(VecSink::new());
        for chunk in chunks {
            annotator.write(chunk).unwrap();
        }
        annotator.close().unwrap();
        annotator.into_sink()
    }

    #[test]
    fn passthrough_is_byte_exact() {
        let sink = run(&[b"alpha\nbeta\r\ngamma\rdelta"]);
        assert_eq!(sink.bytes(), b"alpha\nbeta\r\ngamma\rdelta");
        assert!(sink.markers().is_empty());
    }

    #[test]
    fn crlf_split_across_chunks_is_one_line() {
        let sink = run(&[b"one\r", b"\ntwo\n"]);
        let lines: Vec<_> = sink
            .events()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Data(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![b"one\r\n".to_vec(), b"two\n".to_vec()]);
    }

    #[test]
    fn bare_cr_terminates_a_line() {
        let sink = run(&[b"one\rtwo\n"]);
        let lines: Vec<_> = sink
            .events()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Data(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![b"one\r".to_vec(), b"two\n".to_vec()]);
    }

    #[test]
    fn target_marker_after_empty_line() {
        let _lock = crate::classify::toggle_test_lock();
        let sink = run(&[b"setup\n\ncompile:\n"]);
        assert_eq!(sink.markers(), vec![Marker::TargetBoundary]);
        assert_eq!(sink.bytes(), b"setup\n\ncompile:\n");
    }

    #[test]
    fn no_target_marker_without_preceding_empty_line() {
        let sink = run(&[b"setup\ncompile:\n"]);
        assert!(sink.markers().is_empty());
    }

    #[test]
    fn outcome_markers_on_result_lines() {
        let sink = run(&[b"BUILD SUCCESSFUL in 2s\n"]);
        assert_eq!(
            sink.markers(),
            vec![Marker::Outcome(BuildOutcome::Success)]
        );

        let sink = run(&[b"BUILD FAILED\n"]);
        assert_eq!(
            sink.markers(),
            vec![Marker::Outcome(BuildOutcome::Failure)]
        );
    }

    #[test]
    fn close_flushes_unterminated_line() {
        let _lock = crate::classify::toggle_test_lock();
        let sink = run(&[b"\nlast:"]);
        assert_eq!(sink.bytes(), b"\nlast:");
        assert_eq!(sink.markers(), vec![Marker::TargetBoundary]);
    }

    #[test]
    fn held_cr_is_flushed_on_close() {
        let sink = run(&[b"tail\r"]);
        assert_eq!(sink.bytes(), b"tail\r");
    }

    #[test]
    fn close_twice_closes_sink_once() {
        let mut annotator = LineAnnotator::new(VecSink::new());
        annotator.write(b"x\n").unwrap();
        annotator.close().unwrap();
        annotator.close().unwrap();
        assert_eq!(annotator.sink().close_count(), 1);
    }

    #[test]
    fn write_after_close_is_an_error() {
        let mut annotator = LineAnnotator::new(VecSink::new());
        annotator.close().unwrap();
        assert!(annotator.write(b"late\n").is_err());
    }

    #[test]
    fn malformed_utf8_is_forwarded_and_classified_lossily() {
        let _lock = crate::classify::toggle_test_lock();
        let sink = run(&[b"\n\xffcompile:\n"]);
        // Bytes pass through untouched even though decoding substituted.
        assert_eq!(sink.bytes(), b"\n\xffcompile:\n");
        // The lossy text "\u{fffd}compile:" still ends with ':' and has no
        // space, so the target marker fires.
        assert_eq!(sink.markers(), vec![Marker::TargetBoundary]);
    }

    proptest! {
        #[test]
        fn roundtrip_reproduces_input_bytes(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            cut in any::<prop::sample::Index>(),
        ) {
            let split = cut.index(data.len() + 1);
            let mut annotator = LineAnnotator::new(VecSink::new());
            annotator.write(&data[..split]).unwrap();
            annotator.write(&data[split..]).unwrap();
            annotator.close().unwrap();
            prop_assert_eq!(annotator.sink().bytes(), &data[..]);
        }
    }
}
