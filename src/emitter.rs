//! Line-delimited JSON output of assembled deltas.

use crate::delta::Delta;
use std::io::{self, Write};

/// Writes each delta as a single JSON line, flushed synchronously.
///
/// Flushing per write keeps the ordering between successive deltas equal to
/// frame arrival order and lets the downstream pipe consumer see each
/// document immediately. Write failures are fatal to the process, so they
/// propagate instead of being retried.
pub struct Emitter<W> {
    out: W,
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn emit(&mut self, delta: &Delta) -> io::Result<()> {
        let line = serde_json::to_string(delta)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::assemble;
    use crate::test_utils::TEST_MAC;
    use crate::transform::{FieldValue, PathValue};

    fn delta() -> Delta {
        assemble(
            TEST_MAC,
            vec![PathValue {
                path: "electrical.batteries.house.voltage".to_string(),
                value: FieldValue::Number(12.6),
            }],
        )
    }

    #[test]
    fn test_emit_writes_one_line_per_delta() {
        let mut emitter = Emitter::new(Vec::new());
        emitter.emit(&delta()).unwrap();
        emitter.emit(&delta()).unwrap();

        let out = String::from_utf8(emitter.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 2);
        for line in out.lines() {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed["updates"][0]["source"]["label"], "Victron");
        }
    }

    #[test]
    fn test_emit_flushes_every_write() {
        struct CountingWriter {
            flushes: usize,
        }

        impl Write for CountingWriter {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                self.flushes += 1;
                Ok(())
            }
        }

        let mut emitter = Emitter::new(CountingWriter { flushes: 0 });
        emitter.emit(&delta()).unwrap();
        emitter.emit(&delta()).unwrap();
        assert_eq!(emitter.into_inner().flushes, 2);
    }

    #[test]
    fn test_emit_propagates_write_failure() {
        struct FailingWriter;

        impl Write for FailingWriter {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink gone"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut emitter = Emitter::new(FailingWriter);
        let err = emitter.emit(&delta()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
