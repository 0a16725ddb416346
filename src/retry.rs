//! Interrupt-safe chunk transfers
//!
//! Reads and writes on the pump's source and destination go through these two
//! helpers. An interrupted call is retried in place; everything else surfaces
//! to the caller untouched.
//!
//! Retries are unbounded: a signal that interrupts every call keeps the pump
//! spinning. There is no cap or backoff.

use std::io::{self, ErrorKind, Read, Write};
use tracing::warn;

/// Read at most `buf.len()` bytes from `source`
///
/// Returns the number of bytes read; zero means the source is exhausted.
pub fn read_chunk<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                warn!("read interrupted, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Write all of `buf` to `dest`, accumulating short writes
///
/// A write that accepts zero bytes without an error cannot make progress and
/// is reported as [`ErrorKind::WriteZero`].
pub fn write_fully<W: Write + ?Sized>(dest: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match dest.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "destination accepted no bytes",
                ));
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                warn!(remaining = buf.len(), "write interrupted, retrying");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
