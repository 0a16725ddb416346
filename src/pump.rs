//! Chunked stream pump
//!
//! Moves a source through a codec session into a destination one chunk at a
//! time. Memory stays constant regardless of stream length: two buffers of
//! the chunk size plus whatever the codec charged to the arena.
//!
//! Compression walks a two-state flush machine: every chunk is fed with
//! `NoFlush` until the source reads zero bytes, at which point one empty
//! `Finish` feed closes the stream. Decompression always feeds `NoFlush` and
//! stops when the codec reports the end of the stream; a source that runs dry
//! first is a truncated stream.

use crate::arena::Allocator;
use crate::codec::{Codec, CodecFault, Deflate, Direction, Flush, Inflate, Quality};
use crate::error::{DataError, PumpError, Result};
use crate::retry::{read_chunk, write_fully};
use crate::sandbox::{activate_or_abort, Sandbox, Unconfined};
use crate::session::CodecSession;
use crc32fast::Hasher as Crc32;
use std::io::{Read, Write};
use tracing::{debug, debug_span, trace};

/// Default chunk capacity C for both session buffers
pub const CHUNK: usize = 16384;

/// Summary of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpReport {
    /// Bytes read from the source
    pub bytes_in: u64,
    /// Bytes written to the destination
    pub bytes_out: u64,
    /// CRC-32 of the uncompressed side of the stream
    pub crc32: u32,
}

/// Byte and checksum accounting for one run
struct Tally {
    bytes_in: u64,
    bytes_out: u64,
    crc: Crc32,
}

impl Tally {
    fn new() -> Self {
        Self {
            bytes_in: 0,
            bytes_out: 0,
            crc: Crc32::new(),
        }
    }

    fn finalize(self) -> PumpReport {
        PumpReport {
            bytes_in: self.bytes_in,
            bytes_out: self.bytes_out,
            crc32: self.crc.finalize(),
        }
    }
}

/// Configured pump for one direction
pub struct Pump<'a> {
    direction: Direction,
    quality: Quality,
    chunk_size: usize,
    arena: &'a dyn Allocator,
    sandbox: &'a dyn Sandbox,
}

impl<'a> Pump<'a> {
    /// Pump that compresses at `quality`, charging codec state to `arena`
    pub fn compress(quality: Quality, arena: &'a dyn Allocator) -> Self {
        Self {
            direction: Direction::Compress,
            quality,
            chunk_size: CHUNK,
            arena,
            sandbox: &Unconfined,
        }
    }

    /// Pump that decompresses, charging codec state to `arena`
    pub fn decompress(arena: &'a dyn Allocator) -> Self {
        Self {
            direction: Direction::Decompress,
            quality: Quality::BEST,
            chunk_size: CHUNK,
            arena,
            sandbox: &Unconfined,
        }
    }

    /// Use buffers of `chunk_size` bytes instead of [`CHUNK`]
    ///
    /// A zero size is rejected when the pump runs.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sandbox activated once per run, before any I/O
    pub fn with_sandbox(mut self, sandbox: &'a dyn Sandbox) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Run the configured direction from `source` to `dest`
    pub fn run<R: Read, W: Write>(&self, source: R, dest: W) -> Result<PumpReport> {
        match self.direction {
            Direction::Compress => {
                let codec = Deflate::new(self.quality, self.arena)?;
                self.run_with(codec, source, dest)
            }
            Direction::Decompress => {
                let codec = Inflate::new(self.arena)?;
                self.run_with(codec, source, dest)
            }
        }
    }

    /// Run an already-initialized codec from `source` to `dest`
    ///
    /// The loop follows the codec's own direction. The codec is finalized
    /// before this returns, whatever the outcome.
    pub fn run_with<C, R, W>(&self, codec: C, mut source: R, mut dest: W) -> Result<PumpReport>
    where
        C: Codec,
        R: Read,
        W: Write,
    {
        let mut session = CodecSession::open(codec, self.chunk_size)?;
        let direction = session.direction();
        let _span = debug_span!("pump", %direction, chunk = self.chunk_size).entered();

        activate_or_abort(self.sandbox);

        let mut tally = Tally::new();
        match direction {
            Direction::Compress => deflate_loop(&mut session, &mut source, &mut dest, &mut tally)?,
            Direction::Decompress => inflate_loop(&mut session, &mut source, &mut dest, &mut tally)?,
        }
        session.finish();
        dest.flush().map_err(PumpError::Write)?;

        let report = tally.finalize();
        debug!(
            bytes_in = report.bytes_in,
            bytes_out = report.bytes_out,
            crc32 = report.crc32,
            "pump finished"
        );
        Ok(report)
    }
}

/// Compress `source` into `dest` with default chunking and no sandbox
pub fn compress<R: Read, W: Write>(
    source: R,
    dest: W,
    quality: Quality,
    arena: &dyn Allocator,
) -> Result<PumpReport> {
    Pump::compress(quality, arena).run(source, dest)
}

/// Decompress `source` into `dest` with default chunking and no sandbox
pub fn decompress<R: Read, W: Write>(
    source: R,
    dest: W,
    arena: &dyn Allocator,
) -> Result<PumpReport> {
    Pump::decompress(arena).run(source, dest)
}

fn fill<C: Codec, R: Read>(
    session: &mut CodecSession<C>,
    source: &mut R,
    tally: &mut Tally,
    checksum_input: bool,
) -> Result<usize> {
    let buf = session.input_mut();
    let n = read_chunk(source, buf).map_err(PumpError::Read)?;
    tally.bytes_in += n as u64;
    if checksum_input {
        tally.crc.update(&buf[..n]);
    }
    trace!(bytes = n, "chunk read");
    Ok(n)
}

fn deflate_loop<C: Codec, R: Read, W: Write>(
    session: &mut CodecSession<C>,
    source: &mut R,
    dest: &mut W,
    tally: &mut Tally,
) -> Result<()> {
    loop {
        let n = fill(session, source, tally, true)?;
        let flush = if n == 0 { Flush::Finish } else { Flush::NoFlush };
        session.feed(n, flush);

        drain(session, dest, tally, false)?;
        assert_eq!(session.avail_in(), 0, "deflate left fed input unconsumed");
        assert!(
            !session.stream_ended() || flush == Flush::Finish,
            "deflate ended the stream before finish"
        );

        if flush == Flush::Finish {
            break;
        }
    }
    assert!(
        session.stream_ended(),
        "deflate did not end the stream after finish"
    );
    Ok(())
}

fn inflate_loop<C: Codec, R: Read, W: Write>(
    session: &mut CodecSession<C>,
    source: &mut R,
    dest: &mut W,
    tally: &mut Tally,
) -> Result<()> {
    loop {
        let n = fill(session, source, tally, false)?;
        if n == 0 {
            debug!("source exhausted before end of stream");
            return Err(DataError::Truncated.into());
        }
        session.feed(n, Flush::NoFlush);

        drain(session, dest, tally, true)?;
        if session.stream_ended() {
            if session.avail_in() > 0 {
                debug!(ignored = session.avail_in(), "trailing bytes after end of stream");
            }
            return Ok(());
        }
        assert_eq!(session.avail_in(), 0, "inflate left fed input unconsumed");
    }
}

/// Drain the session into `dest` until the codec neither fills the output
/// buffer nor makes progress on pending input, or ends the stream
fn drain<C: Codec, W: Write>(
    session: &mut CodecSession<C>,
    dest: &mut W,
    tally: &mut Tally,
    checksum_output: bool,
) -> Result<()> {
    loop {
        let step = match session.drain() {
            Ok(step) => step,
            Err(CodecFault::Clobbered(msg)) => panic!("codec state clobbered: {msg}"),
            Err(fault) => return Err(fault.into()),
        };
        trace!(
            consumed = step.consumed,
            produced = step.produced,
            status = ?step.status,
            "drained"
        );

        let out = session.pending();
        if !out.is_empty() {
            write_fully(dest, out).map_err(PumpError::Write)?;
            tally.bytes_out += out.len() as u64;
            if checksum_output {
                tally.crc.update(out);
            }
        }

        if session.stream_ended() {
            return Ok(());
        }
        if session.avail_out() == 0 {
            continue;
        }
        let progressed = step.consumed > 0 || step.produced > 0;
        if session.avail_in() == 0 || !progressed {
            return Ok(());
        }
    }
}
