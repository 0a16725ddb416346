//! Directional codecs driven by the pump
//!
//! A [`Codec`] is the opaque transform engine: the pump hands it one slice of
//! input and one slice of output per call and learns how much of each was
//! used. The bundled [`Deflate`] and [`Inflate`] codecs wrap `flate2`'s raw
//! zlib streams and charge their working state to an [`Allocator`].

use crate::arena::{Allocator, Block};
use crate::error::{DataError, PumpError, Result};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use std::fmt;
use tracing::debug;

/// Working state charged by a deflate stream (window, hash chains, pending buffer)
pub const DEFLATE_STATE_BYTES: usize = (1 << 17) + (1 << 17) + 6 * 1024;

/// Base state charged by an inflate stream, excluding its history window
pub const INFLATE_STATE_BYTES: usize = 7 * 1024 + 128;

/// History window an inflate stream reserves on first use
pub const INFLATE_WINDOW_BYTES: usize = 1 << 15;

/// Which way a session transforms bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Compress,
    Decompress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Compress => f.write_str("compress"),
            Direction::Decompress => f.write_str("decompress"),
        }
    }
}

/// Compression quality level (1-9)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub const FASTEST: Quality = Quality(1);
    pub const BEST: Quality = Quality(9);

    /// Validate a quality level; anything outside 1-9 is a stream error
    pub fn new(level: u32) -> Result<Self> {
        if (Self::FASTEST.0..=Self::BEST.0).contains(&level) {
            Ok(Quality(level))
        } else {
            Err(PumpError::Stream(format!(
                "compression level {} outside 1-9",
                level
            )))
        }
    }

    pub fn level(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Quality {
    type Error = PumpError;

    fn try_from(level: u32) -> Result<Self> {
        Quality::new(level)
    }
}

/// Flush mode passed with every feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// More input will follow
    NoFlush,
    /// Source exhausted; emit everything and close the stream
    Finish,
}

/// Status reported by a successful codec call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecStatus {
    /// Progress was made (or may be made with more input/output)
    Ok,
    /// No progress was possible with the buffers given
    BufError,
    /// The logical end of the stream has been reached
    StreamEnd,
}

impl From<Status> for CodecStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => CodecStatus::Ok,
            Status::BufError => CodecStatus::BufError,
            Status::StreamEnd => CodecStatus::StreamEnd,
        }
    }
}

/// Outcome of one codec call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub consumed: usize,
    pub produced: usize,
    pub status: CodecStatus,
}

/// Failure reported by a codec call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecFault {
    /// Internal state is inconsistent; a driver bug, never a runtime condition
    Clobbered(String),
    /// Stream header asks for a preset dictionary
    NeedsDictionary(Option<u32>),
    /// Input is not a valid stream
    Malformed(String),
    /// The arena refused a state allocation
    OutOfMemory { requested: usize, available: usize },
}

impl From<CodecFault> for PumpError {
    /// A dictionary request is data the session cannot decode, so it is a
    /// data error like any malformed input.
    fn from(fault: CodecFault) -> Self {
        match fault {
            CodecFault::NeedsDictionary(id) => DataError::NeedsDictionary(id).into(),
            CodecFault::Malformed(msg) => DataError::Malformed(msg).into(),
            CodecFault::OutOfMemory {
                requested,
                available,
            } => PumpError::Mem {
                requested,
                available,
            },
            CodecFault::Clobbered(msg) => PumpError::Stream(msg),
        }
    }
}

/// Transform engine consumed by a codec session
pub trait Codec {
    fn direction(&self) -> Direction;

    /// Consume from `input` and produce into `output` under `flush`
    fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: Flush,
    ) -> std::result::Result<Step, CodecFault>;

    /// Release the codec state and every arena block it holds
    ///
    /// A session calls this exactly once. The bundled codecs also call it
    /// on drop, where it is a no-op after the first time.
    fn end(&mut self);
}

fn reserve(arena: &dyn Allocator, size: usize) -> std::result::Result<Block, CodecFault> {
    arena.allocate(size).ok_or_else(|| CodecFault::OutOfMemory {
        requested: size,
        available: arena.available(),
    })
}

/// zlib-format compressor
pub struct Deflate<'a> {
    arena: &'a dyn Allocator,
    stream: Option<Compress>,
    state: Option<Block>,
}

impl<'a> Deflate<'a> {
    /// Allocate a deflate stream at `quality`, charging its state to `arena`
    pub fn new(quality: Quality, arena: &'a dyn Allocator) -> Result<Self> {
        let state = reserve(arena, DEFLATE_STATE_BYTES)?;
        debug!(level = quality.level(), "deflate stream allocated");
        Ok(Self {
            arena,
            stream: Some(Compress::new(Compression::new(quality.level()), true)),
            state: Some(state),
        })
    }
}

impl Codec for Deflate<'_> {
    fn direction(&self) -> Direction {
        Direction::Compress
    }

    fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: Flush,
    ) -> std::result::Result<Step, CodecFault> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(CodecFault::Clobbered("deflate stream already ended".into()));
        };
        let (in_before, out_before) = (stream.total_in(), stream.total_out());
        let mode = match flush {
            Flush::NoFlush => FlushCompress::None,
            Flush::Finish => FlushCompress::Finish,
        };
        let status = stream
            .compress(input, output, mode)
            .map_err(|e| CodecFault::Clobbered(e.to_string()))?;
        Ok(Step {
            consumed: (stream.total_in() - in_before) as usize,
            produced: (stream.total_out() - out_before) as usize,
            status: status.into(),
        })
    }

    fn end(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(
                total_in = stream.total_in(),
                total_out = stream.total_out(),
                "deflate stream ended"
            );
        }
        if let Some(block) = self.state.take() {
            self.arena.free(block);
        }
    }
}

impl Drop for Deflate<'_> {
    fn drop(&mut self) {
        self.end();
    }
}

/// zlib-format decompressor
pub struct Inflate<'a> {
    arena: &'a dyn Allocator,
    stream: Option<Decompress>,
    state: Option<Block>,
    window: Option<Block>,
}

impl<'a> Inflate<'a> {
    /// Allocate an inflate stream, charging its base state to `arena`
    ///
    /// The history window is charged on the first call that has input.
    pub fn new(arena: &'a dyn Allocator) -> Result<Self> {
        let state = reserve(arena, INFLATE_STATE_BYTES)?;
        debug!("inflate stream allocated");
        Ok(Self {
            arena,
            stream: Some(Decompress::new(true)),
            state: Some(state),
            window: None,
        })
    }
}

impl Codec for Inflate<'_> {
    fn direction(&self) -> Direction {
        Direction::Decompress
    }

    fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        _flush: Flush,
    ) -> std::result::Result<Step, CodecFault> {
        if self.window.is_none() && !input.is_empty() {
            self.window = Some(reserve(self.arena, INFLATE_WINDOW_BYTES)?);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(CodecFault::Clobbered("inflate stream already ended".into()));
        };
        let (in_before, out_before) = (stream.total_in(), stream.total_out());
        let status = stream
            .decompress(input, output, FlushDecompress::None)
            .map_err(|e| match e.needs_dictionary() {
                Some(id) => CodecFault::NeedsDictionary(Some(id)),
                None => CodecFault::Malformed(e.to_string()),
            })?;
        Ok(Step {
            consumed: (stream.total_in() - in_before) as usize,
            produced: (stream.total_out() - out_before) as usize,
            status: status.into(),
        })
    }

    fn end(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(
                total_in = stream.total_in(),
                total_out = stream.total_out(),
                "inflate stream ended"
            );
        }
        for block in [self.state.take(), self.window.take()].into_iter().flatten() {
            self.arena.free(block);
        }
    }
}

impl Drop for Inflate<'_> {
    fn drop(&mut self) {
        self.end();
    }
}
