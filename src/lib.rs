//! # zpipe: chunked zlib compression pump
//!
//! `zpipe` drives a zlib codec between a byte source and a byte destination
//! using two fixed-size buffers. Memory use is constant regardless of stream
//! length, interrupted and short transfers are absorbed, and every codec
//! session is finalized exactly once, whether the run succeeds or fails.
//!
//! ## Features
//!
//! - **Bounded memory**: two chunk buffers plus a fixed arena for codec state
//! - **Interrupt safe**: `Interrupted` reads and writes are retried in place
//! - **Short writes**: partial writes are accumulated until the chunk is out
//! - **Strict termination**: truncated or corrupt input is a data error, never
//!   a silent success
//! - **Sandboxing**: optional seccomp filter installed before the first byte
//!   moves (`seccomp` feature)
//!
//! ## Quick Start
//!
//! ```no_run
//! use zpipe::{Arena, Pump, Quality};
//!
//! let arena = Arena::default();
//! let input = b"hello hello hello hello";
//!
//! let mut packed = Vec::new();
//! Pump::compress(Quality::new(6)?, &arena).run(&input[..], &mut packed)?;
//!
//! let mut unpacked = Vec::new();
//! Pump::decompress(&arena).run(&packed[..], &mut unpacked)?;
//! assert_eq!(unpacked, input);
//! # Ok::<(), zpipe::PumpError>(())
//! ```

pub mod arena;
pub mod codec;
pub mod error;
pub mod pump;
pub mod retry;
pub mod sandbox;
pub mod session;

pub use arena::{Allocator, Arena, Block, DEFAULT_ARENA_ALIGNMENT, DEFAULT_ARENA_CAPACITY};
pub use codec::{Codec, CodecFault, CodecStatus, Deflate, Direction, Flush, Inflate, Quality, Step};
pub use error::{DataError, PumpError, Result, ResultCode};
pub use pump::{compress, decompress, Pump, PumpReport, CHUNK};
pub use sandbox::{Sandbox, Unconfined};
pub use session::CodecSession;

#[cfg(all(
    feature = "seccomp",
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
pub use sandbox::SyscallFilter;
