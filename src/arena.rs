//! Bounded arena that codecs charge their working state against
//!
//! The arena is created once at process start with a fixed capacity and
//! alignment, then passed by reference into every codec session. Codecs ask
//! it for a [`Block`] before they grow their state and hand the block back
//! when the session is finalized, so the worst-case memory of a run is known
//! up front. Exhaustion is an ordinary `None`, never a process abort.

use std::cell::Cell;
use tracing::{trace, warn};

/// Default arena capacity (16 MiB)
pub const DEFAULT_ARENA_CAPACITY: usize = 16 * 1024 * 1024;

/// Default allocation alignment
pub const DEFAULT_ARENA_ALIGNMENT: usize = 16;

/// Capability to reserve and release bounded memory
pub trait Allocator {
    /// Reserve `size` bytes, or `None` if the arena cannot hold them
    fn allocate(&self, size: usize) -> Option<Block>;

    /// Return a block obtained from [`Allocator::allocate`]
    fn free(&self, block: Block);

    /// Bytes that could still be handed out
    fn available(&self) -> usize;
}

/// A live reservation; must be handed back through [`Allocator::free`]
#[derive(Debug, PartialEq, Eq)]
#[must_use = "blocks must be returned to the arena they came from"]
pub struct Block {
    size: usize,
}

impl Block {
    /// Reserved size after alignment rounding
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Fixed-capacity arena with slot-aligned accounting
#[derive(Debug)]
pub struct Arena {
    capacity: usize,
    alignment: usize,
    in_use: Cell<usize>,
    peak: Cell<usize>,
    outstanding: Cell<usize>,
}

impl Arena {
    /// Create an arena of `capacity` bytes handing out multiples of `alignment`
    ///
    /// An alignment of zero is treated as one.
    pub fn new(capacity: usize, alignment: usize) -> Self {
        Self {
            capacity,
            alignment: alignment.max(1),
            in_use: Cell::new(0),
            peak: Cell::new(0),
            outstanding: Cell::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently reserved
    pub fn in_use(&self) -> usize {
        self.in_use.get()
    }

    /// Highest reservation level seen since creation
    pub fn peak(&self) -> usize {
        self.peak.get()
    }

    /// Number of blocks not yet freed
    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }

    fn round_up(&self, size: usize) -> Option<usize> {
        let rem = size % self.alignment;
        if rem == 0 {
            Some(size)
        } else {
            size.checked_add(self.alignment - rem)
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_CAPACITY, DEFAULT_ARENA_ALIGNMENT)
    }
}

impl Allocator for Arena {
    fn allocate(&self, size: usize) -> Option<Block> {
        let size = self.round_up(size)?;
        let used = self.in_use.get();
        let next = used.checked_add(size).filter(|&n| n <= self.capacity)?;

        self.in_use.set(next);
        self.peak.set(self.peak.get().max(next));
        self.outstanding.set(self.outstanding.get() + 1);
        trace!(size, in_use = next, "arena allocate");
        Some(Block { size })
    }

    fn free(&self, block: Block) {
        let used = self.in_use.get();
        // A block larger than what is reserved came from another arena.
        assert!(block.size <= used, "block freed to the wrong arena");
        self.in_use.set(used - block.size);
        self.outstanding.set(self.outstanding.get() - 1);
        trace!(size = block.size, in_use = used - block.size, "arena free");
    }

    fn available(&self) -> usize {
        self.capacity - self.in_use.get()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if self.outstanding.get() != 0 {
            warn!(
                blocks = self.outstanding.get(),
                bytes = self.in_use.get(),
                "arena dropped with live blocks"
            );
        }
    }
}
