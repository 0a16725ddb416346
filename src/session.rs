//! One directional codec run with its two fixed buffers

use crate::codec::{Codec, CodecFault, CodecStatus, Direction, Flush, Step};
use crate::error::{PumpError, Result};
use tracing::debug;

/// A codec plus the input and output buffers it is fed from and drained into
///
/// The session owns both buffers, so nothing the codec sees outlives a single
/// [`CodecSession::drain`] call. The codec is finalized exactly once: by
/// [`CodecSession::finish`] on success, or by `Drop` on any early return.
pub struct CodecSession<C: Codec> {
    codec: C,
    input: Box<[u8]>,
    output: Box<[u8]>,
    in_pos: usize,
    avail_in: usize,
    avail_out: usize,
    flush: Flush,
    last_status: Option<CodecStatus>,
    finalized: bool,
}

impl<C: Codec> CodecSession<C> {
    /// Open a session around `codec` with buffers of `capacity` bytes each
    ///
    /// A zero capacity is rejected; the codec is still finalized.
    pub fn open(codec: C, capacity: usize) -> Result<Self> {
        let session = Self {
            codec,
            input: vec![0u8; capacity].into_boxed_slice(),
            output: vec![0u8; capacity].into_boxed_slice(),
            in_pos: 0,
            avail_in: 0,
            avail_out: capacity,
            flush: Flush::NoFlush,
            last_status: None,
            finalized: false,
        };
        if capacity == 0 {
            return Err(PumpError::Stream("chunk size must be non-zero".to_string()));
        }
        debug!(direction = %session.direction(), capacity, "codec session opened");
        Ok(session)
    }

    pub fn direction(&self) -> Direction {
        self.codec.direction()
    }

    /// Buffer capacity C shared by input and output
    pub fn capacity(&self) -> usize {
        self.input.len()
    }

    /// Fed bytes the codec has not consumed yet
    pub fn avail_in(&self) -> usize {
        self.avail_in
    }

    /// Free bytes left in the output buffer after the last drain
    pub fn avail_out(&self) -> usize {
        self.avail_out
    }

    pub fn flush(&self) -> Flush {
        self.flush
    }

    pub fn last_status(&self) -> Option<CodecStatus> {
        self.last_status
    }

    /// Whether the codec has reported the logical end of the stream
    pub fn stream_ended(&self) -> bool {
        self.last_status == Some(CodecStatus::StreamEnd)
    }

    /// The whole input buffer, to be filled before [`CodecSession::feed`]
    ///
    /// Panics if previously fed input is still pending.
    pub fn input_mut(&mut self) -> &mut [u8] {
        assert_eq!(self.avail_in, 0, "refilling input with bytes still pending");
        &mut self.input
    }

    /// Hand the first `len` bytes of the input buffer to the codec
    ///
    /// Panics if `len` exceeds the capacity or if the flush mode would move
    /// back from `Finish`.
    pub fn feed(&mut self, len: usize, flush: Flush) {
        assert!(len <= self.capacity(), "fed more than the buffer holds");
        assert!(
            !(self.flush == Flush::Finish && flush == Flush::NoFlush),
            "flush mode moved back from finish"
        );
        self.in_pos = 0;
        self.avail_in = len;
        self.flush = flush;
    }

    /// Run the codec once over the pending input into an empty output buffer
    ///
    /// The bytes produced are available from [`CodecSession::pending`] until
    /// the next call.
    pub fn drain(&mut self) -> std::result::Result<Step, CodecFault> {
        let capacity = self.capacity();
        self.avail_out = capacity;
        let input = &self.input[self.in_pos..self.in_pos + self.avail_in];
        let step = self.codec.process(input, &mut self.output, self.flush)?;

        assert!(step.consumed <= self.avail_in, "codec consumed past input");
        assert!(step.produced <= capacity, "codec produced past output");
        self.in_pos += step.consumed;
        self.avail_in -= step.consumed;
        self.avail_out = capacity - step.produced;
        self.last_status = Some(step.status);
        Ok(step)
    }

    /// Output produced by the last drain
    pub fn pending(&self) -> &[u8] {
        &self.output[..self.capacity() - self.avail_out]
    }

    /// Finalize the codec and release the session
    pub fn finish(mut self) {
        self.finalize();
    }

    fn finalize(&mut self) {
        if !self.finalized {
            self.finalized = true;
            self.codec.end();
            debug!(direction = %self.codec.direction(), "codec session finalized");
        }
    }
}

impl<C: Codec> Drop for CodecSession<C> {
    fn drop(&mut self) {
        self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Copies input to output, counting finalizations
    struct Passthrough {
        ends: Rc<Cell<usize>>,
    }

    impl Codec for Passthrough {
        fn direction(&self) -> Direction {
            Direction::Compress
        }

        fn process(
            &mut self,
            input: &[u8],
            output: &mut [u8],
            flush: Flush,
        ) -> std::result::Result<Step, CodecFault> {
            let n = input.len().min(output.len());
            output[..n].copy_from_slice(&input[..n]);
            let done = flush == Flush::Finish && n == input.len();
            Ok(Step {
                consumed: n,
                produced: n,
                status: if done {
                    CodecStatus::StreamEnd
                } else {
                    CodecStatus::Ok
                },
            })
        }

        fn end(&mut self) {
            self.ends.set(self.ends.get() + 1);
        }
    }

    fn copy_codec() -> (Passthrough, Rc<Cell<usize>>) {
        let ends = Rc::new(Cell::new(0));
        (Passthrough { ends: ends.clone() }, ends)
    }

    #[test]
    fn drain_tracks_remaining_counts() {
        let (codec, _) = copy_codec();
        let mut session = CodecSession::open(codec, 4).unwrap();
        session.input_mut()[..3].copy_from_slice(b"abc");
        session.feed(3, Flush::NoFlush);

        let step = session.drain().unwrap();
        assert_eq!(step.consumed, 3);
        assert_eq!(session.avail_in(), 0);
        assert_eq!(session.avail_out(), 1);
        assert_eq!(session.pending(), b"abc");
    }

    #[test]
    fn finish_finalizes_once() {
        let (codec, ends) = copy_codec();
        let session = CodecSession::open(codec, 8).unwrap();
        session.finish();
        assert_eq!(ends.get(), 1);
    }

    #[test]
    fn drop_finalizes_once() {
        let (codec, ends) = copy_codec();
        {
            let _session = CodecSession::open(codec, 8).unwrap();
        }
        assert_eq!(ends.get(), 1);
    }

    #[test]
    fn zero_capacity_is_rejected_and_finalized() {
        let (codec, ends) = copy_codec();
        let err = CodecSession::open(codec, 0).err().unwrap();
        assert_eq!(err.code(), -2);
        assert_eq!(ends.get(), 1);
    }

    #[test]
    #[should_panic(expected = "flush mode moved back")]
    fn flush_mode_is_monotonic() {
        let (codec, _) = copy_codec();
        let mut session = CodecSession::open(codec, 8).unwrap();
        session.feed(0, Flush::Finish);
        session.feed(0, Flush::NoFlush);
    }

    #[test]
    #[should_panic(expected = "still pending")]
    fn refill_with_pending_input_panics() {
        let (codec, _) = copy_codec();
        let mut session = CodecSession::open(codec, 8).unwrap();
        session.feed(4, Flush::NoFlush);
        let _ = session.input_mut();
    }
}
