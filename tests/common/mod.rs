//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::io::{self, ErrorKind, Read, Write};

pub fn generate_compressible_data(size: usize) -> Vec<u8> {
    // Pattern that compresses well
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

pub fn generate_random_data(size: usize) -> Vec<u8> {
    // Pseudo-random data that doesn't compress well
    let mut data = Vec::with_capacity(size);
    let mut state = 0x12345678u32;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

/// Transfer sizes cycled through by the choppy adapters
const SIZES: &[usize] = &[1, 7, 4096, 3, 16384, 100, 2];

/// Reader that returns short reads and fails every third call with `Interrupted`
pub struct ChoppyReader<'a> {
    data: &'a [u8],
    calls: usize,
}

impl<'a> ChoppyReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, calls: 0 }
    }
}

impl Read for ChoppyReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.calls += 1;
        if self.calls % 3 == 0 {
            return Err(ErrorKind::Interrupted.into());
        }
        let n = SIZES[self.calls % SIZES.len()]
            .min(buf.len())
            .min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

/// Writer that accepts short writes and fails every other call with `Interrupted`
pub struct ChoppyWriter {
    pub written: Vec<u8>,
    calls: usize,
}

impl ChoppyWriter {
    pub fn new() -> Self {
        Self {
            written: Vec::new(),
            calls: 0,
        }
    }
}

impl Write for ChoppyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.calls += 1;
        if self.calls % 2 == 0 {
            return Err(ErrorKind::Interrupted.into());
        }
        let n = SIZES[self.calls % SIZES.len()].min(buf.len());
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer that accepts `limit` bytes, then stops making progress
pub struct StallingWriter {
    pub written: Vec<u8>,
    limit: usize,
}

impl StallingWriter {
    pub fn new(limit: usize) -> Self {
        Self {
            written: Vec::new(),
            limit,
        }
    }
}

impl Write for StallingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = (self.limit - self.written.len()).min(buf.len());
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
