mod common;

use common::{generate_compressible_data, generate_random_data};
use flate2::read::ZlibDecoder;
use std::fs::File;
use std::io::Read;
use tempfile::NamedTempFile;
use zpipe::{Arena, Pump, Quality, CHUNK};

const LENGTHS: &[usize] = &[
    0,
    1,
    CHUNK - 1,
    CHUNK,
    CHUNK + 1,
    2 * CHUNK,
    3 * CHUNK + 17,
    5 * CHUNK,
];

fn roundtrip(data: &[u8], level: u32) {
    let arena = Arena::default();
    let quality = Quality::new(level).unwrap();

    let mut packed = Vec::new();
    let report = Pump::compress(quality, &arena)
        .run(data, &mut packed)
        .unwrap();
    assert_eq!(report.bytes_in, data.len() as u64);
    assert_eq!(report.bytes_out, packed.len() as u64);
    assert_eq!(report.crc32, crc32fast::hash(data));

    let mut unpacked = Vec::new();
    let back = Pump::decompress(&arena)
        .run(&packed[..], &mut unpacked)
        .unwrap();
    assert_eq!(unpacked.len(), data.len(), "level {} len {}", level, data.len());
    assert!(unpacked == data, "level {} len {}", level, data.len());
    assert_eq!(back.crc32, report.crc32);

    assert_eq!(arena.in_use(), 0);
    assert_eq!(arena.outstanding(), 0);
}

#[test]
fn roundtrip_every_level_and_boundary_length() {
    for level in 1..=9 {
        for &len in LENGTHS {
            roundtrip(&generate_compressible_data(len), level);
            roundtrip(&generate_random_data(len), level);
        }
    }
}

#[test]
fn output_is_standard_zlib() {
    let arena = Arena::default();
    let data = generate_compressible_data(4 * CHUNK + 5);
    let mut packed = Vec::new();
    Pump::compress(Quality::new(6).unwrap(), &arena)
        .run(&data[..], &mut packed)
        .unwrap();

    assert_eq!(packed[0], 0x78);
    assert!(packed.len() < data.len() / 4);

    let mut decoded = Vec::new();
    ZlibDecoder::new(&packed[..])
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn small_chunks_roundtrip() {
    let arena = Arena::default();
    let data = generate_random_data(10_000);
    for chunk in [1, 2, 31, 1000] {
        let mut packed = Vec::new();
        Pump::compress(Quality::BEST, &arena)
            .with_chunk_size(chunk)
            .run(&data[..], &mut packed)
            .unwrap();

        let mut unpacked = Vec::new();
        Pump::decompress(&arena)
            .with_chunk_size(chunk)
            .run(&packed[..], &mut unpacked)
            .unwrap();
        assert!(unpacked == data, "chunk {}", chunk);
    }
}

#[test]
fn trailing_bytes_after_stream_are_ignored() {
    let arena = Arena::default();
    let data = generate_compressible_data(1000);
    let mut packed = Vec::new();
    zpipe::compress(&data[..], &mut packed, Quality::BEST, &arena).unwrap();
    packed.extend_from_slice(b"trailing garbage");

    let mut unpacked = Vec::new();
    zpipe::decompress(&packed[..], &mut unpacked, &arena).unwrap();
    assert_eq!(unpacked, data);
}

#[test]
fn file_to_file_roundtrip() {
    let data = generate_random_data(3 * CHUNK + 1);
    let source = NamedTempFile::new().unwrap();
    std::fs::write(source.path(), &data).unwrap();
    let packed = NamedTempFile::new().unwrap();
    let unpacked = NamedTempFile::new().unwrap();
    let arena = Arena::default();

    Pump::compress(Quality::new(3).unwrap(), &arena)
        .run(
            File::open(source.path()).unwrap(),
            File::create(packed.path()).unwrap(),
        )
        .unwrap();
    Pump::decompress(&arena)
        .run(
            File::open(packed.path()).unwrap(),
            File::create(unpacked.path()).unwrap(),
        )
        .unwrap();

    assert_eq!(std::fs::read(unpacked.path()).unwrap(), data);
}
