//! Boundary conditions of the frame format and the public API.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_zstd::cursor::{ByteCursor, ByteWriter};
use strata_zstd::frame::{
    read_frame_header, read_magic, write_frame_header, write_magic, FrameHeader,
};
use strata_zstd::{
    decompressed_bound, decompressed_size, max_compressed_length, CompressionLevel, Error,
    ZstdCodec, ZstdCompressor, ZstdDecompressor, ZSTD_MAGIC,
};

/// Write a magic and frame header, then read the header back.
fn header_round_trip(input_size: u64, window_size: u64) -> (usize, FrameHeader) {
    let mut buf = [0u8; 32];
    let mut writer = ByteWriter::new(&mut buf);
    write_magic(&mut writer).unwrap();
    let written = write_frame_header(&mut writer, input_size, window_size, false).unwrap();

    let mut cursor = ByteCursor::new(&buf);
    assert_eq!(read_magic(&mut cursor).unwrap(), ZSTD_MAGIC);
    let header = read_frame_header(&mut cursor).unwrap();
    assert_eq!(header.header_size, written);
    assert_eq!(header.content_size, Some(input_size));
    (written, header)
}

// =============================================================================
// Frame header
// =============================================================================

#[test]
fn test_tiny_single_segment_header() {
    let (size, header) = header_round_trip(1, 1024);
    assert_eq!(size, 2);
    assert!(header.single_segment);
    assert_eq!(header.window_size, None);
}

#[test]
fn test_two_byte_content_size_boundary() {
    for k in [1u64, 4, 8] {
        let window = 1024 + 128 * k;
        let (size, header) = header_round_trip(65_792, window);
        // Descriptor, window byte and a 4-byte content size.
        assert_eq!(size, 6);
        assert!(!header.single_segment);
        assert_eq!(header.window_size, Some(window));
    }

    let (size, _) = header_round_trip(65_791, 1 << 20);
    // Single segment with a 2-byte content size.
    assert_eq!(size, 3);
}

#[test]
fn test_large_content_with_minimum_window() {
    let (size, header) = header_round_trip(i32::MAX as u64, 1024);
    assert_eq!(size, 6);
    assert_eq!(header.window_size, Some(1024));
}

#[test]
fn test_unrepresentable_windows_are_rejected() {
    for window in [1023u64, 1025] {
        let mut buf = [0u8; 32];
        let mut writer = ByteWriter::new(&mut buf);
        let err = write_frame_header(&mut writer, 1 << 20, window, false).unwrap_err();
        assert!(matches!(err, Error::InvalidWindowSize(_)), "{window}: {err:?}");
        assert!(err.is_usage());
    }
}

#[test]
fn test_magic_needs_four_bytes() {
    let mut buf = [0u8; 3];
    let mut writer = ByteWriter::new(&mut buf);
    let err = write_magic(&mut writer).unwrap_err();
    assert!(matches!(err, Error::BufferTooSmall { .. }), "{err:?}");
}

#[test]
fn test_window_log_bounds() {
    assert!(ZstdCompressor::new().with_window_log(9).is_err());
    assert!(ZstdCompressor::new().with_window_log(10).is_ok());
    assert!(ZstdCompressor::new().with_window_log(31).is_ok());
    assert!(ZstdCompressor::new().with_window_log(32).is_err());
}

// =============================================================================
// Compression bound
// =============================================================================

#[test]
fn test_max_compressed_length_values() {
    assert_eq!(max_compressed_length(0), 64);
    assert_eq!(max_compressed_length(1), 64);
    assert_eq!(max_compressed_length(100), 163);
    assert_eq!(max_compressed_length(1 << 20), (1 << 20) + (1 << 12));
}

#[test]
fn test_compress_into_exact_bound() {
    for len in [0usize, 1, 17, 1000, 131_072, 300_000] {
        let data: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
        let mut exact = vec![0u8; max_compressed_length(len)];
        let codec = ZstdCodec::new();
        let size = codec.compress_to(&data, &mut exact).unwrap();
        assert_eq!(codec.decompress(&exact[..size]).unwrap(), data);

        let mut short = vec![0u8; max_compressed_length(len) - 1];
        let err = codec.compress_to(&data, &mut short).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { .. }));
    }
}

#[test]
fn test_incompressible_input_stays_within_bound() {
    let mut rng = StdRng::seed_from_u64(0x9E37_79B9_7F4A_7C15);
    let data: Vec<u8> = (0..500_000).map(|_| rng.gen::<u8>()).collect();
    for level in [CompressionLevel::None, CompressionLevel::Best] {
        let codec = ZstdCodec::with_level(level).with_checksum(true);
        let compressed = codec.compress(&data).unwrap();
        assert!(compressed.len() <= max_compressed_length(data.len()));
        assert_eq!(codec.decompress(&compressed).unwrap(), data);
    }
}

// =============================================================================
// Block shapes
// =============================================================================

#[test]
fn test_large_rle_input() {
    let data = vec![0xABu8; 1 << 20];
    let codec = ZstdCodec::new();
    let compressed = codec.compress(&data).unwrap();
    // Eight RLE blocks of 4 bytes each, plus magic and a header.
    assert!(compressed.len() < 64, "{} bytes", compressed.len());
    assert_eq!(codec.decompress(&compressed).unwrap(), data);
    assert_eq!(zstd::decode_all(&compressed[..]).unwrap(), data);
}

#[test]
fn test_rle_literals_with_long_header() {
    // Runs of one value separated by matches keep literals uniform.
    let mut data = Vec::new();
    for i in 0..200 {
        data.extend(std::iter::repeat(b'-').take(60));
        data.extend_from_slice(format!("{:08}", i % 7).as_bytes());
    }
    let codec = ZstdCodec::with_level(CompressionLevel::Best);
    let compressed = codec.compress(&data).unwrap();
    assert_eq!(codec.decompress(&compressed).unwrap(), data);
    assert_eq!(zstd::decode_all(&compressed[..]).unwrap(), data);
}

#[test]
fn test_huffman_reuse_across_mixed_blocks() {
    // Text, noise, text: the noise block is stored raw, after which the
    // text block may not reuse a table the decoder never saw in order.
    let text = b"Blocks share Huffman tables only while it is safe. ".repeat(3000);
    let mut rng = StdRng::seed_from_u64(1);
    let noise: Vec<u8> = (0..140_000).map(|_| rng.gen::<u8>()).collect();

    let mut data = text.clone();
    data.extend_from_slice(&noise);
    data.extend_from_slice(&text);
    data.extend_from_slice(&noise[..5000]);
    data.extend_from_slice(&text);

    let codec = ZstdCodec::new();
    let compressed = codec.compress(&data).unwrap();
    assert!(compressed.len() < data.len());
    assert_eq!(codec.decompress(&compressed).unwrap(), data);
    assert_eq!(zstd::decode_all(&compressed[..]).unwrap(), data);
}

#[test]
fn test_block_size_boundaries() {
    let codec = ZstdCodec::new();
    for len in [131_071usize, 131_072, 131_073, 262_144] {
        let data: Vec<u8> = (0..len).map(|i| ((i / 3) % 97) as u8).collect();
        let compressed = codec.compress(&data).unwrap();
        assert_eq!(codec.decompress(&compressed).unwrap(), data);
        assert_eq!(zstd::decode_all(&compressed[..]).unwrap(), data);
    }
}

// =============================================================================
// Size queries
// =============================================================================

#[test]
fn test_decompressed_size_ignores_trailing_bytes() {
    let data = b"size me".repeat(50);
    let mut frame = ZstdCodec::new().compress(&data).unwrap();
    frame.extend_from_slice(b"trailing garbage");
    assert_eq!(decompressed_size(&frame).unwrap(), Some(data.len() as u64));
}

#[test]
fn test_decompressed_size_of_non_frame() {
    assert!(matches!(
        decompressed_size(b"not a frame"),
        Err(Error::InvalidMagic { offset: 0, .. })
    ));
}

#[test]
fn test_decompressed_bound_covers_all_frames() {
    let a = b"first".repeat(100);
    let b = b"second".repeat(1000);
    let mut stream = ZstdCodec::new().compress(&a).unwrap();
    stream.extend_from_slice(&ZstdCodec::new().compress(&b).unwrap());
    assert_eq!(
        decompressed_bound(&stream).unwrap(),
        (a.len() + b.len()) as u64
    );
}

#[test]
fn test_empty_frame_round_trip() {
    let compressed = ZstdCodec::new().compress(&[]).unwrap();
    assert_eq!(decompressed_size(&compressed).unwrap(), Some(0));
    assert!(ZstdDecompressor::new().decompress(&compressed).unwrap().is_empty());
    assert!(zstd::decode_all(&compressed[..]).unwrap().is_empty());
}
