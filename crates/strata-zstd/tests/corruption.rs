//! Malformed input handling.
//!
//! Every malformed frame must produce an error; none may panic or write
//! outside the output buffer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use strata_zstd::cursor::ByteWriter;
use strata_zstd::frame::{write_frame_header, write_magic, BlockHeader, BlockType};
use strata_zstd::{decompressed_size, Error, ZstdCodec, ZstdCompressor, ZstdDecompressor};

fn sample() -> Vec<u8> {
    b"Corrupted frames must be rejected with a precise error. ".repeat(400)
}

#[test]
fn test_empty_input_is_rejected() {
    let err = ZstdDecompressor::new().decompress_to(&[], &mut [0u8; 16]).unwrap_err();
    assert!(matches!(err, Error::InvalidMagic { .. }));
}

#[test]
fn test_bad_magic_in_first_frame() {
    let err = ZstdDecompressor::new()
        .decompress(&[0x00, 0x01, 0x02, 0x03, 0x04])
        .unwrap_err();
    match err {
        Error::InvalidMagic { offset, found } => {
            assert_eq!(offset, 0);
            assert_eq!(found, 0x0302_0100);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_bad_magic_in_second_frame_reports_its_offset() {
    let frame = ZstdCodec::new().compress(b"first frame").unwrap();
    let mut stream = frame.clone();
    stream.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00]);

    let mut out = vec![0u8; 64];
    let err = ZstdDecompressor::new()
        .decompress_to(&stream, &mut out)
        .unwrap_err();
    match err {
        Error::InvalidMagic { offset, found } => {
            assert_eq!(offset, frame.len());
            assert_eq!(found, 0xEFBE_ADDE);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_reserved_block_type_is_corruption() {
    let mut frame = ZstdCodec::new().compress(b"reserved").unwrap();
    // Magic, descriptor, 1-byte content size, then the first block header.
    frame[6] = (frame[6] & !0b110) | (3 << 1);
    let err = ZstdDecompressor::new().decompress(&frame).unwrap_err();
    assert!(err.is_corruption(), "{err:?}");
}

#[test]
fn test_offset_beyond_output_is_located() {
    // Raw literals "abc" followed by one sequence whose offset reaches 10
    // bytes back while only 3 have been produced. All three symbol streams
    // use RLE mode, so the bitstream holds just the 3 offset extra bits.
    let mut frame = vec![0u8; 64];
    let mut writer = ByteWriter::new(&mut frame);
    write_magic(&mut writer).unwrap();
    write_frame_header(&mut writer, 7, 1024, false).unwrap();
    BlockHeader {
        last_block: true,
        block_type: BlockType::Compressed,
        block_size: 10,
    }
    .write(&mut writer)
    .unwrap();
    writer.write_u8(3 << 3).unwrap(); // raw literals, size 3
    writer.write_slice(b"abc").unwrap();
    writer.write_u8(1).unwrap(); // one sequence
    writer.write_u8(0b0101_0100).unwrap(); // RLE modes
    writer.write_slice(&[3, 3, 1]).unwrap(); // LL code 3, OF code 3, ML code 1
    let bitstream_offset = writer.position();
    // Offset value 8 + 5 = 13, i.e. distance 10; then the end marker.
    writer.write_u8(0b0000_1101).unwrap();
    let len = writer.position();
    frame.truncate(len);

    let mut out = vec![0u8; 16];
    let err = ZstdDecompressor::new()
        .decompress_to(&frame, &mut out)
        .unwrap_err();
    match err {
        Error::CorruptSequence {
            offset,
            distance,
            available,
        } => {
            assert_eq!(offset, bitstream_offset);
            assert_eq!(distance, 10);
            assert_eq!(available, 3);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(zstd::decode_all(&frame[..]).is_err());
}

#[test]
fn test_checksum_mismatch() {
    let data = sample();
    let mut frame = ZstdCompressor::new()
        .with_checksum(true)
        .compress(&data)
        .unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0x80;

    let err = ZstdDecompressor::new().decompress(&frame).unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }), "{err:?}");
    assert!(err.is_corruption());

    // Skipping verification still yields the content.
    let decoded = ZstdDecompressor::new()
        .verify_checksum(false)
        .decompress(&frame)
        .unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn test_every_truncation_is_an_error() {
    let data = sample();
    for checksum in [false, true] {
        let frame = ZstdCompressor::new()
            .with_checksum(checksum)
            .compress(&data)
            .unwrap();
        let mut out = vec![0u8; data.len()];
        for cut in 0..frame.len() {
            let result = ZstdDecompressor::new().decompress_to(&frame[..cut], &mut out);
            assert!(result.is_err(), "prefix of {cut} bytes decoded");
        }
    }
}

#[test]
fn test_truncated_reference_frames_are_errors() {
    let data = sample();
    let frame = zstd::encode_all(&data[..], 3).unwrap();
    let mut out = vec![0u8; data.len()];
    for cut in 0..frame.len() {
        assert!(ZstdDecompressor::new()
            .decompress_to(&frame[..cut], &mut out)
            .is_err());
    }
}

#[test]
fn test_output_too_small() {
    let data = sample();
    let frame = ZstdCodec::new().compress(&data).unwrap();
    let mut out = vec![0u8; data.len() - 1];
    let err = ZstdDecompressor::new()
        .decompress_to(&frame, &mut out)
        .unwrap_err();
    assert!(matches!(err, Error::BufferTooSmall { .. }), "{err:?}");
    assert!(err.is_usage());
}

#[test]
fn test_random_byte_flips_never_panic() {
    let mut rng = StdRng::seed_from_u64(0xBAD_F00D);
    let text = sample();
    let frames = [
        ZstdCompressor::new().with_checksum(true).compress(&text).unwrap(),
        zstd::encode_all(&text[..], 5).unwrap(),
    ];
    let mut out = vec![0u8; text.len() + 1024];

    for frame in &frames {
        for _ in 0..500 {
            let mut corrupted = frame.clone();
            for _ in 0..rng.gen_range(1..4) {
                let at = rng.gen_range(0..corrupted.len());
                corrupted[at] ^= 1 << rng.gen_range(0..8);
            }
            // Either outcome is acceptable; with a checksum most flips are caught.
            let _ = ZstdDecompressor::new().decompress_to(&corrupted, &mut out);
        }
    }
}

#[test]
fn test_flips_into_exact_output_are_corruption() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let text = sample();
    let frame = ZstdCompressor::new().compress(&text).unwrap();
    let mut out = vec![0u8; text.len()];

    for _ in 0..2000 {
        let mut corrupted = frame.clone();
        let at = rng.gen_range(4..corrupted.len());
        corrupted[at] ^= 1 << rng.gen_range(0..8);
        // Flips that change the recorded size test something else.
        if !matches!(decompressed_size(&corrupted), Ok(Some(n)) if n == text.len() as u64) {
            continue;
        }
        if let Err(err) = ZstdDecompressor::new().decompress_to(&corrupted, &mut out) {
            assert!(err.is_corruption(), "flip at {at}: {err:?}");
        }
    }
}

#[test]
fn test_random_garbage_after_magic_never_panics() {
    let mut rng = StdRng::seed_from_u64(17);
    let mut out = vec![0u8; 1 << 16];
    for _ in 0..2000 {
        let len = rng.gen_range(0..200);
        let mut input = 0xFD2F_B528u32.to_le_bytes().to_vec();
        input.extend((0..len).map(|_| rng.gen::<u8>()));
        let _ = ZstdDecompressor::new().decompress_to(&input, &mut out);
    }
}
