//! Property-based round-trip tests for the Zstd codec.

use proptest::prelude::*;

use strata_zstd::{max_compressed_length, CompressionLevel, ZstdCodec, ZstdCompressor};

fn levels() -> impl Strategy<Value = CompressionLevel> {
    prop_oneof![
        Just(CompressionLevel::None),
        Just(CompressionLevel::Fast),
        Just(CompressionLevel::Default),
        Just(CompressionLevel::Best),
        Just(CompressionLevel::Ultra),
    ]
}

/// Data with runs and repeated phrases, so the match finder has work to do.
fn structured_data() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            prop::collection::vec(any::<u8>(), 1..32),
            (any::<u8>(), 1usize..300).prop_map(|(b, n)| vec![b; n]),
            (0usize..4, 1usize..20).prop_map(|(i, n)| {
                let phrases: [&[u8]; 4] = [
                    b"the quick brown fox ",
                    b"jumps over the lazy dog ",
                    b"\x00\x01\x02\x03",
                    b"strata ",
                ];
                phrases[i].repeat(n)
            }),
        ],
        0..64,
    )
    .prop_map(|chunks| chunks.concat())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 50,
        ..ProptestConfig::default()
    })]

    #[test]
    fn prop_random_roundtrip(
        data in prop::collection::vec(any::<u8>(), 0..4096),
        level in levels(),
    ) {
        let codec = ZstdCodec::with_level(level);
        let compressed = codec.compress(&data).unwrap();
        prop_assert!(compressed.len() <= max_compressed_length(data.len()));
        let decompressed = codec.decompress(&compressed).unwrap();
        prop_assert_eq!(decompressed, data);
    }

    #[test]
    fn prop_structured_roundtrip(
        data in structured_data(),
        level in levels(),
        checksum in any::<bool>(),
    ) {
        let codec = ZstdCodec::with_level(level).with_checksum(checksum);
        let compressed = codec.compress(&data).unwrap();
        prop_assert!(compressed.len() <= max_compressed_length(data.len()));
        prop_assert_eq!(codec.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn prop_small_window_roundtrip(
        data in structured_data(),
        window_log in 10u8..14,
    ) {
        let compressor = ZstdCompressor::new().with_window_log(window_log).unwrap();
        let compressed = compressor.compress(&data).unwrap();
        let codec = ZstdCodec::new();
        prop_assert_eq!(codec.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn prop_output_padding_is_transparent(
        data in structured_data(),
        padding in 0usize..512,
        lead in 0usize..64,
        trail in 0usize..64,
    ) {
        let codec = ZstdCodec::new();
        let compressed = codec.compress(&data).unwrap();

        let mut exact = vec![0u8; codec.max_compressed_length(data.len())];
        let mut padded = vec![0u8; codec.max_compressed_length(data.len()) + padding];
        let a = codec.compress_to(&data, &mut exact).unwrap();
        let b = codec.compress_to(&data, &mut padded).unwrap();
        prop_assert_eq!(&exact[..a], &padded[..b]);
        prop_assert_eq!(&exact[..a], &compressed[..]);

        // Bytes around the destination window are never written.
        let mut out = vec![0xA5u8; lead + data.len() + trail];
        let end = lead + data.len() + trail;
        let n = codec.decompress_to(&compressed, &mut out[lead..end]).unwrap();
        prop_assert_eq!(n, data.len());
        prop_assert_eq!(&out[lead..lead + n], &data[..]);
        prop_assert!(out[..lead].iter().all(|&b| b == 0xA5));
        prop_assert!(out[lead + n..].iter().all(|&b| b == 0xA5));
    }

    #[test]
    fn prop_compression_is_deterministic(data in structured_data(), level in levels()) {
        let codec = ZstdCodec::with_level(level);
        prop_assert_eq!(codec.compress(&data).unwrap(), codec.compress(&data).unwrap());
    }
}
