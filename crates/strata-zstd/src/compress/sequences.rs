//! Sequences section encoding.
//!
//! Each of the three code streams (literal lengths, offsets, match lengths)
//! independently picks the cheapest of RLE, the predefined distribution,
//! the previous block's table, or a freshly normalized FSE table.

use super::match_finder::SequenceRecord;
use super::EntropyState;
use crate::block::{
    encode_sequence_count, literal_length_code, match_length_code, offset_code, SequencesHeader,
    SymbolMode, LITERAL_LENGTH_BASELINE, MATCH_LENGTH_BASELINE, MAX_LL_LOG, MAX_LL_SYMBOL,
    MAX_ML_LOG, MAX_ML_SYMBOL, MAX_OF_LOG, MAX_OF_SYMBOL,
};
use crate::fse::{
    cached_ll_encoder, cached_ml_encoder, cached_of_encoder, normalize_counts,
    optimal_accuracy_log, write_normalized_counts, BitWriter, FseEncodeTable, FseEncoder,
};
use strata_core::{Error, Result};

/// Table selected for one code stream.
#[derive(Debug)]
struct StreamEncoding {
    mode: SymbolMode,
    /// Bytes written after the modes byte (RLE symbol or NCount header).
    description: Vec<u8>,
    /// `None` for RLE, which codes no state bits.
    table: Option<FseEncodeTable>,
}

/// Codes of one stream with their histogram.
struct CodeStream {
    codes: Vec<u8>,
    counts: Vec<u32>,
}

impl CodeStream {
    fn new(codes: Vec<u8>, max_symbol: u8) -> Self {
        let mut counts = vec![0u32; max_symbol as usize + 1];
        for &code in &codes {
            counts[code as usize] += 1;
        }
        Self { codes, counts }
    }

    /// The only symbol present, if there is exactly one.
    fn single_symbol(&self) -> Option<u8> {
        let mut present = self.counts.iter().enumerate().filter(|(_, &c)| c > 0);
        let (symbol, _) = present.next()?;
        present.next().is_none().then_some(symbol as u8)
    }

    fn max_present(&self) -> u8 {
        self.counts.iter().rposition(|&c| c > 0).unwrap_or(0) as u8
    }
}

/// Encode a sequences section into `out`.
///
/// `state` receives the tables the decoder will hold for repeat mode.
pub fn encode_sequences(
    sequences: &[SequenceRecord],
    state: &mut EntropyState,
    out: &mut Vec<u8>,
) -> Result<()> {
    let (count, width) = encode_sequence_count(sequences.len()).ok_or_else(|| {
        Error::Unsupported(format!("{} sequences in one block", sequences.len()))
    })?;
    out.extend_from_slice(&count[..width]);
    if sequences.is_empty() {
        return Ok(());
    }

    let ll = CodeStream::new(
        sequences.iter().map(|s| literal_length_code(s.literal_length)).collect(),
        MAX_LL_SYMBOL,
    );
    let of = CodeStream::new(
        sequences.iter().map(|s| offset_code(s.offset_value)).collect(),
        MAX_OF_SYMBOL,
    );
    let ml = CodeStream::new(
        sequences.iter().map(|s| match_length_code(s.match_length)).collect(),
        MAX_ML_SYMBOL,
    );

    let ll_enc = select_encoding(&ll, MAX_LL_LOG, cached_ll_encoder(), &state.literal_lengths)?;
    let of_enc = select_encoding(&of, MAX_OF_LOG, cached_of_encoder(), &state.offsets)?;
    let ml_enc = select_encoding(&ml, MAX_ML_LOG, cached_ml_encoder(), &state.match_lengths)?;

    let header = SequencesHeader {
        num_sequences: sequences.len(),
        literal_lengths: ll_enc.mode,
        offsets: of_enc.mode,
        match_lengths: ml_enc.mode,
    };
    out.push(header.modes_byte());
    out.extend_from_slice(&ll_enc.description);
    out.extend_from_slice(&of_enc.description);
    out.extend_from_slice(&ml_enc.description);

    let stream = write_bitstream(
        sequences,
        (&ll, ll_enc.table.as_ref()),
        (&of, of_enc.table.as_ref()),
        (&ml, ml_enc.table.as_ref()),
    );
    out.extend_from_slice(&stream);

    state.literal_lengths = ll_enc.table;
    state.offsets = of_enc.table;
    state.match_lengths = ml_enc.table;
    Ok(())
}

/// Pick the cheapest mode for one stream.
fn select_encoding(
    stream: &CodeStream,
    max_log: u8,
    predefined: &FseEncodeTable,
    previous: &Option<FseEncodeTable>,
) -> Result<StreamEncoding> {
    if let Some(symbol) = stream.single_symbol() {
        return Ok(StreamEncoding {
            mode: SymbolMode::Rle,
            description: vec![symbol],
            table: None,
        });
    }

    let mut best: Option<(f64, StreamEncoding)> = None;
    let mut offer = |cost: f64, encoding: StreamEncoding| {
        if best.as_ref().map_or(true, |(b, _)| cost < *b) {
            best = Some((cost, encoding));
        }
    };

    if let Some(bits) = previous.as_ref().and_then(|t| t.estimate_bits(&stream.counts)) {
        offer(
            bits,
            StreamEncoding {
                mode: SymbolMode::Repeat,
                description: Vec::new(),
                table: previous.clone(),
            },
        );
    }
    if let Some(bits) = predefined.estimate_bits(&stream.counts) {
        offer(
            bits,
            StreamEncoding {
                mode: SymbolMode::Predefined,
                description: Vec::new(),
                table: Some(predefined.clone()),
            },
        );
    }
    if let Some((table, description)) = build_table(stream, max_log) {
        if let Some(bits) = table.estimate_bits(&stream.counts) {
            offer(
                bits + description.len() as f64 * 8.0,
                StreamEncoding {
                    mode: SymbolMode::Fse,
                    description,
                    table: Some(table),
                },
            );
        }
    }

    best.map(|(_, encoding)| encoding).ok_or_else(|| {
        Error::Unsupported("no FSE table can represent the sequence codes".into())
    })
}

/// Normalize the stream's histogram into a new table and its NCount header.
fn build_table(stream: &CodeStream, max_log: u8) -> Option<(FseEncodeTable, Vec<u8>)> {
    let max_symbol = stream.max_present();
    let counts = &stream.counts[..=max_symbol as usize];
    let accuracy_log = optimal_accuracy_log(max_log, stream.codes.len(), max_symbol);
    let normalized = normalize_counts(counts, accuracy_log)?;

    let mut header = BitWriter::new();
    write_normalized_counts(&normalized, accuracy_log, &mut header);
    Some((
        FseEncodeTable::new(&normalized, accuracy_log),
        header.finish(),
    ))
}

/// One stream's codes with the table coding them (`None` for RLE).
type StreamInput<'a> = (&'a CodeStream, Option<&'a FseEncodeTable>);

/// Write the interleaved backward bitstream.
///
/// Sequences are written last to first so the decoder reads them in order:
/// per sequence the extra bits (LL, ML, OF) preceded by the state
/// transitions (OF, ML, LL), with the final states (ML, OF, LL) on top.
fn write_bitstream(
    sequences: &[SequenceRecord],
    (ll, ll_table): StreamInput<'_>,
    (of, of_table): StreamInput<'_>,
    (ml, ml_table): StreamInput<'_>,
) -> Vec<u8> {
    let mut bits = BitWriter::with_capacity(sequences.len() * 6);
    let last = sequences.len() - 1;

    let start = |table: Option<&FseEncodeTable>, codes: &[u8]| {
        table.map(|t| FseEncoder::new(t, codes[last]))
    };
    let mut ll_state = start(ll_table, &ll.codes);
    let mut of_state = start(of_table, &of.codes);
    let mut ml_state = start(ml_table, &ml.codes);

    for (i, seq) in sequences.iter().enumerate().rev() {
        let (ll_code, of_code, ml_code) = (ll.codes[i], of.codes[i], ml.codes[i]);
        if i != last {
            transition(&mut of_state, of_table, of_code, &mut bits);
            transition(&mut ml_state, ml_table, ml_code, &mut bits);
            transition(&mut ll_state, ll_table, ll_code, &mut bits);
        }

        let (ll_bits, ll_base) = LITERAL_LENGTH_BASELINE[ll_code as usize];
        bits.write_bits(u64::from(seq.literal_length - ll_base), u32::from(ll_bits));
        let (ml_bits, ml_base) = MATCH_LENGTH_BASELINE[ml_code as usize];
        bits.write_bits(u64::from(seq.match_length - ml_base), u32::from(ml_bits));
        bits.write_bits(
            u64::from(seq.offset_value - (1 << of_code)),
            u32::from(of_code),
        );
    }

    for (state, table) in [(ml_state, ml_table), (of_state, of_table), (ll_state, ll_table)] {
        if let (Some(state), Some(table)) = (state, table) {
            state.flush(table, &mut bits);
        }
    }
    bits.close()
}

#[inline]
fn transition(
    state: &mut Option<FseEncoder>,
    table: Option<&FseEncodeTable>,
    code: u8,
    bits: &mut BitWriter,
) {
    if let (Some(state), Some(table)) = (state.as_mut(), table) {
        state.encode(table, code, bits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{FrameDecodeState, RepeatOffsets, SequenceDecoder};
    use crate::cursor::ByteCursor;

    fn record(literal_length: u32, match_length: u32, offset_value: u32) -> SequenceRecord {
        SequenceRecord {
            literal_length,
            match_length,
            offset_value,
        }
    }

    /// Decode a section written by `encode_sequences`, returning (ll, ml, ov).
    fn decode(
        section: &[u8],
        decoder_state: &mut FrameDecodeState,
    ) -> Vec<(usize, usize, usize)> {
        let mut cursor = ByteCursor::new(section);
        let header = SequencesHeader::parse(&mut cursor).unwrap();
        if header.num_sequences == 0 {
            assert!(cursor.is_empty());
            return Vec::new();
        }
        decoder_state.tables.update(&header, &mut cursor).unwrap();
        let mut decoder = SequenceDecoder::new(
            &decoder_state.tables,
            cursor.rest(),
            cursor.offset(),
            header.num_sequences,
        )
        .unwrap();

        // Every test offset is a new one, so repeats never resolve.
        let mut reps = RepeatOffsets::new();
        let mut decoded = Vec::new();
        for _ in 0..header.num_sequences {
            let seq = decoder.next_sequence(&mut reps).unwrap();
            decoded.push((seq.literal_length, seq.match_length, seq.distance));
        }
        decoder.finish().unwrap();
        decoded
    }

    fn varied(n: u32) -> Vec<SequenceRecord> {
        (0..n)
            .map(|i| record(i % 7 + (i % 3) * 20, 4 + (i * 5) % 40, 1000 + i * 17 + 3))
            .collect()
    }

    fn expected(records: &[SequenceRecord]) -> Vec<(usize, usize, usize)> {
        records
            .iter()
            .map(|r| {
                (
                    r.literal_length as usize,
                    r.match_length as usize,
                    r.offset_value as usize - 3,
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_section() {
        let mut state = EntropyState::new();
        let mut out = Vec::new();
        encode_sequences(&[], &mut state, &mut out).unwrap();
        assert_eq!(out, [0]);
    }

    #[test]
    fn test_single_sequence_uses_rle_everywhere() {
        let mut state = EntropyState::new();
        let mut out = Vec::new();
        let records = [record(5, 10, 100 + 3)];
        encode_sequences(&records, &mut state, &mut out).unwrap();
        // RLE, RLE, RLE.
        assert_eq!(out[1], 0b0101_0100);
        assert!(state.literal_lengths.is_none());
        assert_eq!(decode(&out, &mut FrameDecodeState::new()), expected(&records));
    }

    #[test]
    fn test_mixed_sequences_round_trip() {
        for n in [2, 10, 300, 2000] {
            let records = varied(n);
            let mut state = EntropyState::new();
            let mut out = Vec::new();
            encode_sequences(&records, &mut state, &mut out).unwrap();
            assert_eq!(decode(&out, &mut FrameDecodeState::new()), expected(&records));
        }
    }

    #[test]
    fn test_large_section_builds_tables() {
        let records = varied(2000);
        let mut state = EntropyState::new();
        let mut out = Vec::new();
        encode_sequences(&records, &mut state, &mut out).unwrap();
        // Two-byte count, then the modes byte.
        let modes = out[2];
        // Offset codes cluster on 9..=15, which a fitted table codes cheaper.
        assert_eq!(SymbolMode::from_field(modes >> 4), SymbolMode::Fse);
        assert!(state.offsets.is_some());
    }

    #[test]
    fn test_repeat_mode_across_sections() {
        let records = varied(2000);
        let mut state = EntropyState::new();
        let mut decoder_state = FrameDecodeState::new();

        let mut first = Vec::new();
        encode_sequences(&records, &mut state, &mut first).unwrap();
        decode(&first, &mut decoder_state);

        let mut second = Vec::new();
        encode_sequences(&records, &mut state, &mut second).unwrap();
        let modes = second[2];
        assert_eq!(SymbolMode::from_field(modes >> 4), SymbolMode::Repeat);
        assert!(second.len() < first.len());
        assert_eq!(decode(&second, &mut decoder_state), expected(&records));
    }

    #[test]
    fn test_large_lengths_use_extra_bits() {
        let records = [record(70_000, 60_000, 5 + 3), record(0, 131_074, 8 + 3)];
        let mut state = EntropyState::new();
        let mut out = Vec::new();
        encode_sequences(&records, &mut state, &mut out).unwrap();
        assert_eq!(decode(&out, &mut FrameDecodeState::new()), expected(&records));
    }
}
