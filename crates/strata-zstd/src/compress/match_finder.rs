//! LZ77 match finding using hash chains.
//!
//! Positions are absolute offsets into the frame's input, so the history of
//! earlier blocks stays searchable. Each block is parsed into a
//! [`SequenceStore`]: its literals plus (literal_length, match_length,
//! offset_value) commands, with offset values already mapped onto the
//! frame's repeat-offset history.

use super::params::{CompressionParameters, Strategy};
use crate::block::{RepeatOffsets, MIN_MATCH};

/// Bytes hashed per position; also the shortest match searched for.
const HASH_BYTES: usize = 4;

/// Golden ratio derived multiplier.
const HASH_PRIME: u32 = 0x9E37_79B1;

/// Empty slot marker in the hash and chain tables.
const EMPTY: usize = usize::MAX;

/// One parsed LZ77 command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRecord {
    pub literal_length: u32,
    pub match_length: u32,
    /// Distance + 3, or a repeat code 1-3.
    pub offset_value: u32,
}

/// Literals and commands of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceStore {
    pub literals: Vec<u8>,
    pub sequences: Vec<SequenceRecord>,
}

impl SequenceStore {
    pub fn with_capacity(block_size: usize) -> Self {
        Self {
            literals: Vec::with_capacity(block_size),
            sequences: Vec::with_capacity(block_size / 8),
        }
    }

    /// Record literals followed by a match.
    pub fn add_match(&mut self, literals: &[u8], match_length: usize, offset_value: usize) {
        self.literals.extend_from_slice(literals);
        self.sequences.push(SequenceRecord {
            literal_length: literals.len() as u32,
            match_length: match_length as u32,
            offset_value: offset_value as u32,
        });
    }

    /// Record the literals that follow the last match.
    pub fn add_literals(&mut self, literals: &[u8]) {
        self.literals.extend_from_slice(literals);
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: usize,
    length: usize,
    offset_value: usize,
}

impl Candidate {
    /// Length weighted against the cost of coding the offset.
    fn gain(&self) -> i64 {
        let offset_bits = usize::BITS - 1 - self.offset_value.leading_zeros();
        self.length as i64 * 4 - i64::from(offset_bits)
    }
}

/// Hash-chain match finder for one frame.
#[derive(Debug)]
pub struct MatchFinder {
    hash_table: Vec<usize>,
    chain_table: Vec<usize>,
    hash_shift: u32,
    chain_mask: usize,
    search_depth: usize,
    lookahead: usize,
    window_size: usize,
    /// Next position to insert into the tables.
    next_to_insert: usize,
}

impl MatchFinder {
    /// Create a finder for an input of `input_len` bytes.
    ///
    /// Table sizes are capped by what the input can fill.
    pub fn new(params: &CompressionParameters, window_size: u64, input_len: usize) -> Self {
        let input_log = usize::BITS - input_len.max(64).leading_zeros();
        let hash_log = u32::from(params.hash_log).min(input_log + 1).max(6);
        let chain_log = u32::from(params.chain_log).min(input_log).max(6);

        Self {
            hash_table: vec![EMPTY; 1 << hash_log],
            chain_table: vec![EMPTY; 1 << chain_log],
            hash_shift: 32 - hash_log,
            chain_mask: (1 << chain_log) - 1,
            search_depth: params.search_depth.max(1),
            lookahead: params.strategy.lookahead(),
            window_size: usize::try_from(window_size).unwrap_or(usize::MAX),
            next_to_insert: 0,
        }
    }

    #[inline]
    fn hash(&self, input: &[u8], pos: usize) -> usize {
        let bytes = [input[pos], input[pos + 1], input[pos + 2], input[pos + 3]];
        (u32::from_le_bytes(bytes).wrapping_mul(HASH_PRIME) >> self.hash_shift) as usize
    }

    /// Insert every position before `target` that has a full hash window.
    fn insert_until(&mut self, input: &[u8], target: usize) {
        let last = input.len().saturating_sub(HASH_BYTES - 1);
        let target = target.min(last);
        while self.next_to_insert < target {
            let pos = self.next_to_insert;
            let h = self.hash(input, pos);
            self.chain_table[pos & self.chain_mask] = self.hash_table[h];
            self.hash_table[h] = pos;
            self.next_to_insert += 1;
        }
    }

    /// Parse `input[start..end]` into literals and matches.
    ///
    /// `repeats` is advanced exactly as the decoder will advance it while
    /// executing the returned commands.
    pub fn find_sequences(
        &mut self,
        input: &[u8],
        start: usize,
        end: usize,
        repeats: &mut RepeatOffsets,
    ) -> SequenceStore {
        let mut store = SequenceStore::with_capacity(end - start);
        let mut anchor = start;
        let mut pos = start;

        while pos + HASH_BYTES <= end {
            let Some(mut best) = self.best_match(input, pos, end, anchor, repeats) else {
                pos += 1;
                continue;
            };

            // Lazy evaluation: prefer a clearly better match one byte later.
            let mut ahead = 0;
            while ahead < self.lookahead && pos + 1 + HASH_BYTES <= end {
                let bonus = if ahead == 0 { 4 } else { 7 };
                match self.best_match(input, pos + 1, end, anchor, repeats) {
                    Some(next) if next.gain() > best.gain() + bonus => {
                        best = next;
                        pos += 1;
                        ahead += 1;
                    }
                    _ => break,
                }
            }

            let literal_length = pos - anchor;
            store.add_match(&input[anchor..pos], best.length, best.offset_value);
            let resolved = repeats.resolve(best.offset_value, literal_length);
            debug_assert_eq!(resolved, Some(best.distance));

            pos += best.length;
            anchor = pos;
        }

        store.add_literals(&input[anchor..end]);
        store
    }

    /// Best match at `pos`, with the match kept inside `[.., end)`.
    fn best_match(
        &mut self,
        input: &[u8],
        pos: usize,
        end: usize,
        anchor: usize,
        repeats: &RepeatOffsets,
    ) -> Option<Candidate> {
        self.insert_until(input, pos);
        let literal_length = pos - anchor;
        let max_distance = pos.min(self.window_size);
        let mut best: Option<Candidate> = None;

        let consider = |distance: usize, best: &mut Option<Candidate>| {
            if distance == 0 || distance > max_distance {
                return;
            }
            let length = common_length(input, pos - distance, pos, end);
            if length < HASH_BYTES.max(MIN_MATCH) {
                return;
            }
            let candidate = Candidate {
                distance,
                length,
                offset_value: repeats.offset_value(distance, literal_length),
            };
            if best.map_or(true, |b| candidate.gain() > b.gain()) {
                *best = Some(candidate);
            }
        };

        for index in 0..3 {
            consider(repeats.get(index), &mut best);
        }
        if literal_length == 0 {
            consider(repeats.get(0).saturating_sub(1), &mut best);
        }

        let chain_size = self.chain_mask + 1;
        let mut candidate = self.hash_table[self.hash(input, pos)];
        let mut depth = self.search_depth;
        while candidate != EMPTY && depth > 0 {
            let distance = pos - candidate;
            if distance > max_distance {
                break;
            }
            consider(distance, &mut best);
            if best.is_some_and(|b| pos + b.length >= end) {
                break;
            }
            if distance >= chain_size {
                break;
            }
            let next = self.chain_table[candidate & self.chain_mask];
            if next == EMPTY || next >= candidate {
                break;
            }
            candidate = next;
            depth -= 1;
        }

        best
    }
}

/// Length of the common run at `earlier` and `later`, stopping at `end`.
#[inline]
fn common_length(input: &[u8], earlier: usize, later: usize, end: usize) -> usize {
    let limit = end - later;
    let a = &input[earlier..earlier + limit];
    let b = &input[later..end];

    let mut length = 0;
    for (x, y) in a.chunks_exact(8).zip(b.chunks_exact(8)) {
        let diff = u64::from_le_bytes([x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7]])
            ^ u64::from_le_bytes([y[0], y[1], y[2], y[3], y[4], y[5], y[6], y[7]]);
        if diff != 0 {
            return length + (diff.trailing_zeros() / 8) as usize;
        }
        length += 8;
    }
    length
        + a[length..]
            .iter()
            .zip(&b[length..])
            .take_while(|(x, y)| x == y)
            .count()
}

/// Whether `params` searches for matches at all.
pub fn searches_matches(params: &CompressionParameters) -> bool {
    params.strategy != Strategy::Store
}
