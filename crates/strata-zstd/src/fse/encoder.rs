//! FSE encoding.
//!
//! Everything needed to emit an FSE-coded stream: normalizing symbol counts
//! to a power-of-two total, serializing the normalized-count header, building
//! the encoding (state transition) table, and the encoder state itself.

use super::bits::BitWriter;
use super::table::FSE_MIN_ACCURACY_LOG;

#[inline]
fn highbit(value: u32) -> u32 {
    31 - value.leading_zeros()
}

// =============================================================================
// Normalization
// =============================================================================

/// Choose an accuracy log for `total` samples whose largest symbol is `max_symbol`.
///
/// The log is large enough to give every present symbol at least one state,
/// never larger than the sample count warrants, and capped at `max_log`.
pub fn optimal_accuracy_log(max_log: u8, total: usize, max_symbol: u8) -> u8 {
    let total = total.max(2) as u32;
    let max_bits_src = highbit(total - 1).saturating_sub(2);
    let min_bits = (highbit(total) + 1).min(highbit(u32::from(max_symbol).max(1)) + 2);

    let mut log = u32::from(max_log);
    if max_bits_src < log {
        log = max_bits_src;
    }
    if min_bits > log {
        log = min_bits;
    }
    log.clamp(u32::from(FSE_MIN_ACCURACY_LOG), u32::from(max_log)) as u8
}

/// Scale `counts` so they sum to `1 << accuracy_log`.
///
/// Every present symbol keeps at least one state. Returns `None` when the
/// table is too small to hold every present symbol.
pub fn normalize_counts(counts: &[u32], accuracy_log: u8) -> Option<Vec<i16>> {
    let scale = 1i64 << accuracy_log;
    let total: i64 = counts.iter().map(|&c| i64::from(c)).sum();
    let present = counts.iter().filter(|&&c| c > 0).count() as i64;
    if total == 0 || present > scale {
        return None;
    }

    let mut normalized = vec![0i16; counts.len()];
    let mut fractions: Vec<(i64, usize)> = Vec::with_capacity(present as usize);
    let mut distributed = 0i64;

    for (symbol, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let scaled = i64::from(count) * scale;
        let share = (scaled / total).max(1);
        normalized[symbol] = share as i16;
        distributed += share;
        fractions.push((scaled % total, symbol));
    }

    let mut diff = scale - distributed;
    if diff > 0 {
        // Hand the leftover states to the largest remainders.
        fractions.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        let mut i = 0;
        while diff > 0 {
            let symbol = fractions[i % fractions.len()].1;
            normalized[symbol] += 1;
            diff -= 1;
            i += 1;
        }
    }
    while diff < 0 {
        // Take from whichever symbol currently holds the most states.
        let (symbol, _) = normalized
            .iter()
            .enumerate()
            .max_by_key(|&(s, &n)| (n, std::cmp::Reverse(s)))?;
        if normalized[symbol] <= 1 {
            return None;
        }
        normalized[symbol] -= 1;
        diff += 1;
    }

    Some(normalized)
}

/// Serialize a normalized distribution as an FSE table header.
pub fn write_normalized_counts(normalized: &[i16], accuracy_log: u8, out: &mut BitWriter) {
    let table_size = 1i32 << accuracy_log;
    let alphabet = normalized
        .iter()
        .rposition(|&n| n != 0)
        .map_or(0, |last| last + 1);

    out.write_bits(u64::from(accuracy_log - FSE_MIN_ACCURACY_LOG), 4);

    let mut remaining = table_size + 1;
    let mut threshold = table_size;
    let mut width = u32::from(accuracy_log) + 1;
    let mut symbol = 0;
    let mut previous_zero = false;

    while symbol < alphabet && remaining > 1 {
        if previous_zero {
            let start = symbol;
            while symbol < alphabet && normalized[symbol] == 0 {
                symbol += 1;
            }
            let mut run = symbol - start;
            while run >= 3 {
                out.write_bits(3, 2);
                run -= 3;
            }
            out.write_bits(run as u64, 2);
        }

        let count = i32::from(normalized[symbol]);
        symbol += 1;
        let max = (2 * threshold - 1) - remaining;
        remaining -= count.abs();
        let mut value = count + 1;
        if value >= threshold {
            value += max;
        }
        let bits = if value < max { width - 1 } else { width };
        out.write_bits(value as u64, bits);
        previous_zero = value == 1;

        while remaining < threshold {
            width -= 1;
            threshold >>= 1;
        }
    }
}

// =============================================================================
// Encoding table
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SymbolTransform {
    delta_nb_bits: u32,
    delta_find_state: i32,
}

/// FSE encoding table built from a normalized distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FseEncodeTable {
    accuracy_log: u8,
    state_table: Vec<u16>,
    transforms: Vec<SymbolTransform>,
    normalized: Vec<i16>,
}

impl FseEncodeTable {
    /// Build the table. `normalized` must be a valid distribution for `accuracy_log`.
    pub fn new(normalized: &[i16], accuracy_log: u8) -> Self {
        let table_size = 1usize << accuracy_log;
        let mask = table_size - 1;
        let step = (table_size >> 1) + (table_size >> 3) + 3;

        let mut symbols = vec![0u8; table_size];
        let mut cumul = vec![0usize; normalized.len() + 1];
        let mut high_threshold = table_size - 1;
        for (s, &n) in normalized.iter().enumerate() {
            if n == -1 {
                cumul[s + 1] = cumul[s] + 1;
                symbols[high_threshold] = s as u8;
                high_threshold = high_threshold.wrapping_sub(1);
            } else {
                cumul[s + 1] = cumul[s] + n.max(0) as usize;
            }
        }

        let mut position = 0usize;
        for (s, &n) in normalized.iter().enumerate() {
            for _ in 0..n.max(0) {
                symbols[position] = s as u8;
                position = (position + step) & mask;
                while position > high_threshold {
                    position = (position + step) & mask;
                }
            }
        }

        let mut state_table = vec![0u16; table_size];
        for (u, &s) in symbols.iter().enumerate() {
            state_table[cumul[s as usize]] = (table_size + u) as u16;
            cumul[s as usize] += 1;
        }

        let log = u32::from(accuracy_log);
        let mut transforms = vec![SymbolTransform::default(); normalized.len()];
        let mut total = 0i32;
        for (s, &n) in normalized.iter().enumerate() {
            transforms[s] = match n {
                0 => SymbolTransform {
                    delta_nb_bits: ((log + 1) << 16).wrapping_sub(1 << log),
                    delta_find_state: 0,
                },
                -1 | 1 => {
                    let t = SymbolTransform {
                        delta_nb_bits: (log << 16).wrapping_sub(1 << log),
                        delta_find_state: total - 1,
                    };
                    total += 1;
                    t
                }
                _ => {
                    let n = n as u32;
                    let max_bits_out = log - highbit(n - 1);
                    let min_state_plus = n << max_bits_out;
                    let t = SymbolTransform {
                        delta_nb_bits: (max_bits_out << 16).wrapping_sub(min_state_plus),
                        delta_find_state: total - n as i32,
                    };
                    total += n as i32;
                    t
                }
            };
        }

        Self {
            accuracy_log,
            state_table,
            transforms,
            normalized: normalized.to_vec(),
        }
    }

    #[inline]
    pub fn accuracy_log(&self) -> u8 {
        self.accuracy_log
    }

    /// The distribution this table was built from.
    pub fn normalized(&self) -> &[i16] {
        &self.normalized
    }

    /// True if every symbol with a nonzero count has a state in this table.
    pub fn covers(&self, counts: &[u32]) -> bool {
        counts.iter().enumerate().all(|(s, &c)| {
            c == 0 || self.normalized.get(s).is_some_and(|&n| n != 0)
        })
    }

    /// Approximate cost in bits of coding `counts` with this table.
    ///
    /// Returns `None` if some present symbol has no state.
    pub fn estimate_bits(&self, counts: &[u32]) -> Option<f64> {
        if !self.covers(counts) {
            return None;
        }
        let log = f64::from(self.accuracy_log);
        Some(
            counts
                .iter()
                .zip(&self.normalized)
                .filter(|(&c, _)| c > 0)
                .map(|(&c, &n)| {
                    let n = if n == -1 { 1.0 } else { f64::from(n) };
                    f64::from(c) * (log - n.log2())
                })
                .sum(),
        )
    }
}

/// One FSE encoding state.
#[derive(Debug, Clone, Copy)]
pub struct FseEncoder {
    value: u32,
}

impl FseEncoder {
    /// Start a state positioned to emit `symbol` last (it is decoded first).
    pub fn new(table: &FseEncodeTable, symbol: u8) -> Self {
        let t = table.transforms[symbol as usize];
        let nb_bits_out = (t.delta_nb_bits.wrapping_add(1 << 15)) >> 16;
        let value = (nb_bits_out << 16).wrapping_sub(t.delta_nb_bits);
        let index = ((value >> nb_bits_out) as i32 + t.delta_find_state) as usize;
        Self {
            value: u32::from(table.state_table[index]),
        }
    }

    /// Emit the transition bits for `symbol` and move to its state.
    #[inline]
    pub fn encode(&mut self, table: &FseEncodeTable, symbol: u8, out: &mut BitWriter) {
        let t = table.transforms[symbol as usize];
        let nb_bits_out = self.value.wrapping_add(t.delta_nb_bits) >> 16;
        out.write_bits(u64::from(self.value), nb_bits_out);
        let index = ((self.value >> nb_bits_out) as i32 + t.delta_find_state) as usize;
        self.value = u32::from(table.state_table[index]);
    }

    /// Write the final state so the decoder can start from it.
    #[inline]
    pub fn flush(&self, table: &FseEncodeTable, out: &mut BitWriter) {
        out.write_bits(u64::from(self.value), u32::from(table.accuracy_log));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ByteCursor;
    use crate::fse::bits::BackwardBitReader;
    use crate::fse::table::{
        read_normalized_counts, FseState, FseTable, LITERAL_LENGTH_DEFAULT_DISTRIBUTION,
        MATCH_LENGTH_DEFAULT_DISTRIBUTION,
    };

    #[test]
    fn test_normalize_sums_to_table_size() {
        let counts = [100u32, 1, 1, 0, 50, 3, 0, 0, 7];
        let normalized = normalize_counts(&counts, 6).unwrap();
        let sum: i32 = normalized.iter().map(|&n| i32::from(n)).sum();
        assert_eq!(sum, 64);
        for (c, n) in counts.iter().zip(&normalized) {
            assert_eq!(*c == 0, *n == 0);
        }
    }

    #[test]
    fn test_normalize_rejects_too_many_symbols() {
        let counts = [1u32; 40];
        assert!(normalize_counts(&counts, 5).is_none());
        assert!(normalize_counts(&counts, 6).is_some());
    }

    #[test]
    fn test_optimal_log_bounds() {
        assert_eq!(optimal_accuracy_log(9, 10, 3), 5);
        assert_eq!(optimal_accuracy_log(9, 100_000, 35), 9);
        assert!(optimal_accuracy_log(9, 60, 52) >= 6);
    }

    #[test]
    fn test_ncount_round_trip() {
        for (dist, log) in [
            (LITERAL_LENGTH_DEFAULT_DISTRIBUTION.to_vec(), 6u8),
            (MATCH_LENGTH_DEFAULT_DISTRIBUTION.to_vec(), 6),
            (vec![0, 0, 0, 30, 0, 0, 0, 0, 0, 0, 1, 1], 5),
        ] {
            let mut writer = BitWriter::new();
            write_normalized_counts(&dist, log, &mut writer);
            let bytes = writer.finish();
            let mut cursor = ByteCursor::new(&bytes);
            let (parsed, parsed_log) = read_normalized_counts(&mut cursor, 255, 9).unwrap();
            assert_eq!(parsed_log, log);
            assert_eq!(parsed, dist);
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn test_encode_then_decode_symbols() {
        let counts = [40u32, 10, 5, 3, 1, 1];
        let log = 6;
        let normalized = normalize_counts(&counts, log).unwrap();
        let encode_table = FseEncodeTable::new(&normalized, log);
        let decode_table = FseTable::build(&normalized, log).unwrap();

        let pattern = [0u8, 0, 1, 0, 2, 0, 3, 1, 4, 5];
        let symbols: Vec<u8> = (0..200).map(|i| pattern[i % 10]).collect();

        let mut writer = BitWriter::new();
        let last = *symbols.last().unwrap();
        let mut state = FseEncoder::new(&encode_table, last);
        for &s in symbols.iter().rev().skip(1) {
            state.encode(&encode_table, s, &mut writer);
        }
        state.flush(&encode_table, &mut writer);
        let bytes = writer.close();

        let mut bits = BackwardBitReader::new(&bytes, 0).unwrap();
        let mut decoder = FseState::new(&decode_table, &mut bits);
        let mut decoded = Vec::new();
        for i in 0..symbols.len() {
            if i + 1 == symbols.len() {
                decoded.push(decoder.symbol(&decode_table));
            } else {
                decoded.push(decoder.decode(&decode_table, &mut bits));
            }
        }
        assert_eq!(decoded, symbols);
        assert_eq!(bits.remaining(), 0);
    }

    #[test]
    fn test_estimate_requires_coverage() {
        let table = FseEncodeTable::new(&[16, 16], 5);
        assert!(table.estimate_bits(&[3, 3, 1]).is_none());
        let bits = table.estimate_bits(&[3, 3]).unwrap();
        assert!((bits - 6.0).abs() < 1e-9);
    }
}
