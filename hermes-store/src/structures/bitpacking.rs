//! Packed-integer helpers for the store block index and chunk headers
//!
//! Values are written at a fixed bit width with no per-value framing, in
//! little-endian bit order. A run of `n` values at `b` bits occupies exactly
//! `ceil(n * b / 8)` bytes; only the tail of the run is padded.

/// Compute the number of bits needed to represent `val` (0 for 0).
#[inline]
pub fn bits_needed_u64(val: u64) -> u8 {
    if val == 0 {
        0
    } else {
        64 - val.leading_zeros() as u8
    }
}

/// Bit width used by the packed writer: never less than one bit.
#[inline]
pub fn bits_required(max_val: u64) -> u8 {
    bits_needed_u64(max_val).max(1)
}

/// Zigzag-encode an i64 so small magnitudes of either sign stay small.
#[inline]
pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Zigzag-decode a u64 back to i64.
#[inline]
pub fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Number of bytes occupied by `count` values packed at `bits_per_value`.
#[inline]
pub fn packed_len(count: usize, bits_per_value: u8) -> usize {
    (count * bits_per_value as usize).div_ceil(8)
}

/// Pack `values` at `bits_per_value` bits each, appending to `out`.
///
/// Callers guarantee every value fits in `bits_per_value` bits.
pub fn bitpack_write(values: &[u64], bits_per_value: u8, out: &mut Vec<u8>) {
    if bits_per_value == 0 {
        return;
    }
    let bpv = bits_per_value as usize;
    let total_bytes = packed_len(values.len(), bits_per_value);

    let start = out.len();
    out.resize(start + total_bytes, 0);
    let buf = &mut out[start..];

    for (i, &val) in values.iter().enumerate() {
        let bit_offset = i * bpv;
        let mut remaining_bits = bpv;
        let mut v = val;
        let mut bo = bit_offset / 8;
        let mut bs = bit_offset % 8;

        while remaining_bits > 0 {
            let can_write = (8 - bs).min(remaining_bits);
            let mask = (1u64 << can_write) - 1;
            buf[bo] |= ((v & mask) << bs) as u8;
            v >>= can_write;
            remaining_bits -= can_write;
            bo += 1;
            bs = 0;
        }
    }
}

/// Read the value at `index` from bit-packed data.
///
/// Bytes beyond the end of `data` read as zero; callers validate the run
/// length with [`packed_len`] before reading.
#[inline]
pub fn bitpack_read(data: &[u8], bits_per_value: u8, index: usize) -> u64 {
    if bits_per_value == 0 {
        return 0;
    }
    let bpv = bits_per_value as usize;
    let bit_offset = index * bpv;
    let byte_offset = bit_offset / 8;
    let bit_shift = bit_offset % 8;

    // Single unaligned LE u64 load when all needed bits fit in 8 bytes
    if bit_shift + bpv <= 64 && byte_offset + 8 <= data.len() {
        let mut word = [0u8; 8];
        word.copy_from_slice(&data[byte_offset..byte_offset + 8]);
        let raw = u64::from_le_bytes(word);
        let mask = if bpv >= 64 {
            u64::MAX
        } else {
            (1u64 << bpv) - 1
        };
        return (raw >> bit_shift) & mask;
    }

    let mut result: u64 = 0;
    let mut remaining_bits = bpv;
    let mut bo = byte_offset;
    let mut bs = bit_shift;
    let mut out_shift = 0;

    while remaining_bits > 0 {
        let can_read = (8 - bs).min(remaining_bits);
        let mask = ((1u64 << can_read) - 1) as u8;
        let byte_val = data.get(bo).copied().unwrap_or(0);
        result |= (((byte_val >> bs) & mask) as u64) << out_shift;
        remaining_bits -= can_read;
        out_shift += can_read;
        bo += 1;
        bs = 0;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_needed() {
        assert_eq!(bits_needed_u64(0), 0);
        assert_eq!(bits_needed_u64(1), 1);
        assert_eq!(bits_needed_u64(255), 8);
        assert_eq!(bits_needed_u64(256), 9);
        assert_eq!(bits_needed_u64(u64::MAX), 64);
        assert_eq!(bits_required(0), 1);
        assert_eq!(bits_required(7), 3);
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        for v in [0i64, 1, -1, 63, -64, i64::MAX, i64::MIN, 123_456_789] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
    }

    #[test]
    fn test_pack_unpack_odd_widths() {
        for bits in [1u8, 3, 7, 13, 31, 33, 57, 63, 64] {
            let max = if bits == 64 {
                u64::MAX
            } else {
                (1u64 << bits) - 1
            };
            let values: Vec<u64> = (0..37u64)
                .map(|i| max.wrapping_sub(i.wrapping_mul(0x9E37_79B9_7F4A_7C15)) & max)
                .collect();
            let mut buf = Vec::new();
            bitpack_write(&values, bits, &mut buf);
            assert_eq!(buf.len(), packed_len(values.len(), bits));
            for (i, &v) in values.iter().enumerate() {
                assert_eq!(bitpack_read(&buf, bits, i), v, "bits={} index={}", bits, i);
            }
        }
    }

    #[test]
    fn test_no_padding_between_values() {
        // 3 values at 3 bits = 9 bits = 2 bytes
        let mut buf = Vec::new();
        bitpack_write(&[0b101, 0b011, 0b111], 3, &mut buf);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf[0], 0b1101_1101);
        assert_eq!(buf[1], 0b0000_0001);
    }
}
