/*
    amimfm

    Copyright 2025 The amimfm authors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/codec/mod.rs

    MFM bitcell encoding/decoding primitives and the checksums every
    track format handler is built on top of.
*/

//! MFM codec primitives: the four interleaving modes used to lay decoded
//! bytes onto a raw bitcell stream, CRC-CCITT, and the AmigaDOS longword
//! checksum.

/// The sync mark every Amiga MFM track aligns on: byte `0xA1` with one clock
/// bit suppressed, yielding the raw 32-bit pattern below when two are written
/// back to back (as virtually every handler does).
pub const SYNC_4489: u32 = 0x4489_4489;

/// A single encoded sync word, as it appears in `bc_raw` form.
pub const SYNC_WORD: u16 = 0x4489;

/// Initial value for CRC-CCITT accumulation (§4.1, §3 Stream.crc16_ccitt).
pub const CRC_CCITT_INITIAL: u16 = 0xFFFF;

/// Final XOR mask applied to the running XOR accumulator in the AmigaDOS
/// longword checksum (§4.1).
pub const AMIGADOS_CHECKSUM_MASK: u32 = 0x5555_5555;

/// How a block of raw bitcells maps onto decoded data bytes.
///
/// `n` below is the number of *decoded* bytes; raw layouts are stated in
/// terms of `n` to make the doubling explicit.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BitCellMode {
    /// `2n` raw bytes; decoded bytes are drawn from clock-bit positions.
    MfmEven,
    /// `2n` raw bytes; decoded bytes are drawn from data-bit positions.
    MfmOdd,
    /// `n` raw bytes of all-even words, then `n` raw bytes of all-odd words.
    MfmEvenOdd,
    /// `n` raw bytes of all-odd words, then `n` raw bytes of all-even words.
    MfmOddEven,
    /// Raw pass-through -- no decoding, used for verbatim sync/padding regions.
    Raw,
}

/// Returns the missing-clock bit for an MFM cell given the previous and
/// current data bits: a clock bit is set only when both are zero.
#[inline]
fn mfm_clock_bit(prev_data_bit: bool, data_bit: bool) -> bool {
    !prev_data_bit && !data_bit
}

/// Encode `n` decoded bytes into `2n` raw MFM bytes, using `prev_bit` as the
/// final data bit of whatever preceded this block (so the clock bit at the
/// start of the block is correct).
///
/// Returns the raw bytes and the final data bit emitted (to thread into a
/// subsequent call).
pub fn mfm_encode_bytes(data: &[u8], prev_bit: bool) -> (Vec<u8>, bool) {
    let mut raw = Vec::with_capacity(data.len() * 2);
    let mut prev = prev_bit;
    let mut raw_word: u16 = 0;
    let mut raw_bits = 0usize;

    let mut push_bit = |bit: bool, raw_word: &mut u16, raw_bits: &mut usize, out: &mut Vec<u8>| {
        *raw_word = (*raw_word << 1) | (bit as u16);
        *raw_bits += 1;
        if *raw_bits == 8 {
            out.push(*raw_word as u8);
            *raw_word = 0;
            *raw_bits = 0;
        }
    };

    for &byte in data {
        for i in (0..8).rev() {
            let bit = (byte >> i) & 1 != 0;
            let clock = mfm_clock_bit(prev, bit);
            push_bit(clock, &mut raw_word, &mut raw_bits, &mut raw);
            push_bit(bit, &mut raw_word, &mut raw_bits, &mut raw);
            prev = bit;
        }
    }

    (raw, prev)
}

/// Decode `2n` raw MFM bytes (clock bit then data bit per cell) into `n`
/// bytes, discarding the clock bits.
pub fn mfm_decode_raw_bytes(raw: &[u8]) -> Vec<u8> {
    let bits: Vec<bool> = raw
        .iter()
        .flat_map(|&b| (0..8).rev().map(move |i| (b >> i) & 1 != 0))
        .collect();

    // Every other bit (odd positions, 0-indexed: 1, 3, 5, ...) is data.
    let mut out = Vec::with_capacity(raw.len() / 2);
    let mut cur = 0u8;
    let mut cur_bits = 0usize;
    for chunk in bits.chunks_exact(2) {
        let data_bit = chunk[1];
        cur = (cur << 1) | (data_bit as u8);
        cur_bits += 1;
        if cur_bits == 8 {
            out.push(cur);
            cur = 0;
            cur_bits = 0;
        }
    }
    out
}

/// Decode a block of raw bitcell bytes according to `mode` into `n` decoded
/// bytes, where `n = out.len()`. `raw` must be exactly the length dictated by
/// the mode's layout (see [`BitCellMode`] docs), i.e. `2n` for `MfmEven`/
/// `MfmOdd`, and `2n` (n even + n odd, back to back) for the interleaved modes.
pub fn mfm_decode_bytes(mode: BitCellMode, raw: &[u8], out: &mut [u8]) {
    let n = out.len();
    match mode {
        BitCellMode::Raw => {
            out.copy_from_slice(&raw[..n]);
        }
        BitCellMode::MfmEven | BitCellMode::MfmOdd => {
            let decoded = mfm_decode_raw_bytes(&raw[..2 * n]);
            out.copy_from_slice(&decoded[..n]);
        }
        BitCellMode::MfmEvenOdd | BitCellMode::MfmOddEven => {
            // `n` raw "even" bytes hold the even-numbered bits of each output byte's
            // bitstream and `n` raw "odd" bytes hold the odd-numbered bits; each raw
            // byte here is itself an MFM-decoded byte carrying half the data bits of
            // two final bytes, packed 4 original bits each decode step. In practice
            // libdisk's even/odd split operates per *bit*, not per byte: the first
            // half of the block carries bit 7,5,3,1 of each output byte and the
            // second half carries bit 6,4,2,0. We reconstruct that here.
            let half = n;
            let (first, second) = raw.split_at(half);
            let (evens, odds) = match mode {
                BitCellMode::MfmEvenOdd => (first, second),
                _ => (second, first),
            };
            for i in 0..n {
                out[i] = interleave_even_odd(evens[i], odds[i]);
            }
        }
    }
}

/// Combine a byte of even-position bits and a byte of odd-position bits (each
/// left-packed, MSB-first) into the single decoded byte they represent. This
/// is the even/odd split used by `bc_mfm_even_odd` / `bc_mfm_odd_even`: each
/// raw byte already holds one MFM-decoded half of the final byte's bits,
/// alternating in final-bit position.
fn interleave_even_odd(even_byte: u8, odd_byte: u8) -> u8 {
    let mut out = 0u8;
    for i in 0..4 {
        let even_bit = (even_byte >> (7 - 2 * i)) & 1;
        let odd_bit = (odd_byte >> (6 - 2 * i)) & 1;
        out |= even_bit << (7 - 2 * i);
        out |= odd_bit << (6 - 2 * i);
    }
    out
}

/// Split a decoded byte into its even-position and odd-position bit bytes,
/// the inverse of [`interleave_even_odd`].
fn split_even_odd(byte: u8) -> (u8, u8) {
    let mut even = 0u8;
    let mut odd = 0u8;
    for i in 0..4 {
        even |= (byte >> (7 - 2 * i) & 1) << (7 - 2 * i);
        odd |= (byte >> (6 - 2 * i) & 1) << (6 - 2 * i);
    }
    (even, odd)
}

/// Encode `n` decoded bytes into raw bitcells according to `mode`. Returns
/// the raw byte sequence laid out as the mode's raw layout dictates.
/// `prev_bit` is the trailing data bit of whatever preceded this block.
pub fn mfm_encode_mode(mode: BitCellMode, data: &[u8], prev_bit: bool) -> (Vec<u8>, bool) {
    match mode {
        BitCellMode::Raw => (data.to_vec(), prev_bit),
        BitCellMode::MfmEven | BitCellMode::MfmOdd => mfm_encode_bytes(data, prev_bit),
        BitCellMode::MfmEvenOdd | BitCellMode::MfmOddEven => {
            let mut evens = Vec::with_capacity(data.len());
            let mut odds = Vec::with_capacity(data.len());
            for &byte in data {
                let (e, o) = split_even_odd(byte);
                evens.push(e);
                odds.push(o);
            }
            let raw = match mode {
                BitCellMode::MfmEvenOdd => [evens, odds].concat(),
                _ => [odds, evens].concat(),
            };
            let last_bit = data.last().map(|&b| b & 1 != 0).unwrap_or(prev_bit);
            (raw, last_bit)
        }
    }
}

/// Compute CRC-CCITT (poly `0x1021`, initial `0xFFFF`, no reflection, no final
/// XOR) over `data`, optionally continuing from a prior running value.
pub fn crc16_ccitt(data: &[u8], start: Option<u16>) -> u16 {
    const POLY: u16 = 0x1021;
    let mut crc = start.unwrap_or(CRC_CCITT_INITIAL);
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
        }
    }
    crc
}

/// Feed a single byte into a running CRC-CCITT accumulator.
pub fn crc16_ccitt_byte(byte: u8, crc: u16) -> u16 {
    crc16_ccitt(&[byte], Some(crc))
}

/// The AmigaDOS longword checksum: XOR all big-endian longwords in the region
/// with `0x55555555` and the result XORed with itself shifted right 1,
/// finally masked with `0x55555555`. `data.len()` must be a multiple of 4.
pub fn amigados_checksum(data: &[u8]) -> u32 {
    let mut csum: u32 = 0;
    for chunk in data.chunks_exact(4) {
        let word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        csum ^= word;
    }
    csum ^= csum >> 1;
    csum &= AMIGADOS_CHECKSUM_MASK;
    csum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mfm_round_trips_all_modes() {
        let data = [0x12u8, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
        for mode in [
            BitCellMode::MfmEven,
            BitCellMode::MfmOdd,
            BitCellMode::MfmEvenOdd,
            BitCellMode::MfmOddEven,
        ] {
            let (raw, _) = mfm_encode_mode(mode, &data, false);
            let mut out = vec![0u8; data.len()];
            mfm_decode_bytes(mode, &raw, &mut out);
            assert_eq!(out, data, "round trip failed for {:?}", mode);
        }
    }

    #[test]
    fn crc_of_self_appended_crc_is_zero() {
        let data = b"AMIGADOS TEST VECTOR";
        let crc = crc16_ccitt(data, None);
        let mut full = data.to_vec();
        full.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(crc16_ccitt(&full, None), 0);
    }

    #[test]
    fn crc_rolling_matches_batch() {
        let data = b"split across two calls of differing lengths";
        let batch = crc16_ccitt(data, None);
        let (first, second) = data.split_at(11);
        let partial = crc16_ccitt(first, None);
        let rolling = crc16_ccitt(second, Some(partial));
        assert_eq!(batch, rolling);
    }

    #[test]
    fn amigados_checksum_is_xor_linear() {
        let a = [0x11u8, 0x22, 0x33, 0x44, 0x01, 0x02, 0x03, 0x04];
        let b = [0xAAu8, 0xBB, 0xCC, 0xDD, 0xF0, 0xF1, 0xF2, 0xF3];
        let concatenated: Vec<u8> = a.iter().chain(b.iter()).copied().collect();
        let combined = amigados_checksum(&concatenated);
        let separate = amigados_checksum(&a) ^ amigados_checksum(&b);
        assert_eq!(combined, separate);
    }
}
