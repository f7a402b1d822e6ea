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

    src/tbuf.rs

    The write-side counterpart to `stream`: handlers build the re-encoded
    bitcell image of a track into a `TrackBuffer`, one bit/byte/gap/weak
    region at a time, with a running CRC and a reproducible PRNG for gap
    filler and weak-bit jitter.
*/

//! Accumulates a re-encoded bitcell image of a track: decoded bytes, MFM
//! gaps, weak-bit regions, and a running CRC, each written at a known
//! per-cell write-speed.

use bit_vec::BitVec;

use crate::codec::{crc16_ccitt_byte, mfm_encode_mode, BitCellMode, CRC_CCITT_INITIAL};
use crate::random::PseudoRandom;

/// Nominal write speed, in 0.1% units (`1000` = nominal bitcell period).
pub const SPEED_NOMINAL: u16 = 1000;

/// Write-side bitcell accumulator for one track.
///
/// Grounded on libdisk's `struct tbuf` (`private/util.h`): a flat bit array
/// is built up alongside a parallel per-cell speed array, with weak regions
/// marked separately since they do not correspond to a single deterministic
/// bit value.
pub struct TrackBuffer {
    bits: BitVec,
    speed: Vec<u16>,
    /// Bitcell ranges marked weak/flakey: `(start, len)` pairs, measured in
    /// bitcells from the start of the buffer.
    weak: Vec<(u32, u32)>,

    last_bit: bool,
    gap_fill_byte: u8,

    crc_armed: bool,
    crc16_ccitt: u16,
    crc_pending_bits: u8,
    crc_pending_count: u8,

    rnd: PseudoRandom,
}

impl TrackBuffer {
    /// Create an empty buffer seeded with `prng_seed` for [`TrackBuffer::rnd16`].
    pub fn new(prng_seed: u32) -> Self {
        TrackBuffer {
            bits: BitVec::new(),
            speed: Vec::new(),
            weak: Vec::new(),
            last_bit: false,
            gap_fill_byte: 0xAA,
            crc_armed: false,
            crc16_ccitt: CRC_CCITT_INITIAL,
            crc_pending_bits: 0,
            crc_pending_count: 0,
            rnd: PseudoRandom::new(if prng_seed == 0 { 0x1234_5678 } else { prng_seed }),
        }
    }

    /// Number of bitcells written so far.
    pub fn len_bits(&self) -> u32 {
        self.bits.len() as u32
    }

    fn push_raw_bit(&mut self, bit: bool, speed: u16) {
        self.bits.push(bit);
        self.speed.push(speed);
        self.last_bit = bit;
        if self.crc_armed {
            self.crc_pending_bits = (self.crc_pending_bits << 1) | (bit as u8);
            self.crc_pending_count += 1;
            if self.crc_pending_count == 8 {
                self.crc16_ccitt = crc16_ccitt_byte(self.crc_pending_bits, self.crc16_ccitt);
                self.crc_pending_bits = 0;
                self.crc_pending_count = 0;
            }
        }
    }

    /// Write `n` raw bitcells taken MSB-first from `word`, at `speed` (0.1%
    /// units). Used for sync marks and other verbatim bitcell sequences.
    pub fn bits(&mut self, word: u32, n: u32, speed: u16) {
        for i in (0..n).rev() {
            self.push_raw_bit((word >> i) & 1 != 0, speed);
        }
    }

    /// MFM-encode `data` under `mode` and append the resulting bitcells, at
    /// `speed` (0.1% units).
    pub fn bytes(&mut self, mode: BitCellMode, data: &[u8], speed: u16) {
        let (raw, last_bit) = mfm_encode_mode(mode, data, self.last_bit);
        for &byte in &raw {
            for i in (0..8).rev() {
                self.push_raw_bit((byte >> i) & 1 != 0, speed);
            }
        }
        self.last_bit = last_bit;
    }

    /// Append `n` gap bytes, MFM-encoded from the configured gap filler byte
    /// (`0x00` under most handlers, `0xAA`/`0x4E` under others; see
    /// [`TrackBuffer::set_gap_fill_byte`]).
    pub fn gap(&mut self, n: usize, speed: u16) {
        let byte = self.gap_fill_byte;
        let data = vec![byte; n];
        self.bytes(BitCellMode::MfmEven, &data, speed);
    }

    /// Set the byte used to fill subsequent [`TrackBuffer::gap`] regions.
    pub fn set_gap_fill_byte(&mut self, byte: u8) {
        self.gap_fill_byte = byte;
    }

    /// Mark the most recently written `n` bitcells as weak/flakey: their
    /// values are non-deterministic and a reader must not depend on them.
    /// The actual bits already written stand in as one arbitrary realization.
    pub fn weak(&mut self, n: u32) {
        let start = self.bits.len() as u32 - n;
        self.weak.push((start, n));
    }

    /// Arm the running CRC over subsequently written bytes.
    pub fn start_crc(&mut self) {
        self.crc_armed = true;
        self.crc16_ccitt = CRC_CCITT_INITIAL;
        self.crc_pending_bits = 0;
        self.crc_pending_count = 0;
    }

    /// Append the two-byte CRC-CCITT accumulated since [`TrackBuffer::start_crc`],
    /// MFM-encoded under `mode`, and disarm the accumulator.
    pub fn emit_crc16_ccitt(&mut self, mode: BitCellMode, speed: u16) {
        let crc = self.crc16_ccitt;
        self.crc_armed = false;
        self.bytes(mode, &crc.to_be_bytes(), speed);
    }

    /// The reproducible PRNG libdisk handlers use for weak-bit jitter and gap
    /// padding, seeded from the value passed to [`TrackBuffer::new`] so that
    /// repeated re-encodes of the same track are bit-identical. See
    /// [`crate::random::PseudoRandom`] for the feature-gated source.
    pub fn rnd16(&mut self) -> u16 {
        self.rnd.next_u16()
    }

    /// Consume the buffer, returning `(packed bits, per-cell speed, bitlen)`
    /// ready to hand to [`crate::stream::SoftStream::new`] or a container writer.
    pub fn materialize(self) -> (Vec<u8>, Vec<u16>, u32) {
        let bitlen = self.bits.len() as u32;
        let mut packed = vec![0u8; ((bitlen as usize) + 7) / 8];
        for (i, bit) in self.bits.iter().enumerate() {
            if bit {
                packed[i / 8] |= 0x80 >> (i % 8);
            }
        }
        (packed, self.speed, bitlen)
    }

    /// Bitcell ranges marked weak via [`TrackBuffer::weak`], as `(start, len)`
    /// pairs relative to the start of the buffer.
    pub fn weak_regions(&self) -> &[(u32, u32)] {
        &self.weak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_reports_total_bitcells_written() {
        let mut tbuf = TrackBuffer::new(1);
        tbuf.bits(0x4489, 16, SPEED_NOMINAL);
        tbuf.bytes(BitCellMode::MfmEven, &[0x00, 0xFF, 0x55], SPEED_NOMINAL);
        let written = tbuf.len_bits();
        let (_, speed, bitlen) = tbuf.materialize();
        assert_eq!(bitlen, written);
        assert_eq!(speed.len() as u32, bitlen);
    }

    #[test]
    fn crc_matches_direct_computation() {
        let mut tbuf = TrackBuffer::new(42);
        let payload = [0x11u8, 0x22, 0x33, 0x44];
        tbuf.start_crc();
        tbuf.bytes(BitCellMode::Raw, &payload, SPEED_NOMINAL);
        let expected = crate::codec::crc16_ccitt(&payload, None);
        assert_eq!(tbuf.crc16_ccitt, expected);
    }

    #[test]
    fn rnd16_is_reproducible_given_same_seed() {
        let mut a = TrackBuffer::new(99);
        let mut b = TrackBuffer::new(99);
        let seq_a: Vec<u16> = (0..8).map(|_| a.rnd16()).collect();
        let seq_b: Vec<u16> = (0..8).map(|_| b.rnd16()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn weak_region_covers_just_written_bits() {
        let mut tbuf = TrackBuffer::new(7);
        tbuf.bytes(BitCellMode::Raw, &[0xAA], SPEED_NOMINAL);
        let before = tbuf.len_bits();
        tbuf.bytes(BitCellMode::Raw, &[0x55, 0x55], SPEED_NOMINAL);
        tbuf.weak(16);
        assert_eq!(tbuf.weak_regions(), &[(before, 16)]);
    }
}
