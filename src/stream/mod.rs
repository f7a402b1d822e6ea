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

    src/stream/mod.rs

    The read-side bit/flux abstraction: a PLL-driven, index-pulse-aware,
    CRC-tracking window over any [`backend::StreamBackend`]. Every format
    handler reads a track exclusively through a `Stream`, never touching
    a backend directly.
*/

//! A rewindable, PLL-decoded stream of MFM bitcells, with index-pulse and
//! rolling-CRC tracking layered on top of any flux source.

pub mod backend;
pub mod flux;
pub mod pll;
pub mod rpm;
pub mod soft;

use std::collections::VecDeque;

use log::{debug, trace};

use crate::codec::{crc16_ccitt_byte, CRC_CCITT_INITIAL};
use crate::DiskImageError;

pub use backend::{FluxEvent, StreamBackend};
pub use flux::open;
pub use soft::SoftStream;

/// A PLL-decoded bit stream over one track, grounded on libdisk's
/// `struct stream` (`private/stream.h`).
pub struct Stream {
    backend: Box<dyn StreamBackend>,

    pll: pll::PllState,

    /// Bitcells decoded since the start of the current index revolution.
    index_offset_bc: u32,
    /// Nanoseconds elapsed since the start of the current index revolution.
    index_offset_ns: u64,
    /// Cumulative nanoseconds consumed since the stream was opened or reset;
    /// unlike `index_offset_ns` this does not reset on an index pulse, so a
    /// handler can time an arbitrary region by sampling it before and after
    /// (e.g. the clock-jitter scan `unformatted` uses to recognize white
    /// noise).
    latency_ns: u64,
    /// Per-pending-bit nanosecond contribution, parallel to `pending`.
    pending_ns: VecDeque<u32>,
    /// Length of the most recently completed revolution, in bitcells.
    pub track_len_bc: u32,
    /// Length of the most recently completed revolution, in nanoseconds.
    pub track_len_ns: u64,
    /// Number of index pulses seen since the stream was opened or last reset.
    pub nr_index: u32,
    /// Upper bound on revolutions to read before declaring end of stream; a
    /// handler unable to find its sync pattern within this many revolutions
    /// gives up rather than spinning forever on noise.
    max_revolutions: u32,

    /// Rolling shift register of the most recently decoded bits, MSB-first;
    /// handlers match sync patterns against this.
    word: u32,

    /// `true` once a caller has armed the running CRC via [`Stream::start_crc`].
    crc_armed: bool,
    /// Running CRC-CCITT of decoded data bytes since arming, byte-aligned.
    crc16_ccitt: u16,
    /// Bits accumulated towards the next CRC byte boundary.
    crc_pending_bits: u8,
    crc_pending_count: u8,

    /// `true` for a 40-cylinder image read on an 80-cylinder drive: every
    /// other physical track is a repeat of the one before it.
    pub double_step: bool,

    pending: VecDeque<bool>,

    /// Reproducible pseudo-random seed a handler may draw weak-bit jitter
    /// from; distinct from [`crate::tbuf::TrackBuffer`]'s write-side `rnd16`.
    pub prng_seed: u32,
}

impl Stream {
    /// Open a stream over `backend`, seeding the PLL's centre clock from the
    /// backend's nominal RPM and `bitlen` bitcells/revolution at double
    /// density (see [`rpm::ns_per_cell_from_rpm`]).
    pub fn new(backend: Box<dyn StreamBackend>) -> Self {
        let clock_centre = rpm::ns_per_cell_from_rpm(
            backend.data_rpm(),
            rpm::NOMINAL_BITS_PER_TRACK_DD,
        ) as i32;

        Stream {
            backend,
            pll: pll::PllState::new(clock_centre),
            index_offset_bc: 0,
            index_offset_ns: 0,
            track_len_bc: 0,
            track_len_ns: 0,
            nr_index: 0,
            max_revolutions: 3,
            word: 0,
            crc_armed: false,
            crc16_ccitt: CRC_CCITT_INITIAL,
            crc_pending_bits: 0,
            crc_pending_count: 0,
            double_step: false,
            pending: VecDeque::new(),
            prng_seed: 0,
            latency_ns: 0,
            pending_ns: VecDeque::new(),
        }
    }

    /// Seek the backend to `tracknr` and reset all per-track decode state.
    pub fn select_track(&mut self, tracknr: u32) -> Result<(), DiskImageError> {
        self.backend.select_track(tracknr)?;
        self.reset();
        Ok(())
    }

    /// Rewind to the origin of the current track without re-seeking the backend.
    pub fn reset(&mut self) {
        self.backend.reset();
        self.index_offset_bc = 0;
        self.index_offset_ns = 0;
        self.nr_index = 0;
        self.word = 0;
        self.pending.clear();
        self.pending_ns.clear();
        self.latency_ns = 0;
        self.crc_armed = false;
        self.crc16_ccitt = CRC_CCITT_INITIAL;
        self.crc_pending_bits = 0;
        self.crc_pending_count = 0;
    }

    /// Set the maximum number of index-to-index revolutions this stream will
    /// read before [`Stream::next_bit`] reports end of stream.
    pub fn set_max_revolutions(&mut self, max_revolutions: u32) {
        self.max_revolutions = max_revolutions;
    }

    /// Arm the running CRC-CCITT accumulator: from the next decoded data byte
    /// onward, every byte feeds [`Stream::crc`].
    pub fn start_crc(&mut self) {
        self.crc_armed = true;
        self.crc16_ccitt = CRC_CCITT_INITIAL;
        self.crc_pending_bits = 0;
        self.crc_pending_count = 0;
    }

    /// The running CRC-CCITT since the most recent [`Stream::start_crc`], valid
    /// only at a byte boundary.
    pub fn crc(&self) -> u16 {
        self.crc16_ccitt
    }

    /// The last 32 decoded bits, MSB-first; handlers scan this for sync marks.
    pub fn word(&self) -> u32 {
        self.word
    }

    /// Nominal bitcell window length currently tracked by the PLL, in
    /// nanoseconds; `900..=1100` per-mille of this is the expected envelope
    /// for conforming handlers (§8).
    pub fn clock(&self) -> i32 {
        self.pll.clock
    }

    /// Bitcells decoded since the most recent index pulse (or since the
    /// stream was opened/reset, if no index has been crossed yet). Handlers
    /// sample this right after matching a sync pattern to compute
    /// [`crate::disk::TrackInfo::data_bitoff`].
    pub fn index_offset_bc(&self) -> u32 {
        self.index_offset_bc
    }

    /// Cumulative nanoseconds consumed since the stream was opened or last
    /// reset (§3's `latency`); a handler times an arbitrary region by
    /// sampling this before and after, e.g. the `unformatted` handler's
    /// per-bit clock-jitter scan or `speedlock`'s variable-density probe.
    pub fn latency_ns(&self) -> u64 {
        self.latency_ns
    }

    fn feed_crc(&mut self, bit: bool) {
        if !self.crc_armed {
            return;
        }
        self.crc_pending_bits = (self.crc_pending_bits << 1) | (bit as u8);
        self.crc_pending_count += 1;
        if self.crc_pending_count == 8 {
            self.crc16_ccitt = crc16_ccitt_byte(self.crc_pending_bits, self.crc16_ccitt);
            self.crc_pending_bits = 0;
            self.crc_pending_count = 0;
        }
    }

    /// Decode and return the next single MFM bitcell, or `None` once
    /// `max_revolutions` index pulses have been crossed without the caller
    /// finding what it was looking for.
    pub fn next_bit(&mut self) -> Option<bool> {
        if self.pending.is_empty() {
            let event = self.backend.next_flux()?;
            let (flux_ns, is_index) = match event {
                FluxEvent::Flux(ns) => (ns, false),
                FluxEvent::Index(ns) => (ns, true),
            };

            let k = self.pll.resolve(flux_ns);
            let ns_per_bit = flux_ns / k;
            let remainder = flux_ns - ns_per_bit * k;
            for _ in 1..k {
                self.pending.push_back(false);
                self.pending_ns.push_back(ns_per_bit);
            }
            self.pending.push_back(true);
            self.pending_ns.push_back(ns_per_bit + remainder);

            self.index_offset_ns += flux_ns as u64;

            if is_index {
                self.track_len_bc = self.index_offset_bc + k;
                self.track_len_ns = self.index_offset_ns;
                self.index_offset_bc = 0;
                self.index_offset_ns = 0;
                self.nr_index += 1;
                trace!(
                    "stream: index pulse #{} after {} bitcells ({} ns)",
                    self.nr_index, self.track_len_bc, self.track_len_ns
                );
                if self.nr_index > self.max_revolutions {
                    debug!("stream: exceeded max_revolutions without resolution");
                    return None;
                }
            }
        }

        let bit = self.pending.pop_front()?;
        let bit_ns = self.pending_ns.pop_front().unwrap_or(0);
        self.index_offset_bc += 1;
        self.latency_ns += bit_ns as u64;
        self.word = (self.word << 1) | (bit as u32);
        self.feed_crc(bit);
        Some(bit)
    }

    /// Decode and return the next `n` bitcells, MSB-first in the returned value.
    pub fn next_bits(&mut self, n: u32) -> Option<u32> {
        let mut word = 0u32;
        for _ in 0..n {
            word = (word << 1) | (self.next_bit()? as u32);
        }
        Some(word)
    }

    /// Decode and return the next `n` bytes (`8n` bitcells), MSB-first per byte.
    pub fn next_bytes(&mut self, n: usize) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.next_bits(8)? as u8);
        }
        Some(out)
    }

    /// Decode bitcells up to and including the next index pulse, discarding
    /// them; used by handlers that align to the index before searching for a
    /// sync mark.
    pub fn next_index(&mut self) -> Option<()> {
        let start = self.nr_index;
        while self.nr_index == start {
            self.next_bit()?;
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitvec_to_bytes(bits: &[bool]) -> Vec<u8> {
        let mut out = vec![0u8; (bits.len() + 7) / 8];
        for (i, &b) in bits.iter().enumerate() {
            if b {
                out[i / 8] |= 0x80 >> (i % 8);
            }
        }
        out
    }

    #[test]
    fn decodes_known_bit_pattern_back_out() {
        // 16 arbitrary bitcells, repeated to make a full (tiny) "track".
        let pattern = [
            true, false, false, true, false, true, false, false, true, true, false, false, true,
            false, true, false,
        ];
        let bytes = bitvec_to_bytes(&pattern);
        let backend = SoftStream::new(bytes, None, pattern.len() as u32, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));

        let mut decoded = Vec::new();
        for _ in 0..pattern.len() {
            decoded.push(stream.next_bit().expect("bit available"));
        }
        assert_eq!(decoded, pattern);
    }

    #[test]
    fn index_pulse_reports_full_track_length() {
        let pattern = [true, false, true, false, true, false, true, false];
        let bytes = bitvec_to_bytes(&pattern);
        let backend = SoftStream::new(bytes, None, pattern.len() as u32, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));

        for _ in 0..pattern.len() {
            stream.next_bit().unwrap();
        }
        assert_eq!(stream.nr_index, 1);
        assert_eq!(stream.track_len_bc, pattern.len() as u32);
    }

    #[test]
    fn crc_is_stable_once_armed_at_byte_boundary() {
        let data: Vec<u8> = b"SYNCDATA".to_vec();
        let bits: Vec<bool> = data
            .iter()
            .flat_map(|&b| (0..8).rev().map(move |i| (b >> i) & 1 != 0))
            .collect();
        let bytes = bitvec_to_bytes(&bits);
        let backend = SoftStream::new(bytes, None, bits.len() as u32, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));

        stream.start_crc();
        for _ in 0..data.len() * 8 {
            stream.next_bit().unwrap();
        }
        let expected = crate::codec::crc16_ccitt(&data, None);
        assert_eq!(stream.crc(), expected);
    }
}
