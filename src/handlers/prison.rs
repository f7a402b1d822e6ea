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

    src/handlers/prison.rs

    A protection track carrying a deliberately non-deterministic ("weak" or
    "flakey") region: a run of bitcells the original hardware wrote with no
    stable clock/data relationship, used as a copy-protection check that a
    byte-for-byte dump cannot reproduce (§8 concrete scenario #4).

    `write_raw` only claims the track once it has read the flagged region
    twice, across two revolutions, and confirmed the two reads differ --
    a single-pass read cannot distinguish this format from a deterministic
    track that merely has a suspicious-looking fixed value in that range.
*/

use crate::codec::{mfm_decode_bytes, BitCellMode, SYNC_4489};
use crate::disk::{Disk, TrackInfoFlags};
use crate::handler::{DecodedTrack, Handler};
use crate::stream::Stream;
use crate::tbuf::TrackBuffer;
use crate::DiskImageError;

const PAYLOAD_BYTES: usize = 512;
const WEAK_CELLS: u32 = 128;

#[derive(Clone)]
pub struct Prison;

impl Handler for Prison {
    fn name(&self) -> &'static str {
        "prison"
    }

    fn geometry(&self) -> (u16, u8) {
        (PAYLOAD_BYTES as u16, 1)
    }

    fn write_raw(
        &self,
        _disk: &Disk,
        _tracknr: u16,
        stream: &mut Stream,
    ) -> Result<Option<DecodedTrack>, DiskImageError> {
        stream.set_max_revolutions(3);

        // Locate the sync, decode the payload, and read the flagged region's
        // raw bits for one revolution. Returns `None` on any stream failure.
        let decode_revolution = |stream: &mut Stream| -> Option<(u32, Vec<u8>, Vec<bool>)> {
            loop {
                match stream.next_bit() {
                    Some(_) => {
                        if stream.word() == SYNC_4489 {
                            break;
                        }
                    }
                    None => return None,
                }
            }
            let data_bitoff = stream.index_offset_bc().saturating_sub(31);

            let raw = stream.next_bytes(PAYLOAD_BYTES * 2)?;
            let mut payload = vec![0u8; PAYLOAD_BYTES];
            mfm_decode_bytes(BitCellMode::MfmEven, &raw, &mut payload);

            let mut weak_bits = Vec::with_capacity(WEAK_CELLS as usize);
            for _ in 0..WEAK_CELLS {
                weak_bits.push(stream.next_bit()?);
            }

            Some((data_bitoff, payload, weak_bits))
        };

        let (data_bitoff, payload, first_pass) = match decode_revolution(stream) {
            Some(v) => v,
            None => return Ok(None),
        };

        // A genuinely weak region must read differently on a second pass; a
        // track whose flagged bits are stable across revolutions is not this
        // format, it just has a fixed value that happens to sit in the same
        // range.
        if stream.next_index().is_none() {
            return Ok(None);
        }
        let second_pass = match decode_revolution(stream) {
            Some((_, _, weak_bits)) => weak_bits,
            None => return Ok(None),
        };
        if first_pass == second_pass {
            return Ok(None);
        }

        Ok(Some(DecodedTrack {
            payload,
            data_bitoff,
            total_bits: None,
            valid_sectors: 1,
            flags: TrackInfoFlags::HAS_WEAK_BITS,
        }))
    }

    fn read_raw(
        &self,
        disk: &Disk,
        tracknr: u16,
        tbuf: &mut TrackBuffer,
    ) -> Result<(), DiskImageError> {
        let info = disk.track(tracknr).ok_or(DiskImageError::SeekError)?;
        if info.payload.len() != PAYLOAD_BYTES {
            return Err(DiskImageError::IncompatibleWrite {
                tracknr,
                type_name: self.name().to_string(),
            });
        }

        tbuf.gap(16, 1000);
        tbuf.bits(SYNC_4489, 32, 1000);
        tbuf.bytes(BitCellMode::MfmEven, &info.payload, 1000);

        // Fill the weak region with whatever the reproducible PRNG produces;
        // any reader of this track must treat these bitcells as undefined,
        // not depend on this particular realization.
        for _ in 0..(WEAK_CELLS / 16) {
            let word = tbuf.rnd16();
            tbuf.bits(word as u32, 16, 1000);
        }
        tbuf.weak(WEAK_CELLS);
        tbuf.gap(16, 1000);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{rpm, FluxEvent, StreamBackend};

    /// A two-revolution backend: revolution 0 and revolution 1 are each a
    /// packed bit buffer with its own length, so a handler reading across an
    /// index crossing sees genuinely distinct content per pass -- unlike
    /// [`crate::stream::SoftStream`], which loops a single static buffer and
    /// so can never exercise a weak-bit handler's cross-revolution check.
    struct TwoRevBackend {
        revs: [(Vec<u8>, u32); 2],
        rev_idx: usize,
        pos: u32,
        ns_per_cell: u32,
    }

    impl TwoRevBackend {
        fn new(rev0: (Vec<u8>, u32), rev1: (Vec<u8>, u32), data_rpm: u32) -> Self {
            let ns_per_cell = rpm::ns_per_cell_from_rpm(data_rpm, rev0.1);
            TwoRevBackend {
                revs: [rev0, rev1],
                rev_idx: 0,
                pos: 0,
                ns_per_cell,
            }
        }

        fn bit_at(&self, pos: u32) -> bool {
            let (data, _) = &self.revs[self.rev_idx];
            let byte = data[(pos >> 3) as usize];
            (byte & (0x80 >> (pos & 7))) != 0
        }
    }

    impl StreamBackend for TwoRevBackend {
        fn select_track(&mut self, _tracknr: u32) -> Result<(), DiskImageError> {
            Ok(())
        }

        fn reset(&mut self) {
            self.rev_idx = 0;
            self.pos = 0;
        }

        fn next_flux(&mut self) -> Option<FluxEvent> {
            loop {
                let bitlen = self.revs[self.rev_idx].1;
                let bit = self.bit_at(self.pos);
                let at_end = self.pos + 1 >= bitlen;
                self.pos += 1;
                let flux = self.ns_per_cell;
                if at_end {
                    self.pos = 0;
                    self.rev_idx = (self.rev_idx + 1) % self.revs.len();
                    return Some(FluxEvent::Index(flux));
                }
                if bit {
                    return Some(FluxEvent::Flux(flux));
                }
            }
        }

        fn data_rpm(&self) -> u32 {
            rpm::DEFAULT_RPM
        }
    }

    /// Build one revolution's bits: gap, sync, payload, then `WEAK_CELLS`
    /// bits of `weak_fill` repeated, then a closing gap -- the same shape
    /// `Prison::read_raw` writes, with the weak fill pinned to a known value
    /// instead of drawn from the buffer's PRNG so a test can control whether
    /// two revolutions agree.
    fn build_revolution(payload: &[u8], weak_fill: u16) -> (Vec<u8>, u32) {
        let mut tbuf = TrackBuffer::new(1);
        tbuf.gap(16, 1000);
        tbuf.bits(SYNC_4489, 32, 1000);
        tbuf.bytes(BitCellMode::MfmEven, payload, 1000);
        for _ in 0..(WEAK_CELLS / 16) {
            tbuf.bits(weak_fill as u32, 16, 1000);
        }
        tbuf.gap(16, 1000);
        let (bits, _speed, bitlen) = tbuf.materialize();
        (bits, bitlen)
    }

    #[test]
    fn claims_the_track_when_the_weak_region_differs_across_revolutions() {
        let payload: Vec<u8> = (0..PAYLOAD_BYTES).map(|i| (i * 3 + 1) as u8).collect();
        let rev0 = build_revolution(&payload, 0x0000);
        let rev1 = build_revolution(&payload, 0xFFFF);

        let backend = TwoRevBackend::new(rev0, rev1, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));

        let disk = Disk::new();
        let handler = Prison;
        let decoded = handler.write_raw(&disk, 4, &mut stream).unwrap().unwrap();
        assert_eq!(decoded.payload, payload);
        assert!(decoded.flags.contains(crate::disk::TrackInfoFlags::HAS_WEAK_BITS));
    }

    #[test]
    fn rejects_a_track_whose_flagged_region_is_stable_across_revolutions() {
        let payload: Vec<u8> = (0..PAYLOAD_BYTES).map(|i| (i * 3 + 1) as u8).collect();
        let rev0 = build_revolution(&payload, 0x5555);
        let rev1 = build_revolution(&payload, 0x5555);

        let backend = TwoRevBackend::new(rev0, rev1, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));

        let disk = Disk::new();
        let handler = Prison;
        let decoded = handler.write_raw(&disk, 4, &mut stream).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn read_raw_marks_exactly_one_weak_region_of_the_expected_length() {
        let payload: Vec<u8> = (0..PAYLOAD_BYTES).map(|i| (i * 3 + 1) as u8).collect();
        let mut disk = Disk::new();
        disk.set_track(
            4,
            crate::disk::TrackInfo {
                type_name: "prison".to_string(),
                bytes_per_sector: PAYLOAD_BYTES as u16,
                nr_sectors: 1,
                valid_sectors: 1,
                payload,
                ..crate::disk::TrackInfo::unformatted()
            },
        )
        .unwrap();

        let handler = Prison;
        let mut tbuf = TrackBuffer::new(2);
        handler.read_raw(&disk, 4, &mut tbuf).unwrap();
        assert_eq!(tbuf.weak_regions().len(), 1);
        assert_eq!(tbuf.weak_regions()[0].1, WEAK_CELLS);
    }
}
