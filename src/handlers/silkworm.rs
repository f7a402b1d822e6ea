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

    src/handlers/silkworm.rs

    A single-sync, whole-track custom format: one sync mark per track,
    followed by a fixed-size payload and a CRC-CCITT trailer, mirroring
    the common "one giant sector" shape used by loader/protection tracks
    (this crate's Silkworm handler, after the title whose release this
    format was first catalogued from -- §8 concrete scenario #1).
*/

use crate::codec::{crc16_ccitt, mfm_decode_bytes, BitCellMode, SYNC_4489};
use crate::disk::Disk;
use crate::handler::{DecodedTrack, Handler};
use crate::stream::Stream;
use crate::tbuf::TrackBuffer;
use crate::DiskImageError;

const PAYLOAD_BYTES: usize = 5120;
const SYNC_MARKS: u32 = 2;
/// Nominal index-to-index bitcell length this format is written at (§8
/// concrete scenario #1): a "long track" protection, versus the ~100,150
/// bitcells a normal double-density revolution holds.
const TOTAL_BITS: u32 = 100_150;

#[derive(Clone)]
pub struct Silkworm;

impl Handler for Silkworm {
    fn name(&self) -> &'static str {
        "silkworm"
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

        loop {
            match stream.next_bit() {
                Some(_) => {
                    if stream.word() == SYNC_4489 {
                        break;
                    }
                }
                None => return Ok(None),
            }
        }
        let data_bitoff = stream.index_offset_bc().saturating_sub(31);
        // A second, doubled sync mark follows immediately in this format.
        if stream.next_bits(32) != Some(SYNC_4489) {
            return Ok(None);
        }
        let _ = SYNC_MARKS;

        let raw = match stream.next_bytes(PAYLOAD_BYTES * 2) {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let mut payload = vec![0u8; PAYLOAD_BYTES];
        mfm_decode_bytes(BitCellMode::MfmEven, &raw, &mut payload);

        let crc_raw = match stream.next_bytes(4) {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let mut crc_bytes = [0u8; 2];
        mfm_decode_bytes(BitCellMode::MfmEven, &crc_raw, &mut crc_bytes);
        let on_disk_crc = u16::from_be_bytes(crc_bytes);

        if crc16_ccitt(&payload, None) != on_disk_crc {
            return Ok(None);
        }

        let mut decoded = DecodedTrack::whole(payload, data_bitoff);
        decoded.total_bits = Some(TOTAL_BITS);
        Ok(Some(decoded))
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
        tbuf.bits(SYNC_4489, 32, 1000);
        tbuf.bytes(BitCellMode::MfmEven, &info.payload, 1000);
        let crc = crc16_ccitt(&info.payload, None);
        tbuf.bytes(BitCellMode::MfmEven, &crc.to_be_bytes(), 1000);
        tbuf.gap(16, 1000);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{rpm, SoftStream};

    #[test]
    fn round_trips_a_full_track() {
        let payload: Vec<u8> = (0..PAYLOAD_BYTES).map(|i| (i * 13 + 5) as u8).collect();
        let mut disk = Disk::new();
        disk.set_track(
            9,
            crate::disk::TrackInfo {
                type_name: "silkworm".to_string(),
                bytes_per_sector: PAYLOAD_BYTES as u16,
                nr_sectors: 1,
                valid_sectors: 1,
                payload: payload.clone(),
                ..crate::disk::TrackInfo::unformatted()
            },
        )
        .unwrap();

        let handler = Silkworm;
        let mut tbuf = TrackBuffer::new(1);
        handler.read_raw(&disk, 9, &mut tbuf).unwrap();
        let (bits, speed, bitlen) = tbuf.materialize();

        let backend = SoftStream::new(bits, Some(speed), bitlen, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));
        let decoded = handler.write_raw(&disk, 9, &mut stream).unwrap().unwrap();
        assert_eq!(decoded.payload, payload);
        assert_eq!(decoded.total_bits, Some(TOTAL_BITS));
    }

    #[test]
    fn random_noise_is_rejected() {
        let disk = Disk::new();
        let handler = Silkworm;
        let noise = vec![0x93u8; 700];
        let backend = SoftStream::new(noise, None, 700 * 8, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));
        let decoded = handler.write_raw(&disk, 9, &mut stream).unwrap();
        assert!(decoded.is_none());
    }
}
