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

    src/handlers/speedlock.rs

    A variable-density protection: a short header written at nominal
    speed followed by a "long" data region deliberately written at a
    slower bitcell rate, so a bit-rate-oblivious dump desyncs partway
    through. This handler is explicitly exempt from the [900,1100]
    nominal clock envelope other handlers are held to.
*/

use crate::codec::{crc16_ccitt, mfm_decode_bytes, BitCellMode, SYNC_4489};
use crate::disk::Disk;
use crate::handler::{DecodedTrack, Handler};
use crate::stream::Stream;
use crate::tbuf::TrackBuffer;
use crate::DiskImageError;

const HEADER_BYTES: usize = 4;
const DATA_BYTES: usize = 4096;
/// 0.1% units: the long data region is written 10% slower than nominal.
const LONG_SPEED: u16 = 1100;

#[derive(Clone)]
pub struct Speedlock;

impl Handler for Speedlock {
    fn name(&self) -> &'static str {
        "speedlock"
    }

    fn geometry(&self) -> (u16, u8) {
        (DATA_BYTES as u16, 1)
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

        let header_raw = match stream.next_bytes(HEADER_BYTES * 2) {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let mut header = [0u8; HEADER_BYTES];
        mfm_decode_bytes(BitCellMode::MfmEven, &header_raw, &mut header);
        if &header[0..2] != b"SL" {
            return Ok(None);
        }

        let data_raw = match stream.next_bytes(DATA_BYTES * 2) {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let mut data = vec![0u8; DATA_BYTES];
        mfm_decode_bytes(BitCellMode::MfmEven, &data_raw, &mut data);

        let crc_raw = match stream.next_bytes(4) {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let mut crc_bytes = [0u8; 2];
        mfm_decode_bytes(BitCellMode::MfmEven, &crc_raw, &mut crc_bytes);
        if crc16_ccitt(&data, None) != u16::from_be_bytes(crc_bytes) {
            return Ok(None);
        }

        Ok(Some(DecodedTrack::whole(data, data_bitoff)))
    }

    fn read_raw(
        &self,
        disk: &Disk,
        tracknr: u16,
        tbuf: &mut TrackBuffer,
    ) -> Result<(), DiskImageError> {
        let info = disk.track(tracknr).ok_or(DiskImageError::SeekError)?;
        if info.payload.len() != DATA_BYTES {
            return Err(DiskImageError::IncompatibleWrite {
                tracknr,
                type_name: self.name().to_string(),
            });
        }

        tbuf.gap(16, 1000);
        tbuf.bits(SYNC_4489, 32, 1000);
        tbuf.bytes(BitCellMode::MfmEven, b"SL\0\0", 1000);
        tbuf.bytes(BitCellMode::MfmEven, &info.payload, LONG_SPEED);
        let crc = crc16_ccitt(&info.payload, None);
        tbuf.bytes(BitCellMode::MfmEven, &crc.to_be_bytes(), LONG_SPEED);
        tbuf.gap(16, 1000);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{rpm, SoftStream};

    #[test]
    fn round_trips_a_variable_density_track() {
        let payload: Vec<u8> = (0..DATA_BYTES).map(|i| (i * 11 + 2) as u8).collect();
        let mut disk = Disk::new();
        disk.set_track(
            0,
            crate::disk::TrackInfo {
                type_name: "speedlock".to_string(),
                bytes_per_sector: DATA_BYTES as u16,
                nr_sectors: 1,
                valid_sectors: 1,
                payload: payload.clone(),
                ..crate::disk::TrackInfo::unformatted()
            },
        )
        .unwrap();

        let handler = Speedlock;
        let mut tbuf = TrackBuffer::new(11);
        handler.read_raw(&disk, 0, &mut tbuf).unwrap();
        let (bits, speed, bitlen) = tbuf.materialize();

        let backend = SoftStream::new(bits, Some(speed), bitlen, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));
        let decoded = handler.write_raw(&disk, 0, &mut stream).unwrap().unwrap();
        assert_eq!(decoded.payload, payload);
    }
}
