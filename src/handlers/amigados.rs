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

    src/handlers/amigados.rs

    The stock AmigaDOS track format: 11 512-byte sectors per track, each
    with a sync mark, a header carrying the track/sector number, and
    AmigaDOS-checksum-protected header and data fields. This is the
    universal fallback every other handler in this crate is layered on top
    of or tried after (§4.5's composed-handler pattern, §8 scenario #6).
*/

use log::warn;

use crate::codec::{amigados_checksum, mfm_decode_bytes, BitCellMode, SYNC_4489};
use crate::disk::Disk;
use crate::handler::{DecodedTrack, Handler};
use crate::stream::Stream;
use crate::tbuf::TrackBuffer;
use crate::DiskImageError;

pub const SECTORS_PER_TRACK: usize = 11;
pub const SECTOR_BYTES: usize = 512;
const LABEL_BYTES: usize = 16;
const HEADER_BYTES: usize = 4 + LABEL_BYTES;
const GAP_BYTES: usize = 2;

#[derive(Clone)]
pub struct AmigaDos;

impl AmigaDos {
    fn decode_sector(stream: &mut Stream) -> Option<(u8, [u8; SECTOR_BYTES])> {
        let header_raw = stream.next_bytes(HEADER_BYTES * 2)?;
        let mut header = [0u8; HEADER_BYTES];
        mfm_decode_bytes(BitCellMode::MfmOddEven, &header_raw, &mut header);

        let hdr_csum_raw = stream.next_bytes(8)?;
        let mut hdr_csum_bytes = [0u8; 4];
        mfm_decode_bytes(BitCellMode::MfmOddEven, &hdr_csum_raw, &mut hdr_csum_bytes);
        let hdr_csum = u32::from_be_bytes(hdr_csum_bytes);
        if amigados_checksum(&header) != hdr_csum {
            warn!("amigados: header checksum mismatch");
            return None;
        }

        if header[0] != 0xFF {
            return None;
        }
        let sector = header[2];

        let data_raw = stream.next_bytes(SECTOR_BYTES * 2)?;
        let mut data = [0u8; SECTOR_BYTES];
        mfm_decode_bytes(BitCellMode::MfmOddEven, &data_raw, &mut data);

        let data_csum_raw = stream.next_bytes(8)?;
        let mut data_csum_bytes = [0u8; 4];
        mfm_decode_bytes(BitCellMode::MfmOddEven, &data_csum_raw, &mut data_csum_bytes);
        let data_csum = u32::from_be_bytes(data_csum_bytes);
        if amigados_checksum(&data) != data_csum {
            warn!("amigados: data checksum mismatch, sector {}", sector);
            return None;
        }

        Some((sector, data))
    }
}

impl Handler for AmigaDos {
    fn name(&self) -> &'static str {
        "amigados"
    }

    fn geometry(&self) -> (u16, u8) {
        (SECTOR_BYTES as u16, SECTORS_PER_TRACK as u8)
    }

    fn write_raw(
        &self,
        _disk: &Disk,
        tracknr: u16,
        stream: &mut Stream,
    ) -> Result<Option<DecodedTrack>, DiskImageError> {
        let mut sectors: [Option<[u8; SECTOR_BYTES]>; SECTORS_PER_TRACK] = Default::default();
        let mut found = 0usize;
        let mut data_bitoff = None;

        stream.set_max_revolutions(2);
        'sectors: loop {
            // Scan one bitcell at a time until the 32-bit sync pattern is aligned.
            loop {
                match stream.next_bit() {
                    Some(_) => {
                        if stream.word() == SYNC_4489 {
                            break;
                        }
                    }
                    None => break 'sectors,
                }
            }
            if data_bitoff.is_none() {
                data_bitoff = Some(stream.index_offset_bc().saturating_sub(31));
            }
            match Self::decode_sector(stream) {
                Some((sector, data)) if (sector as usize) < SECTORS_PER_TRACK => {
                    if sectors[sector as usize].is_none() {
                        found += 1;
                    }
                    sectors[sector as usize] = Some(data);
                    if found == SECTORS_PER_TRACK {
                        break;
                    }
                }
                _ => continue,
            }
        }

        if found < SECTORS_PER_TRACK {
            return Ok(None);
        }

        let mut payload = Vec::with_capacity(SECTORS_PER_TRACK * SECTOR_BYTES);
        for sector in sectors.iter() {
            payload.extend_from_slice(&sector.unwrap());
        }
        let _ = tracknr;
        Ok(Some(DecodedTrack {
            payload,
            data_bitoff: data_bitoff.unwrap_or(0),
            total_bits: None,
            valid_sectors: (1u32 << SECTORS_PER_TRACK) - 1,
            flags: crate::disk::TrackInfoFlags::empty(),
        }))
    }

    fn read_raw(
        &self,
        disk: &Disk,
        tracknr: u16,
        tbuf: &mut TrackBuffer,
    ) -> Result<(), DiskImageError> {
        let info = disk
            .track(tracknr)
            .ok_or(DiskImageError::SeekError)?;
        if info.payload.len() != SECTORS_PER_TRACK * SECTOR_BYTES {
            return Err(DiskImageError::IncompatibleWrite {
                tracknr,
                type_name: self.name().to_string(),
            });
        }

        for sector in 0..SECTORS_PER_TRACK {
            tbuf.gap(GAP_BYTES, 1000);
            tbuf.bits(SYNC_4489, 32, 1000);

            let mut header = [0u8; HEADER_BYTES];
            header[0] = 0xFF;
            header[1] = tracknr as u8;
            header[2] = sector as u8;
            header[3] = (SECTORS_PER_TRACK - sector) as u8;
            let hdr_csum = amigados_checksum(&header);

            tbuf.bytes(BitCellMode::MfmOddEven, &header, 1000);
            tbuf.bytes(BitCellMode::MfmOddEven, &hdr_csum.to_be_bytes(), 1000);

            let data = &info.payload[sector * SECTOR_BYTES..(sector + 1) * SECTOR_BYTES];
            let data_csum = amigados_checksum(data);
            tbuf.bytes(BitCellMode::MfmOddEven, data, 1000);
            tbuf.bytes(BitCellMode::MfmOddEven, &data_csum.to_be_bytes(), 1000);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{rpm, SoftStream};

    fn build_track(tracknr: u16, payload: &[u8]) -> Disk {
        let mut disk = Disk::new();
        disk.set_track(
            tracknr,
            crate::disk::TrackInfo {
                type_name: "amigados".to_string(),
                bytes_per_sector: SECTOR_BYTES as u16,
                nr_sectors: SECTORS_PER_TRACK as u8,
                valid_sectors: (1 << SECTORS_PER_TRACK) - 1,
                payload: payload.to_vec(),
                ..crate::disk::TrackInfo::unformatted()
            },
        )
        .unwrap();
        disk
    }

    #[test]
    fn round_trips_a_full_track() {
        let payload: Vec<u8> = (0..SECTORS_PER_TRACK * SECTOR_BYTES)
            .map(|i| (i * 7 + 3) as u8)
            .collect();
        let disk = build_track(2, &payload);
        let handler = AmigaDos;

        let mut tbuf = TrackBuffer::new(3);
        handler.read_raw(&disk, 2, &mut tbuf).unwrap();
        let (bits, speed, bitlen) = tbuf.materialize();

        let backend = SoftStream::new(bits, Some(speed), bitlen, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));
        let decoded = handler.write_raw(&disk, 2, &mut stream).unwrap().unwrap();
        assert_eq!(decoded.payload, payload);
        assert_eq!(decoded.valid_sectors, (1u32 << SECTORS_PER_TRACK) - 1);
    }

    #[test]
    fn rejects_track_of_pure_noise() {
        let disk = Disk::new();
        let handler = AmigaDos;
        let noise = vec![0x5Au8; SECTOR_BYTES];
        let backend = SoftStream::new(noise, None, SECTOR_BYTES as u32 * 8, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));
        let decoded = handler.write_raw(&disk, 0, &mut stream).unwrap();
        assert!(decoded.is_none());
    }
}
