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

    src/container/bundle.rs

    The canonical bundle: this crate's native, lossless whole-disk
    container. Big-endian throughout; one fixed-size header followed by
    one variable-length record per track (§6).
*/

use std::io::{Read, Seek, Write};

use binrw::{binrw, BinRead, BinReaderExt, BinWrite};

use crate::disk::{Disk, TrackInfo, TrackInfoFlags};
use crate::{DiskImageError, WEAK};

const MAGIC: [u8; 4] = *b"DSK\0";
const VERSION: u8 = 1;

#[binrw]
#[brw(big)]
struct BundleHeader {
    magic: [u8; 4],
    version: u8,
    reserved: [u8; 3],
    nr_tracks: u16,
    flags: u16,
}

#[binrw]
#[brw(big)]
struct BundleTrackRecord {
    #[bw(calc = type_name.len() as u8)]
    type_name_len: u8,
    #[br(count = type_name_len)]
    type_name: Vec<u8>,
    flags: u16,
    bytes_per_sector: u16,
    nr_sectors: u8,
    valid_sectors: u32,
    data_bitoff: u32,
    total_bits: u32,
    #[bw(calc = dat.len() as u32)]
    len: u32,
    #[br(count = len)]
    dat: Vec<u8>,
}

/// `true` if `reader` (rewound by the caller afterwards) begins with the
/// bundle magic `"DSK\0"` and a recognized version byte.
pub(crate) fn detect<R: Read + Seek>(reader: &mut R) -> Result<bool, DiskImageError> {
    let mut magic = [0u8; 4];
    if reader.read_exact(&mut magic).is_err() {
        return Ok(false);
    }
    let mut version = [0u8; 1];
    if reader.read_exact(&mut version).is_err() {
        return Ok(false);
    }
    Ok(magic == MAGIC && version[0] == VERSION)
}

/// Decode a whole [`Disk`] from a canonical bundle stream.
pub(crate) fn open<R: Read + Seek>(reader: &mut R) -> Result<Disk, DiskImageError> {
    let header: BundleHeader = reader
        .read_be()
        .map_err(|_| DiskImageError::SignatureMismatch)?;
    if header.magic != MAGIC || header.version != VERSION {
        return Err(DiskImageError::SignatureMismatch);
    }

    let mut disk = Disk::new();
    for tracknr in 0..header.nr_tracks {
        let record: BundleTrackRecord = reader
            .read_be()
            .map_err(|e| DiskImageError::IoError(e.to_string()))?;
        let type_name =
            String::from_utf8(record.type_name).map_err(|_| DiskImageError::ImageCorruptError)?;
        let info = TrackInfo {
            type_name,
            bytes_per_sector: record.bytes_per_sector,
            nr_sectors: record.nr_sectors,
            valid_sectors: record.valid_sectors,
            payload: record.dat,
            data_bitoff: record.data_bitoff,
            total_bits: record.total_bits,
            weak: Vec::new(),
            flags: TrackInfoFlags::from_bits_truncate(record.flags as u8),
        };
        disk.set_track(tracknr, info)?;
    }
    Ok(disk)
}

/// Encode `disk` as a canonical bundle stream.
pub(crate) fn close<W: Write>(disk: &Disk, writer: &mut W) -> Result<(), DiskImageError> {
    let header = BundleHeader {
        magic: MAGIC,
        version: VERSION,
        reserved: [0; 3],
        nr_tracks: crate::NR_TRACKS,
        flags: 0,
    };
    header
        .write_be(writer)
        .map_err(|e| DiskImageError::IoError(e.to_string()))?;

    for tracknr in 0..crate::NR_TRACKS {
        let info = disk.track(tracknr);
        let (type_name, bytes_per_sector, nr_sectors, valid_sectors, data_bitoff, total_bits, dat, flags) =
            match info {
                Some(info) => (
                    info.type_name.clone(),
                    info.bytes_per_sector,
                    info.nr_sectors,
                    info.valid_sectors,
                    info.data_bitoff,
                    info.total_bits,
                    info.payload.clone(),
                    info.flags.bits() as u16,
                ),
                None => (
                    "unformatted".to_string(),
                    0,
                    0,
                    0,
                    0,
                    WEAK,
                    Vec::new(),
                    0,
                ),
            };
        let record = BundleTrackRecord {
            type_name: type_name.into_bytes(),
            flags,
            bytes_per_sector,
            nr_sectors,
            valid_sectors,
            data_bitoff,
            total_bits,
            dat,
        };
        record
            .write_be(writer)
            .map_err(|e| DiskImageError::IoError(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_an_empty_disk() {
        let disk = Disk::new();
        let mut buf = Vec::new();
        close(&disk, &mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        assert!(detect(&mut cursor).unwrap());
        cursor.set_position(0);
        let reopened = open(&mut cursor).unwrap();
        assert_eq!(reopened.tracks().count(), 0);
    }

    #[test]
    fn round_trips_a_populated_track() {
        let mut disk = Disk::new();
        disk.set_track(
            12,
            TrackInfo {
                type_name: "amigados".to_string(),
                bytes_per_sector: 512,
                nr_sectors: 11,
                valid_sectors: 0x7FF,
                payload: vec![0xAB; 512 * 11],
                data_bitoff: 42,
                total_bits: 100_150,
                weak: Vec::new(),
                flags: TrackInfoFlags::empty(),
            },
        )
        .unwrap();

        let mut buf = Vec::new();
        close(&disk, &mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        let reopened = open(&mut cursor).unwrap();

        let info = reopened.track(12).unwrap();
        assert_eq!(info.type_name, "amigados");
        assert_eq!(info.nr_sectors, 11);
        assert_eq!(info.valid_sectors, 0x7FF);
        assert_eq!(info.payload.len(), 512 * 11);
        assert_eq!(info.total_bits, 100_150);
    }

    #[test]
    fn weak_track_round_trips_the_sentinel() {
        let mut disk = Disk::new();
        disk.set_unformatted(3).unwrap();

        let mut buf = Vec::new();
        close(&disk, &mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        let reopened = open(&mut cursor).unwrap();
        assert_eq!(reopened.track(3).unwrap().total_bits, WEAK);
    }

    #[test]
    fn rejects_truncated_input() {
        let mut cursor = Cursor::new(vec![0x44u8, 0x53, 0x4B, 0x00, 0x01]);
        assert!(open(&mut cursor).is_err());
    }
}
