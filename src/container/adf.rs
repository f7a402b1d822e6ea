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

    src/container/adf.rs

    ADF: a flat dump of 160 tracks x 11 x 512-byte logical sectors, with no
    flux-level information at all. Opening accepts only exactly-sized plain
    ADF files (a "UAE--ADF"/"UAE-1ADF" signature belongs to extended ADF,
    out of this crate's scope, and is rejected rather than misread).
    Writing rejects any track that isn't AmigaDOS-compatible (§4.5, §8
    concrete scenario #6).
*/

use std::io::{Read, Seek, Write};

use log::warn;

use crate::disk::{Disk, TrackInfo, TrackInfoFlags};
use crate::handlers::amigados::{SECTORS_PER_TRACK, SECTOR_BYTES};
use crate::handlers::rnc;
use crate::stream::rpm::NOMINAL_BITS_PER_TRACK_DD;
use crate::{DiskImageError, NR_TRACKS};

const TRACK_BYTES: usize = SECTOR_BYTES * SECTORS_PER_TRACK;
const ADF_BYTES: usize = TRACK_BYTES * NR_TRACKS as usize;
const EXTENDED_ADF_MAGIC_A: &[u8; 8] = b"UAE--ADF";
const EXTENDED_ADF_MAGIC_B: &[u8; 8] = b"UAE-1ADF";
const NDOS_MARKER: &[u8; 4] = b"NDOS";

/// `true` if `reader` is exactly [`ADF_BYTES`] long and its first 8 bytes
/// are not an extended-ADF signature.
pub(crate) fn detect<R: Read + Seek>(reader: &mut R) -> Result<bool, DiskImageError> {
    let len = reader.seek(std::io::SeekFrom::End(0))?;
    reader.seek(std::io::SeekFrom::Start(0))?;
    if len != ADF_BYTES as u64 {
        return Ok(false);
    }
    let mut magic = [0u8; 8];
    if reader.read_exact(&mut magic).is_err() {
        return Ok(false);
    }
    Ok(magic != *EXTENDED_ADF_MAGIC_A && magic != *EXTENDED_ADF_MAGIC_B)
}

/// A track whose sectors are entirely the repeated ASCII marker `"NDOS"` is
/// a logically blank track, not a corrupt AmigaDOS one (`container/adf.c`'s
/// convention, carried verbatim per SPEC_FULL §3).
fn is_ndos_blank(track: &[u8]) -> bool {
    track.chunks_exact(4).all(|chunk| chunk == NDOS_MARKER)
}

/// Decode a whole [`Disk`] from a plain (non-extended) ADF stream.
pub(crate) fn open<R: Read + Seek>(reader: &mut R) -> Result<Disk, DiskImageError> {
    if !detect(reader)? {
        return Err(DiskImageError::SignatureMismatch);
    }

    let mut disk = Disk::new();
    let mut track_buf = vec![0u8; TRACK_BYTES];
    for tracknr in 0..NR_TRACKS {
        reader
            .read_exact(&mut track_buf)
            .map_err(|e| DiskImageError::IoError(e.to_string()))?;

        if is_ndos_blank(&track_buf) {
            disk.set_unformatted(tracknr)?;
            continue;
        }

        disk.set_track(
            tracknr,
            TrackInfo {
                type_name: "amigados".to_string(),
                bytes_per_sector: SECTOR_BYTES as u16,
                nr_sectors: SECTORS_PER_TRACK as u8,
                valid_sectors: (1u32 << SECTORS_PER_TRACK) - 1,
                payload: track_buf.clone(),
                data_bitoff: 0,
                total_bits: NOMINAL_BITS_PER_TRACK_DD,
                weak: Vec::new(),
                flags: TrackInfoFlags::empty(),
            },
        )?;
    }
    Ok(disk)
}

/// Flatten `info`'s payload down to a plain 11x512 AmigaDOS sector dump, or
/// `None` if this track cannot be represented in ADF at all.
fn flatten(info: &TrackInfo) -> Option<&[u8]> {
    match info.type_name.as_str() {
        "amigados" if info.payload.len() == TRACK_BYTES => Some(&info.payload[..]),
        "rnc_dualformat" | "rnc_triformat" => rnc::flatten_to_amigados(&info.payload),
        _ => None,
    }
}

/// Encode `disk` as a plain ADF image. Any track that isn't AmigaDOS or
/// AmigaDOS-flattenable aborts the whole write (§7's `IncompatibleWrite`).
pub(crate) fn close<W: Write>(disk: &Disk, writer: &mut W) -> Result<(), DiskImageError> {
    for tracknr in 0..NR_TRACKS {
        let bytes = match disk.track(tracknr) {
            Some(info) => match flatten(info) {
                Some(bytes) => bytes.to_vec(),
                None => {
                    warn!(
                        "adf: track {} of type '{}' cannot be written to ADF",
                        tracknr, info.type_name
                    );
                    return Err(DiskImageError::IncompatibleWrite {
                        tracknr,
                        type_name: info.type_name.clone(),
                    });
                }
            },
            None => NDOS_MARKER.repeat(SECTORS_PER_TRACK * SECTOR_BYTES / 4),
        };
        writer
            .write_all(&bytes)
            .map_err(|e| DiskImageError::IoError(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ados_track(seed: u8) -> Vec<u8> {
        (0..TRACK_BYTES).map(|i| seed.wrapping_add(i as u8)).collect()
    }

    #[test]
    fn round_trips_an_amigados_only_disk() {
        let mut disk = Disk::new();
        for tracknr in 0..NR_TRACKS {
            disk.set_track(
                tracknr,
                TrackInfo {
                    type_name: "amigados".to_string(),
                    bytes_per_sector: SECTOR_BYTES as u16,
                    nr_sectors: SECTORS_PER_TRACK as u8,
                    valid_sectors: (1u32 << SECTORS_PER_TRACK) - 1,
                    payload: ados_track(tracknr as u8),
                    data_bitoff: 0,
                    total_bits: NOMINAL_BITS_PER_TRACK_DD,
                    weak: Vec::new(),
                    flags: TrackInfoFlags::empty(),
                },
            )
            .unwrap();
        }

        let mut buf = Vec::new();
        close(&disk, &mut buf).unwrap();
        assert_eq!(buf.len(), ADF_BYTES);

        let mut cursor = Cursor::new(buf);
        assert!(detect(&mut cursor).unwrap());
        cursor.set_position(0);
        let reopened = open(&mut cursor).unwrap();
        assert_eq!(reopened.track(0).unwrap().payload, ados_track(0));
        assert_eq!(reopened.track(159).unwrap().payload, ados_track(159));
    }

    #[test]
    fn rejects_a_non_amigados_track_on_write() {
        let mut disk = Disk::new();
        disk.set_track(
            5,
            TrackInfo {
                type_name: "silkworm".to_string(),
                bytes_per_sector: 5376,
                nr_sectors: 1,
                valid_sectors: 1,
                payload: vec![0u8; 5376],
                data_bitoff: 0,
                total_bits: NOMINAL_BITS_PER_TRACK_DD,
                weak: Vec::new(),
                flags: TrackInfoFlags::empty(),
            },
        )
        .unwrap();

        let mut buf = Vec::new();
        let err = close(&disk, &mut buf).unwrap_err();
        assert!(matches!(err, DiskImageError::IncompatibleWrite { tracknr: 5, .. }));
    }

    #[test]
    fn blank_ndos_track_opens_as_unformatted() {
        let mut image = vec![0u8; ADF_BYTES];
        image[..TRACK_BYTES].copy_from_slice(&NDOS_MARKER.repeat(TRACK_BYTES / 4));
        let mut cursor = Cursor::new(image);
        let disk = open(&mut cursor).unwrap();
        assert_eq!(disk.track(0).unwrap().type_name, "unformatted");
    }

    #[test]
    fn extended_adf_signature_is_not_detected_as_plain_adf() {
        let mut image = vec![0u8; ADF_BYTES];
        image[..8].copy_from_slice(EXTENDED_ADF_MAGIC_A);
        let mut cursor = Cursor::new(image);
        assert!(!detect(&mut cursor).unwrap());
    }

    #[test]
    fn wrong_size_is_not_detected() {
        let mut cursor = Cursor::new(vec![0u8; 1024]);
        assert!(!detect(&mut cursor).unwrap());
    }
}
