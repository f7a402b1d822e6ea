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

    src/container/rawmfm.rs

    Raw MFM: a flat, signature-less, write-only dump for the tnt23 floppy
    emulator (`container/mfm.c`'s original purpose). Every track occupies
    exactly [`TRACK_BYTES`] bytes, taken from the last third of a `raw_dd`
    payload and padded by repeating its final byte; only an all-`raw_dd`
    disk can be written this way.
*/

use std::io::Write;

use crate::disk::Disk;
use crate::{DiskImageError, NR_TRACKS};

const TRACK_BYTES: usize = 12_800;

/// Project `payload` (a `raw_dd` track's full captured revolution) down to
/// the [`TRACK_BYTES`]-byte slice `container/mfm.c` writes: the last third
/// of the payload, capped at `TRACK_BYTES`, its final byte repeated to pad
/// out any shortfall.
fn project_track(payload: &[u8]) -> [u8; TRACK_BYTES] {
    // Mirrors `container/mfm.c` exactly: the start offset and the byte count
    // are each floor(len/3)-derived independently, so for lengths not a
    // multiple of 3 the tail slice can run a byte or two longer than
    // `nbytes` -- only the first `nbytes` of it are ever used.
    let start = payload.len() * 2 / 3;
    let mut nbytes = payload.len() / 3;
    let tail = &payload[start..];

    let (source, fill_byte): (&[u8], u8) = if nbytes == 0 {
        (&[0x55], 0x55)
    } else {
        nbytes = nbytes.min(TRACK_BYTES);
        (&tail[..nbytes], tail[nbytes - 1])
    };

    let mut out = [0u8; TRACK_BYTES];
    let nbytes = source.len();
    out[..nbytes].copy_from_slice(source);
    for byte in out.iter_mut().skip(nbytes) {
        *byte = fill_byte;
    }
    out
}

/// Encode `disk` as a raw MFM dump. Aborts (§7: fatal, not a soft failure)
/// as soon as a non-`raw_dd` track is encountered.
pub(crate) fn close<W: Write>(disk: &Disk, writer: &mut W) -> Result<(), DiskImageError> {
    for tracknr in 0..NR_TRACKS {
        let payload = match disk.track(tracknr) {
            Some(info) if info.type_name == "raw_dd" => &info.payload,
            Some(info) => {
                return Err(DiskImageError::IncompatibleWrite {
                    tracknr,
                    type_name: info.type_name.clone(),
                })
            }
            None => {
                return Err(DiskImageError::IncompatibleWrite {
                    tracknr,
                    type_name: "unformatted".to_string(),
                })
            }
        };
        let track = project_track(payload);
        writer
            .write_all(&track)
            .map_err(|e| DiskImageError::IoError(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::TrackInfo;

    fn raw_dd_track(payload: Vec<u8>) -> TrackInfo {
        let total_bits = payload.len() as u32 * 8;
        TrackInfo {
            type_name: "raw_dd".to_string(),
            bytes_per_sector: 0,
            nr_sectors: 1,
            valid_sectors: 1,
            payload,
            data_bitoff: 0,
            total_bits,
            weak: Vec::new(),
            flags: crate::disk::TrackInfoFlags::empty(),
        }
    }

    #[test]
    fn writes_exactly_nr_tracks_times_track_bytes() {
        let mut disk = Disk::new();
        for tracknr in 0..NR_TRACKS {
            let payload: Vec<u8> = (0..39_000).map(|i| (i + tracknr as usize) as u8).collect();
            disk.set_track(tracknr, raw_dd_track(payload)).unwrap();
        }
        let mut buf = Vec::new();
        close(&disk, &mut buf).unwrap();
        assert_eq!(buf.len(), NR_TRACKS as usize * TRACK_BYTES);
    }

    #[test]
    fn projects_the_last_third_and_pads_with_final_byte() {
        let payload: Vec<u8> = (0u16..3000).map(|v| (v % 251) as u8).collect();
        let projected = project_track(&payload);
        let start = payload.len() * 2 / 3;
        let nbytes = payload.len() / 3;
        let tail = &payload[start..start + nbytes];
        assert_eq!(&projected[..nbytes], tail);
        assert_eq!(projected[TRACK_BYTES - 1], *tail.last().unwrap());
    }

    #[test]
    fn non_multiple_of_three_uses_independently_floored_offset_and_count() {
        // len=10: len*2/3 = 6 (start), len/3 = 3 (count) -- NOT len - len/3 = 7.
        let payload: Vec<u8> = (0u8..10).collect();
        let projected = project_track(&payload);
        assert_eq!(&projected[..3], &payload[6..9]);
        assert_eq!(projected[TRACK_BYTES - 1], payload[8]);
    }

    #[test]
    fn empty_payload_projects_to_a_single_padding_byte() {
        let projected = project_track(&[]);
        assert!(projected.iter().all(|&b| b == 0x55));
    }

    #[test]
    fn non_raw_dd_track_aborts_the_whole_write() {
        let mut disk = Disk::new();
        disk.set_track(
            0,
            TrackInfo {
                type_name: "amigados".to_string(),
                bytes_per_sector: 512,
                nr_sectors: 11,
                valid_sectors: 0x7FF,
                payload: vec![0u8; 512 * 11],
                data_bitoff: 0,
                total_bits: 100_150,
                weak: Vec::new(),
                flags: crate::disk::TrackInfoFlags::empty(),
            },
        )
        .unwrap();
        let mut buf = Vec::new();
        let err = close(&disk, &mut buf).unwrap_err();
        assert!(matches!(err, DiskImageError::IncompatibleWrite { tracknr: 0, .. }));
    }
}
