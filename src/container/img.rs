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

    src/container/img.rs

    IMG: a flat, signature-less dump of each track's logical sector bytes,
    write-only (§4.5). `track_read_sectors` infers sector geometry from the
    stored type tag: tracks whose handler didn't produce a full sector's
    worth of payload (most protections) contribute nothing, by design
    (§9's open question -- not an error).
*/

use std::io::Write;

use log::debug;

use crate::disk::Disk;
use crate::{DiskImageError, NR_TRACKS};

/// The logical sector bytes `tracknr` would contribute to an IMG dump, or
/// `None` if this track's payload isn't (at least) a whole number of
/// sectors -- i.e. it can't be read as sectors at all.
fn track_read_sectors(disk: &Disk, tracknr: u16) -> Option<&[u8]> {
    let info = disk.track(tracknr)?;
    let sector_bytes = info.bytes_per_sector as usize * info.nr_sectors as usize;
    if sector_bytes == 0 || info.payload.len() < sector_bytes {
        return None;
    }
    Some(&info.payload[..sector_bytes])
}

/// Encode `disk` as an IMG dump. Tracks that cannot be read as sectors are
/// silently skipped rather than erroring (§9).
pub(crate) fn close<W: Write>(disk: &Disk, writer: &mut W) -> Result<(), DiskImageError> {
    for tracknr in 0..NR_TRACKS {
        match track_read_sectors(disk, tracknr) {
            Some(bytes) => writer
                .write_all(bytes)
                .map_err(|e| DiskImageError::IoError(e.to_string()))?,
            None => debug!("img: track {} has no sector layout, skipping", tracknr),
        }
    }
    Ok(())
}
