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

    src/handlers/raw.rs

    The density-only fallback: captures exactly the bitcells measured in
    one revolution with no attempt at structural recognition. Always
    succeeds, so the disk analyser only reaches `Unformatted` when even
    this fails -- e.g. on a track of pure noise too short to complete a
    revolution (§8 concrete scenario #3).
*/

use crate::disk::Disk;
use crate::handler::{DecodedTrack, Handler};
use crate::stream::Stream;
use crate::tbuf::TrackBuffer;
use crate::DiskImageError;

/// Double-density raw capture: one packed revolution of bitcells, verbatim.
#[derive(Clone)]
pub struct RawDd;

impl Handler for RawDd {
    fn name(&self) -> &'static str {
        "raw_dd"
    }

    fn geometry(&self) -> (u16, u8) {
        (0, 1)
    }

    fn write_raw(
        &self,
        _disk: &Disk,
        _tracknr: u16,
        stream: &mut Stream,
    ) -> Result<Option<DecodedTrack>, DiskImageError> {
        stream.set_max_revolutions(1);
        let mut bits = Vec::new();
        let mut cur = 0u8;
        let mut cur_bits = 0u8;
        loop {
            let nr_index_before = stream.nr_index;
            match stream.next_bit() {
                Some(bit) => {
                    cur = (cur << 1) | (bit as u8);
                    cur_bits += 1;
                    if cur_bits == 8 {
                        bits.push(cur);
                        cur = 0;
                        cur_bits = 0;
                    }
                    // Stop as soon as this bit closes out the first revolution;
                    // a second index pulse would only repeat the same cells.
                    if stream.nr_index > nr_index_before {
                        break;
                    }
                }
                None => break,
            }
        }
        if cur_bits > 0 {
            bits.push(cur << (8 - cur_bits));
        }

        // A revolution too short to hold any bitcells at all means the
        // source never produced a usable flux signal -- this is the one
        // case in which even the raw fallback declines, leaving the track
        // to the analyser's Unformatted fallback.
        if bits.is_empty() {
            return Ok(None);
        }

        Ok(Some(DecodedTrack::whole(bits, 0)))
    }

    fn read_raw(
        &self,
        disk: &Disk,
        tracknr: u16,
        tbuf: &mut TrackBuffer,
    ) -> Result<(), DiskImageError> {
        let info = disk.track(tracknr).ok_or(DiskImageError::SeekError)?;
        for &byte in &info.payload {
            tbuf.bits(byte as u32, 8, 1000);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{rpm, SoftStream};

    #[test]
    fn captures_one_revolution_verbatim() {
        let source = vec![0xDEu8, 0xAD, 0xBE, 0xEF];
        let backend = SoftStream::new(source.clone(), None, source.len() as u32 * 8, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));
        let handler = RawDd;
        let disk = Disk::new();
        let decoded = handler.write_raw(&disk, 0, &mut stream).unwrap().unwrap();
        assert_eq!(decoded.payload, source);
    }
}
