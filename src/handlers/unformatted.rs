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

    src/handlers/unformatted.rs

    White-noise tracks. Scans for bit sequences that violate the MFM missing-
    clock rule; random flux does this constantly, so a track where nearly
    every 1000-bit window looks broken is claimed as unformatted rather than
    handed to `raw_dd` as if it were real data (§8 concrete scenario #3).
*/

use crate::disk::Disk;
use crate::handler::{DecodedTrack, Handler};
use crate::stream::Stream;
use crate::tbuf::TrackBuffer;
use crate::DiskImageError;

const SCAN_SECTOR_BITS: u32 = 1000;
const SECTOR_BAD_THRESH: u32 = SCAN_SECTOR_BITS / 50;
const CLOCK_JITTER_THRESH: i64 = 20; // +/- 20%

/// The white-noise catch-all: claims a track only when its clock-jitter
/// profile is indistinguishable from random flux.
#[derive(Clone)]
pub struct Unformatted;

impl Handler for Unformatted {
    fn name(&self) -> &'static str {
        "unformatted"
    }

    fn geometry(&self) -> (u16, u8) {
        (0, 0)
    }

    fn write_raw(
        &self,
        _disk: &Disk,
        _tracknr: u16,
        stream: &mut Stream,
    ) -> Result<Option<DecodedTrack>, DiskImageError> {
        let mut scan_bits = 0u32;
        let mut bad = 0u32;
        let mut nr_zero = 0u32;
        let mut lat = stream.latency_ns();
        let mut clk = stream.clock() as i64;
        let mut bad_sectors = 0u32;
        let mut nr_sectors = 0u32;

        while stream.next_bit().is_some() {
            if stream.word() & 1 != 0 {
                let new_clk = (stream.latency_ns() - lat) as i64 / (nr_zero as i64 + 1);
                let delta = (new_clk - clk).abs();
                if clk != 0 && (delta * 100) / clk > CLOCK_JITTER_THRESH {
                    bad += 1;
                }
                clk = new_clk;
                lat = stream.latency_ns();
                nr_zero = 0;
            } else {
                nr_zero += 1;
                if nr_zero > 3 {
                    bad += 1;
                }
            }

            scan_bits += 1;
            if scan_bits >= SCAN_SECTOR_BITS {
                if bad >= SECTOR_BAD_THRESH {
                    bad_sectors += 1;
                }
                nr_sectors += 1;
                bad = 0;
                scan_bits = 0;
            }
        }

        // A track too short to complete even one scan window (nr_sectors ==
        // 0) falls straight through and is claimed, matching libdisk: there
        // is no real data to weigh against.
        if bad_sectors < nr_sectors {
            let pc = bad_sectors * 100 / nr_sectors;
            if pc <= 90 {
                return Ok(None);
            }
        }

        Ok(Some(DecodedTrack {
            payload: Vec::new(),
            data_bitoff: 0,
            total_bits: Some(crate::WEAK),
            valid_sectors: 0,
            flags: crate::disk::TrackInfoFlags::empty(),
        }))
    }

    fn read_raw(
        &self,
        _disk: &Disk,
        _tracknr: u16,
        tbuf: &mut TrackBuffer,
    ) -> Result<(), DiskImageError> {
        let mut speed_delta: i32 = 200;
        let mut byte = 0u8;
        let bitlen = 96000 + (tbuf.rnd16() & 1023) as i32 - 512;

        for i in 0..bitlen {
            byte <<= 1;
            byte |= (tbuf.rnd16() & 3 == 0) as u8;
            if i & 7 == 7 {
                let speed = (crate::tbuf::SPEED_NOMINAL as i32 + speed_delta) as u16;
                tbuf.bits(byte as u32, 8, speed);
                speed_delta = -speed_delta;
            }
        }
        Ok(())
    }
}
