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

    src/stream/soft.rs

    Construct a "soft" stream backend from an in-memory image of raw,
    already-decoded track bitcells -- the bitcell wrapper of §4.2. Grounded
    directly on libdisk's `stream/soft.c`: the bit array is re-synthesized
    as a sequence of flux intervals so it can be driven through the same
    PLL-based `next_bit` loop as a genuine flux capture.
*/

use super::backend::{FluxEvent, StreamBackend};
use super::rpm::ns_per_cell_from_rpm;
use crate::DiskImageError;

/// A stream backend over a pre-built `(bits, speed, bitlen)` triple, exactly the shape
/// [`crate::tbuf::TrackBuffer::materialize`] produces.
pub struct SoftStream {
    data: Vec<u8>,
    speed: Option<Vec<u16>>,
    bitlen: u32,
    pos: u32,
    ns_per_cell: u32,
    data_rpm: u32,
}

impl SoftStream {
    /// `data` is a packed bit array (MSB-first per byte), `speed` is an optional
    /// parallel per-bitcell speed table in 0.1% units (`1000` = nominal), and
    /// `bitlen` is the number of valid bitcells in `data`.
    pub fn new(data: Vec<u8>, speed: Option<Vec<u16>>, bitlen: u32, data_rpm: u32) -> Self {
        let ns_per_cell = ns_per_cell_from_rpm(data_rpm, bitlen);
        SoftStream {
            data,
            speed,
            bitlen,
            pos: 0,
            ns_per_cell,
            data_rpm,
        }
    }

    #[inline]
    fn bit_at(&self, pos: u32) -> bool {
        let byte = self.data[(pos >> 3) as usize];
        (byte & (0x80 >> (pos & 7))) != 0
    }

    #[inline]
    fn speed_at(&self, pos: u32) -> u16 {
        self.speed.as_ref().map(|s| s[pos as usize]).unwrap_or(1000)
    }
}

impl StreamBackend for SoftStream {
    fn select_track(&mut self, _tracknr: u32) -> Result<(), DiskImageError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.pos = 0;
    }

    fn next_flux(&mut self) -> Option<FluxEvent> {
        if self.bitlen == 0 {
            return None;
        }

        let mut flux: u32 = 0;
        let mut wrapped = false;
        loop {
            let at_end = self.pos + 1 >= self.bitlen;
            let pos = self.pos;
            self.pos = if at_end { 0 } else { self.pos + 1 };
            if at_end {
                wrapped = true;
            }

            let speed = self.speed_at(pos) as u32;
            flux += (self.ns_per_cell * speed) / 1000;

            if self.bit_at(pos) || flux >= 1_000_000 {
                break;
            }
        }

        if wrapped {
            Some(FluxEvent::Index(flux))
        } else {
            Some(FluxEvent::Flux(flux))
        }
    }

    fn data_rpm(&self) -> u32 {
        self.data_rpm
    }
}
