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

    src/stream/rpm.rs
*/

//! Nominal spindle RPM and bitcell-timing helpers shared by every stream backend.

/// A standard 3.5" double-density drive spins at 300RPM.
pub const DEFAULT_RPM: u32 = 300;

/// Nominal bitcell period at double density and 300RPM, in nanoseconds.
pub const NOMINAL_NS_PER_CELL_DD: u32 = 2_000;

/// Nominal total bitcells per revolution at double density (~100,150 per §8).
pub const NOMINAL_BITS_PER_TRACK_DD: u32 = 100_150;

/// Nanoseconds in one revolution of a drive spinning at `rpm`.
pub fn track_nsecs_from_rpm(rpm: u32) -> u32 {
    (60_000_000_000u64 / rpm as u64) as u32
}

/// Nanoseconds-per-bitcell implied by `bitlen` bitcells per revolution at `rpm`.
pub fn ns_per_cell_from_rpm(rpm: u32, bitlen: u32) -> u32 {
    track_nsecs_from_rpm(rpm) / bitlen.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nsecs_from_rpm_is_200ms_at_300rpm() {
        assert_eq!(track_nsecs_from_rpm(300), 200_000_000);
    }
}
