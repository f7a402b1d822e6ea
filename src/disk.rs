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

    src/disk.rs

    The in-memory whole-disk model: a fixed-size array of per-track state,
    each holding the canonical payload a handler decoded plus the metadata
    a container needs to lay it back out.
*/

//! [`Disk`] is the library's central value: a 160-track Amiga floppy image,
//! built up by the analyser and read back out through a container writer.

use bitflags::bitflags;

use crate::{DiskImageError, NR_TRACKS};

bitflags! {
    /// Per-track flags recorded alongside a decoded track.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct TrackInfoFlags: u8 {
        /// The track spins in the opposite direction from index to index
        /// relative to the disk's nominal rotation (rare, but a handful of
        /// protections rely on detecting it).
        const REVERSE_ENDIAN = 1 << 0;
        /// This track is authoritatively a repeat of the cylinder before it
        /// (40-cylinder image read back at 80-cylinder density).
        const STEP_DOUBLED   = 1 << 1;
        /// At least one of this track's bitcell regions is weak/flakey.
        const HAS_WEAK_BITS  = 1 << 2;
    }
}

/// The decoded state of a single track: which handler produced it, its
/// canonical payload bytes (the value a handler's `write_raw` returned), and
/// the metadata a container needs to re-synthesize bitcells (sector
/// geometry, validity, positioning, total bitcell count, weak regions).
///
/// Mirrors libdisk's `struct track_info` (§3 of the spec): every field here
/// corresponds 1:1 to a field of that struct.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackInfo {
    /// The handler name that recognized this track (matches
    /// [`crate::handler::Handler::name`]); `"unformatted"` for tracks no
    /// handler claimed.
    pub type_name: String,
    /// Logical sector size for this track's format; for most custom/protection
    /// formats this is the whole custom payload size and `nr_sectors` is 1.
    pub bytes_per_sector: u16,
    /// Logical sector count for this track's format.
    pub nr_sectors: u8,
    /// Bitset of recovered sectors: bit *i* set means sector *i* decoded
    /// successfully. No bit beyond `nr_sectors - 1` is ever set.
    pub valid_sectors: u32,
    /// The canonical decoded payload: exactly what the handler's `write_raw`
    /// returned. Empty for an unformatted track. May exceed
    /// `nr_sectors * bytes_per_sector` when a handler appends ancillary data.
    pub payload: Vec<u8>,
    /// Bitcells between the index pulse and the first payload bitcell.
    pub data_bitoff: u32,
    /// Total bitcells the handler's `read_raw` re-synthesizes this track
    /// into. [`crate::WEAK`] marks a track whose length itself is
    /// non-deterministic between reads.
    pub total_bits: u32,
    /// Bitcell ranges marked weak on the most recent re-encode, as
    /// `(start, len)` pairs.
    pub weak: Vec<(u32, u32)>,
    pub flags: TrackInfoFlags,
}

impl TrackInfo {
    /// An empty, present-but-unrecognized track: the baseline a caller can
    /// build a concrete `TrackInfo` from via struct-update syntax
    /// (`TrackInfo { payload, nr_sectors: 1, ..TrackInfo::unformatted() }`).
    pub(crate) fn unformatted() -> Self {
        TrackInfo {
            type_name: "unformatted".to_string(),
            bytes_per_sector: 0,
            nr_sectors: 0,
            valid_sectors: 0,
            payload: Vec::new(),
            data_bitoff: 0,
            total_bits: crate::WEAK,
            weak: Vec::new(),
            flags: TrackInfoFlags::empty(),
        }
    }

    /// `true` if every sector this track's geometry defines decoded
    /// successfully (vacuously true for a zero-sector opaque payload).
    pub fn all_sectors_valid(&self) -> bool {
        if self.nr_sectors == 0 {
            return true;
        }
        let full_mask: u32 = if self.nr_sectors >= 32 {
            u32::MAX
        } else {
            (1u32 << self.nr_sectors) - 1
        };
        self.valid_sectors & full_mask == full_mask
    }
}

/// A whole disk image: [`NR_TRACKS`] tracks, each independently typed and
/// decoded, plus the write-protect status a container may have read off its
/// source medium.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Disk {
    tracks: Vec<Option<TrackInfo>>,
    pub write_protected: bool,
}

impl Disk {
    /// Create an empty disk: every track starts absent (not yet analysed).
    pub fn new() -> Self {
        Disk {
            tracks: vec![None; NR_TRACKS as usize],
            write_protected: false,
        }
    }

    /// The per-track decoded state, or `None` if `tracknr` has not yet been
    /// written via [`Disk::set_track`].
    pub fn track(&self, tracknr: u16) -> Option<&TrackInfo> {
        self.tracks.get(tracknr as usize).and_then(|t| t.as_ref())
    }

    /// Record the decoded state for `tracknr`, overwriting whatever was there.
    pub fn set_track(&mut self, tracknr: u16, info: TrackInfo) -> Result<(), DiskImageError> {
        let slot = self
            .tracks
            .get_mut(tracknr as usize)
            .ok_or(DiskImageError::SeekError)?;
        *slot = Some(info);
        Ok(())
    }

    /// Mark `tracknr` as present but unformatted (no handler claimed it).
    pub fn set_unformatted(&mut self, tracknr: u16) -> Result<(), DiskImageError> {
        self.set_track(tracknr, TrackInfo::unformatted())
    }

    /// Iterate every track slot, `(tracknr, info)`, skipping tracks never written.
    pub fn tracks(&self) -> impl Iterator<Item = (u16, &TrackInfo)> {
        self.tracks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|info| (i as u16, info)))
    }
}

impl Default for Disk {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_disk_has_no_tracks_populated() {
        let disk = Disk::new();
        assert_eq!(disk.tracks().count(), 0);
        assert!(disk.track(0).is_none());
    }

    #[test]
    fn set_unformatted_marks_track_weak_with_no_valid_sectors() {
        let mut disk = Disk::new();
        disk.set_unformatted(5).unwrap();
        let info = disk.track(5).unwrap();
        assert_eq!(info.type_name, "unformatted");
        assert_eq!(info.total_bits, crate::WEAK);
        assert_eq!(info.valid_sectors, 0);
    }

    #[test]
    fn set_track_out_of_range_errors() {
        let mut disk = Disk::new();
        let err = disk.set_unformatted(NR_TRACKS);
        assert!(matches!(err, Err(DiskImageError::SeekError)));
    }

    #[test]
    fn all_sectors_valid_checks_full_bitmask() {
        let mut info = TrackInfo::unformatted();
        info.nr_sectors = 11;
        info.valid_sectors = 0x7FF;
        assert!(info.all_sectors_valid());
        info.valid_sectors = 0x3FF;
        assert!(!info.all_sectors_valid());
    }
}
