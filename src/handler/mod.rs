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

    src/handler/mod.rs

    The Handler Contract every per-title track format recognizer and
    re-encoder implements, and the registry that maps a `track_type` name
    to its handler.
*/

//! The Handler Contract (§4.4): every format handler recognizes one track
//! type, decodes it into a canonical payload, and re-synthesizes the
//! original bitcell stream from that payload.

pub mod registry;

use dyn_clone::DynClone;

use crate::disk::{Disk, TrackInfoFlags};
use crate::stream::Stream;
use crate::tbuf::TrackBuffer;
use crate::DiskImageError;

pub use registry::Registry;

/// What a handler's `write_raw` produces on success: the canonical payload
/// plus everything [`crate::disk::TrackInfo`] needs beyond the type tag
/// itself (§3's "Handler Contract invariants", §4.4 point 3-4).
#[derive(Clone, Debug)]
pub struct DecodedTrack {
    /// The canonical decoded payload bytes.
    pub payload: Vec<u8>,
    /// Bitcell offset from the index pulse to the start of the payload
    /// (the sync/start position). See [`crate::disk::TrackInfo::data_bitoff`].
    pub data_bitoff: u32,
    /// Explicit override of the track's total bitcell length (e.g. a "long
    /// track" protection, or [`crate::WEAK`] for a non-deterministic track).
    /// `None` means: use the length this revolution of `stream` actually
    /// measured.
    pub total_bits: Option<u32>,
    /// Bitset of sectors this call recovered; bit *i* set means sector *i*
    /// decoded. For non-sectored (single-payload) formats this is simply
    /// `0b1` on success.
    pub valid_sectors: u32,
    /// Presentation hints for this track (e.g. `HAS_WEAK_BITS`).
    pub flags: TrackInfoFlags,
}

impl DecodedTrack {
    /// The common case: a fully-recovered single-block payload with no weak
    /// regions and the track's natural revolution length.
    pub fn whole(payload: Vec<u8>, data_bitoff: u32) -> Self {
        DecodedTrack {
            payload,
            data_bitoff,
            total_bits: None,
            valid_sectors: 1,
            flags: TrackInfoFlags::empty(),
        }
    }
}

/// A recognizer and re-encoder for one track format.
///
/// `write_raw` attempts to decode `tracknr` from `stream`; a `None` return
/// means "this handler does not recognize this track" and is never an error
/// -- the caller (the analyser, or a composed handler layering protection
/// atop a base format) tries the next candidate. Sync mismatches, checksum
/// failures, and running past `max_revolutions` are all folded into `None`;
/// they never propagate as [`DiskImageError`].
///
/// `read_raw` is the inverse: given the payload a prior `write_raw` produced,
/// re-encode it into `tbuf` bit for bit. A handler that round-trips
/// correctly produces a `tbuf` whose materialized bits, when driven back
/// through `write_raw`, yield the same payload again (§8 round-trip
/// idempotence).
pub trait Handler: DynClone + Send + Sync {
    /// The track type name this handler registers under, e.g. `"silkworm"`,
    /// `"amigados"`, `"raw_dd"`.
    fn name(&self) -> &'static str;

    /// This handler's static sector geometry: `(bytes_per_sector, nr_sectors)`.
    /// Formats with one opaque payload and no sector structure (most
    /// protections) report `(payload_len, 1)`; the registry does not need
    /// this to be a compile-time constant since it only needs to match the
    /// `TrackInfo` a successful `write_raw` produces.
    fn geometry(&self) -> (u16, u8);

    /// Decode `tracknr` from `stream`, or return `Ok(None)` if this handler
    /// does not recognize it.
    fn write_raw(
        &self,
        disk: &Disk,
        tracknr: u16,
        stream: &mut Stream,
    ) -> Result<Option<DecodedTrack>, DiskImageError>;

    /// Re-encode `tracknr`'s canonical payload (as looked up from `disk`)
    /// into `tbuf`.
    fn read_raw(
        &self,
        disk: &Disk,
        tracknr: u16,
        tbuf: &mut TrackBuffer,
    ) -> Result<(), DiskImageError>;
}

dyn_clone::clone_trait_object!(Handler);
