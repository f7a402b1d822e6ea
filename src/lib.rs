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
*/

//! # amimfm
//!
//! `amimfm` is a Rust library for decoding, re-encoding, and converting
//! raw magnetic-flux and MFM-bitcell images of 3.5" floppy disks, with a
//! particular focus on Amiga and Amiga-compatible custom track formats.
//!
//! Its central value is a catalogue of per-title track format handlers:
//! each one recognizes a proprietary copy-protection or custom-loader
//! track, recovers its payload into a canonical byte image, and
//! faithfully re-synthesizes the original bitcell stream, including sync
//! marks, checksums, timing anomalies, long tracks, weak bits, and
//! variable-density regions.
//!
//! The crate is organized around four collaborating abstractions:
//!
//! - [`stream`] presents any backing source (a flux capture or a
//!   pre-decoded bitcell buffer) as a uniform, rewindable stream of MFM
//!   bitcells with index-pulse, CRC, and density tracking.
//! - [`tbuf`] is the write counterpart: it accumulates encoded bitcells
//!   with per-region speed, weak-bit markers, and a running CRC.
//! - [`handler`] defines the Handler Contract that every format handler
//!   implements, and the registry that dispatches a `track_type` to its
//!   handler.
//! - [`container`] selects a whole-disk container (the canonical bundle,
//!   ADF, IMG, or raw MFM) and drives its open/close/write-raw lifecycle.
//!
//! [`codec`] holds the MFM encode/decode primitives and checksums that
//! every handler is built on top of, and [`disk`] holds the in-memory
//! whole-disk model.
//!
//! The recommended entry point is [`disk::Disk`]: open one from a
//! container file, or create one fresh and populate it with
//! [`analyser::write_raw`].

pub mod analyser;
pub mod codec;
pub mod container;
pub mod disk;
pub mod handler;
pub mod handlers;
mod random;
pub mod stream;
pub mod tbuf;

use thiserror::Error;

/// The canonical physical geometry of a double-sided, 80-cylinder 3.5" floppy.
pub const NR_TRACKS: u16 = 160;

/// Sentinel value for [`disk::TrackInfo::total_bits`] marking a track as non-deterministic
/// ("weak" or "flakey") -- its bits differ between reads.
pub const WEAK: u32 = u32::MAX;

/// Errors produced by the library's public operations.
///
/// Stream-level failures (end of stream, a handler's sync/checksum
/// mismatch) are recovered locally and never surface here -- see
/// [`handler::Handler::write_raw`] and [`analyser`]. This enum covers
/// container-level and caller-facing failures only.
#[derive(Debug, Error)]
pub enum DiskImageError {
    /// The backing source could not be opened, or was truncated mid-read.
    #[error("an IO error occurred reading or writing the disk image")]
    IoError(String),
    /// A container's `open` found the wrong magic bytes or file size.
    #[error("signature or size mismatch opening the disk image container")]
    SignatureMismatch,
    /// The disk image format parser determined the image was corrupt.
    #[error("the disk image format parser determined the image was corrupt")]
    ImageCorruptError,
    /// A container cannot represent a track of the type requested (e.g. ADF asked
    /// to write a non-AmigaDOS track). The convert is aborted.
    #[error("track {tracknr} of type '{type_name}' cannot be written to this container")]
    IncompatibleWrite { tracknr: u16, type_name: String },
    /// The requested head or cylinder could not be found.
    #[error("the requested track could not be found")]
    SeekError,
    /// An invalid function parameter was supplied.
    #[error("an invalid function parameter was supplied")]
    ParameterError,
    /// Write-protect status prevents writing to the disk image.
    #[error("write-protect status prevents writing to the disk image")]
    WriteProtectError,
}

impl From<std::io::Error> for DiskImageError {
    fn from(err: std::io::Error) -> Self {
        DiskImageError::IoError(err.to_string())
    }
}

impl From<binrw::Error> for DiskImageError {
    fn from(err: binrw::Error) -> Self {
        DiskImageError::IoError(err.to_string())
    }
}
