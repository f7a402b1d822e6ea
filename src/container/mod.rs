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

    src/container/mod.rs

    Selects a whole-disk container implementation by name or file signature
    and drives its open/close lifecycle (§4.5). The canonical bundle is the
    native, lossless container; ADF, IMG, and raw MFM are lossy projections
    that only round-trip the subset of tracks they can represent.
*/

//! Whole-disk container formats: the canonical bundle (native, lossless) and
//! three lossy projections onto third-party formats (ADF, IMG, raw MFM).

pub mod adf;
pub mod bundle;
pub mod img;
pub mod rawmfm;

use std::io::{Read, Seek, Write};

use crate::disk::Disk;
use crate::handler::Registry;
use crate::stream::Stream;
use crate::DiskImageError;

/// The open set of container formats this crate ships a projection for.
///
/// Mirrors libdisk's `container_list` dispatch (`private/disk.h`): a
/// container is selected either by its registered name or by probing a
/// source's signature/size, and the first match wins.
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum::Display, strum::EnumString)]
pub enum ContainerFormat {
    /// The native, lossless container (§6).
    #[strum(serialize = "bundle")]
    Bundle,
    /// 160 tracks x 11 sectors x 512 bytes, AmigaDOS-compatible tracks only.
    #[strum(serialize = "adf")]
    Adf,
    /// A flat dump of logical sector contents; write-only.
    #[strum(serialize = "img")]
    Img,
    /// A flat dump of raw DD bitcells; write-only, `RawDd` tracks only.
    #[strum(serialize = "mfm")]
    RawMfm,
}

impl ContainerFormat {
    /// This format's canonical name, as accepted by [`ContainerFormat::by_name`].
    pub fn name(self) -> &'static str {
        match self {
            ContainerFormat::Bundle => "bundle",
            ContainerFormat::Adf => "adf",
            ContainerFormat::Img => "img",
            ContainerFormat::RawMfm => "mfm",
        }
    }

    /// Look up a container format by its exact registered name, via the
    /// [`strum::EnumString`] derive above rather than a second hand-written
    /// match arm.
    pub fn by_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Probe `reader` (already positioned at its start) for this format's
    /// signature or file size, without consuming it permanently -- the
    /// reader is rewound to its starting position before returning.
    ///
    /// Tried in the order a caller without an explicit format name should
    /// use: the canonical bundle's magic is the most specific signature, ADF
    /// is next most specific (magic or exact size), and the two write-only
    /// formats have no signature at all and are never auto-detected.
    pub fn detect<R: Read + Seek>(reader: &mut R) -> Result<Option<Self>, DiskImageError> {
        let start = reader.stream_position()?;
        let is_bundle = bundle::detect(reader)?;
        reader.seek(std::io::SeekFrom::Start(start))?;

        let detected = if is_bundle {
            Some(ContainerFormat::Bundle)
        } else if adf::detect(reader)? {
            Some(ContainerFormat::Adf)
        } else {
            None
        };
        reader.seek(std::io::SeekFrom::Start(start))?;
        Ok(detected)
    }

    /// Open `reader` as this container format, decoding a whole [`Disk`].
    ///
    /// Only [`ContainerFormat::Bundle`] and [`ContainerFormat::Adf`] support
    /// this direction (§4.5: IMG and raw MFM are "only writable"); the other
    /// two return [`DiskImageError::SignatureMismatch`].
    pub fn open<R: Read + Seek>(self, reader: &mut R) -> Result<Disk, DiskImageError> {
        match self {
            ContainerFormat::Bundle => bundle::open(reader),
            ContainerFormat::Adf => adf::open(reader),
            ContainerFormat::Img | ContainerFormat::RawMfm => Err(DiskImageError::SignatureMismatch),
        }
    }

    /// Write `disk` to `writer` in this container's format.
    pub fn close<W: Write>(self, disk: &Disk, writer: &mut W) -> Result<(), DiskImageError> {
        match self {
            ContainerFormat::Bundle => bundle::close(disk, writer),
            ContainerFormat::Adf => adf::close(disk, writer),
            ContainerFormat::Img => img::close(disk, writer),
            ContainerFormat::RawMfm => rawmfm::close(disk, writer),
        }
    }
}

/// The generic analysis-driven container builder used by [`img`] and
/// [`rawmfm`] (§4.5's `dsk_init`/`dsk_write_raw` helpers): both of those
/// containers have no read direction of their own, so converting *into*
/// them starts from a source [`Stream`] per track and defers entirely to
/// the [`crate::analyser`] to populate a fresh [`Disk`], one track at a
/// time, which is then handed to [`ContainerFormat::close`].
pub fn dsk_init() -> Disk {
    Disk::new()
}

/// Analyse `tracknr` from `stream` and record the result on `disk`, exactly
/// as [`crate::analyser::write_raw`] would for any other caller. Kept as a
/// named entry point here because both lossy write-only containers build
/// their source `Disk` this way rather than by loading an existing one.
pub fn dsk_write_raw(
    disk: &mut Disk,
    registry: &Registry,
    tracknr: u16,
    stream: &mut Stream,
) -> Result<(), DiskImageError> {
    let info = crate::analyser::write_raw(disk, registry, tracknr, stream, None)?;
    disk.set_track(tracknr, info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_name_round_trips_through_name() {
        for fmt in [
            ContainerFormat::Bundle,
            ContainerFormat::Adf,
            ContainerFormat::Img,
            ContainerFormat::RawMfm,
        ] {
            assert_eq!(ContainerFormat::by_name(fmt.name()), Some(fmt));
        }
    }

    #[test]
    fn img_and_mfm_have_no_read_direction() {
        let disk = Disk::new();
        let mut buf = Vec::new();
        ContainerFormat::Img.close(&disk, &mut buf).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        assert!(matches!(
            ContainerFormat::Img.open(&mut cursor),
            Err(DiskImageError::SignatureMismatch)
        ));
    }
}
