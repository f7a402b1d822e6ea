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

    src/analyser.rs

    The disk analyser: dispatches an unidentified track to each registered
    handler in priority order, recording the first one that claims it.
    Never returns a hard error for an unrecognized track -- it falls back
    to a raw density capture, and only then to Unformatted.
*/

//! Drives [`crate::handler::Registry`] against one track at a time, turning
//! a bare flux/bitcell [`crate::stream::Stream`] into a [`crate::disk::TrackInfo`].

use log::info;

use crate::disk::{Disk, TrackInfo};
use crate::handler::{DecodedTrack, Handler, Registry};
use crate::stream::Stream;
use crate::DiskImageError;

/// Identify `tracknr` from `stream`, preferring `requested` (a handler name)
/// if given, else trying every handler in `registry`'s priority order, else
/// falling back to the raw density capture, else marking the track
/// unformatted. Always succeeds (a track is never left un-analysed); the
/// only propagated errors are ones that make the source itself unusable.
pub fn write_raw(
    disk: &Disk,
    registry: &Registry,
    tracknr: u16,
    stream: &mut Stream,
    requested: Option<&str>,
) -> Result<TrackInfo, DiskImageError> {
    if let Some(name) = requested {
        let handler = registry
            .by_name(name)
            .ok_or(DiskImageError::ParameterError)?;
        stream.reset();
        if let Some(decoded) = handler.write_raw(disk, tracknr, stream)? {
            return Ok(finish(handler, decoded, stream));
        }
        return Ok(TrackInfo::unformatted());
    }

    for handler in registry.iter() {
        stream.reset();
        if let Some(decoded) = handler.write_raw(disk, tracknr, stream)? {
            info!("track {}: recognized as '{}'", tracknr, handler.name());
            return Ok(finish(handler, decoded, stream));
        }
    }

    // Every registered handler declined, including `unformatted` itself --
    // this only happens when the stream yielded too few bitcells for even
    // that handler's scan window to run (e.g. a completely empty source).
    info!("track {}: no handler matched, marking unformatted", tracknr);
    Ok(TrackInfo::unformatted())
}

/// Assemble a [`TrackInfo`] from a handler's successful [`DecodedTrack`]. If
/// the handler left `total_bits` unset, finish consuming the current
/// revolution so the stream's measured index-to-index length can be used
/// instead (§3: `total_bits` positions the payload within the revolution).
fn finish(handler: &dyn Handler, decoded: DecodedTrack, stream: &mut Stream) -> TrackInfo {
    let (bytes_per_sector, nr_sectors) = handler.geometry();
    let total_bits = match decoded.total_bits {
        Some(bits) => bits,
        None => {
            stream.next_index();
            stream.track_len_bc
        }
    };
    TrackInfo {
        type_name: handler.name().to_string(),
        bytes_per_sector,
        nr_sectors,
        valid_sectors: decoded.valid_sectors,
        payload: decoded.payload,
        data_bitoff: decoded.data_bitoff,
        total_bits,
        weak: Vec::new(),
        flags: decoded.flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::TrackInfo as TI;
    use crate::handler::registry::standard_registry;
    use crate::handlers::amigados::{SECTORS_PER_TRACK, SECTOR_BYTES};
    use crate::stream::{rpm, SoftStream};
    use crate::tbuf::TrackBuffer;

    #[test]
    fn recognizes_an_amigados_track_through_the_full_dispatch_chain() {
        let registry = standard_registry();
        let payload: Vec<u8> = (0..SECTORS_PER_TRACK * SECTOR_BYTES)
            .map(|i| (i * 5 + 1) as u8)
            .collect();

        let mut seed_disk = Disk::new();
        seed_disk
            .set_track(
                0,
                TI {
                    type_name: "amigados".to_string(),
                    bytes_per_sector: SECTOR_BYTES as u16,
                    nr_sectors: SECTORS_PER_TRACK as u8,
                    valid_sectors: (1 << SECTORS_PER_TRACK) - 1,
                    payload: payload.clone(),
                    ..TI::unformatted()
                },
            )
            .unwrap();

        let handler = registry.by_name("amigados").unwrap();
        let mut tbuf = TrackBuffer::new(1);
        handler.read_raw(&seed_disk, 0, &mut tbuf).unwrap();
        let (bits, speed, bitlen) = tbuf.materialize();

        let backend = SoftStream::new(bits, Some(speed), bitlen, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));

        let empty_disk = Disk::new();
        let info = write_raw(&empty_disk, &registry, 0, &mut stream, None).unwrap();
        assert_eq!(info.type_name, "amigados");
        assert_eq!(info.payload, payload);
        assert!(info.all_sectors_valid());
    }

    #[test]
    fn falls_back_to_unformatted_when_the_source_yields_no_bitcells() {
        let registry = standard_registry();
        let backend = SoftStream::new(Vec::new(), None, 0, rpm::DEFAULT_RPM);
        let mut stream = Stream::new(Box::new(backend));
        let disk = Disk::new();
        let info = write_raw(&disk, &registry, 0, &mut stream, None).unwrap();
        // An empty track produces no bitcells at all, so every handler (raw_dd
        // included) declines and the analyser lands on unformatted.
        assert_eq!(info.type_name, "unformatted");
    }
}
