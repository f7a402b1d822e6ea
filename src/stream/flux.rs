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

    src/stream/flux.rs

    The four physical-capture [`StreamBackend`]s named in §6 of the spec:
    SuperCard Pro (`.scp`), KryoFlux stream files, HFE bitcell images, and
    the Amiga `diskread` utility's fixed-layout capture. [`open`] sniffs a
    path by extension and magic bytes and returns a ready-to-use [`Stream`].

    Grounded on libdisk's `stream/diskread.c` (the `DiskReadBackend`) and on
    the teacher's own `file_parsers::{scp, kryoflux, hfe}` binrw layouts for
    the other three, adapted from "parse into a `DiskImage`" to "parse into
    a sequence of [`FluxEvent`]s one track at a time".
*/

use std::fs;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use binrw::{binrw, BinRead, BinReaderExt};

use super::backend::{FluxEvent, StreamBackend};
use super::rpm::DEFAULT_RPM;
use super::soft::SoftStream;
use super::Stream;
use crate::DiskImageError;

/// PAL Amiga CIA timer frequency (0.709379 MHz); the tick unit `diskread`
/// captures latency in. Grounded on `diskread.c`'s `CIA_FREQ`.
const CIA_FREQ: u32 = 709_379;
const CIA_NS_PER_TICK: u32 = 1_000_000_000 / CIA_FREQ;

const DR_BYTES_PER_TRACK: usize = 128 * 1024;
const DR_TRACKS_PER_FILE: usize = 160;
const DR_BYTES_PER_FILE: usize = DR_BYTES_PER_TRACK * DR_TRACKS_PER_FILE;

/// A [`StreamBackend`] over an Amiga `diskread` capture (`.dat`, exactly
/// `160 * 128KiB`): each track is `(latency_byte, data_byte)` pairs, the
/// latency in CIA timer ticks with its top bit marking an index pulse.
/// Grounded verbatim on `stream/diskread.c`.
pub struct DiskReadBackend {
    file: Vec<u8>,
    track: Vec<u8>,
    idx: usize,
    bpos: u8,
    byte_latency_ns: u32,
}

impl DiskReadBackend {
    /// `data` must be exactly `160 * 128KiB` bytes, as checked by [`open`].
    pub fn new(data: Vec<u8>) -> Self {
        DiskReadBackend {
            file: data,
            track: Vec::new(),
            idx: 0,
            bpos: 0,
            byte_latency_ns: 0,
        }
    }
}

impl StreamBackend for DiskReadBackend {
    fn select_track(&mut self, tracknr: u32) -> Result<(), DiskImageError> {
        if tracknr as usize >= DR_TRACKS_PER_FILE {
            return Err(DiskImageError::SeekError);
        }
        let off = tracknr as usize * DR_BYTES_PER_TRACK;
        self.track = self.file[off..off + DR_BYTES_PER_TRACK].to_vec();
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        // Skip garbage start-of-track data, exactly as `dr_reset` does.
        let mut i = 16usize;
        while i < DR_BYTES_PER_TRACK / 2 && self.track[2 * i + 1] == 0 {
            i += 1;
        }
        self.idx = i;
        self.bpos = 0;
    }

    fn next_flux(&mut self) -> Option<FluxEvent> {
        let mut flux: u32 = 0;
        let mut is_index = false;
        loop {
            if self.bpos & 7 == 0 {
                if self.idx >= DR_BYTES_PER_TRACK / 2 {
                    return None;
                }
                let raw_latency = self.track[2 * self.idx];
                if raw_latency & 0x80 != 0 {
                    is_index = true;
                }
                self.byte_latency_ns = ((raw_latency & 0x7f) as u32) * CIA_NS_PER_TICK;
                self.idx += 1;
                self.bpos = 0;
            }
            let b = self.track[2 * (self.idx - 1) + 1];
            let bit = (b >> (7 - self.bpos)) & 1 != 0;

            flux += self.byte_latency_ns >> 3;
            self.bpos += 1;
            if self.bpos == 8 {
                flux += self.byte_latency_ns & 7;
            }
            if bit || flux >= 1_000_000 {
                break;
            }
        }
        Some(if is_index {
            FluxEvent::Index(flux)
        } else {
            FluxEvent::Flux(flux)
        })
    }

    fn data_rpm(&self) -> u32 {
        DEFAULT_RPM
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
struct ScpFileHeader {
    id: [u8; 3],
    version: u8,
    disk_type: u8,
    revolutions: u8,
    start_track: u8,
    end_track: u8,
    flags: u8,
    bit_cell_width: u8,
    heads: u8,
    resolution: u8,
    checksum: u32,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy)]
struct ScpTrackRevolution {
    index_time: u32,
    track_length: u32,
    data_offset: u32,
}

/// One parsed track's worth of flux intervals, each in nanoseconds, with the
/// index-terminated revolution boundaries the SCP format stores explicitly.
struct ScpTrack {
    revolutions: Vec<Vec<u32>>,
}

/// A [`StreamBackend`] over a SuperCard Pro (`.scp`) capture: a fixed
/// 16-byte header, a 168-entry track-offset table, then per-track
/// revolution headers and big-endian 16-bit flux-interval samples. Grounded
/// on the teacher's `file_parsers::scp` binrw layout (`ScpFileHeader`,
/// `ScpTrackRevolution`).
pub struct ScpBackend {
    file: Vec<u8>,
    track_offsets: [u32; 168],
    resolution_ns: u32,
    revolutions: u8,
    current: Option<ScpTrack>,
    rev_idx: usize,
    sample_idx: usize,
}

impl ScpBackend {
    pub fn new(file: Vec<u8>) -> Result<Self, DiskImageError> {
        let mut cursor = Cursor::new(&file);
        let header = ScpFileHeader::read(&mut cursor)
            .map_err(|e| DiskImageError::IoError(e.to_string()))?;
        if &header.id != b"SCP" {
            return Err(DiskImageError::SignatureMismatch);
        }
        let mut track_offsets = [0u32; 168];
        for slot in track_offsets.iter_mut() {
            *slot = cursor
                .read_le::<u32>()
                .map_err(|e| DiskImageError::IoError(e.to_string()))?;
        }
        // SCP's resolution byte counts 25ns ticks above the 25ns base unit.
        let resolution_ns = (header.resolution as u32 + 1) * 25;
        Ok(ScpBackend {
            file,
            track_offsets,
            resolution_ns,
            revolutions: header.revolutions,
            current: None,
            rev_idx: 0,
            sample_idx: 0,
        })
    }

    fn parse_track(&self, tracknr: u32) -> Result<ScpTrack, DiskImageError> {
        let slot = *self
            .track_offsets
            .get(tracknr as usize)
            .ok_or(DiskImageError::SeekError)?;
        if slot == 0 {
            return Err(DiskImageError::SeekError);
        }
        let track_base = slot as u64;
        let mut cursor = Cursor::new(&self.file);
        cursor
            .seek(SeekFrom::Start(track_base))
            .map_err(|e| DiskImageError::IoError(e.to_string()))?;
        let mut tid = [0u8; 3];
        cursor
            .read_exact(&mut tid)
            .map_err(|e| DiskImageError::IoError(e.to_string()))?;
        if &tid != b"TRK" {
            return Err(DiskImageError::ImageCorruptError);
        }
        let _track_number: u8 = cursor
            .read_le()
            .map_err(|e| DiskImageError::IoError(e.to_string()))?;

        let mut revolutions = Vec::new();
        for _ in 0..self.revolutions {
            let rev = ScpTrackRevolution::read(&mut cursor)
                .map_err(|e| DiskImageError::IoError(e.to_string()))?;
            let data_start = track_base + rev.data_offset as u64;
            let mut samples = Vec::with_capacity(rev.track_length as usize);
            let mut sc = Cursor::new(&self.file);
            sc.seek(SeekFrom::Start(data_start))
                .map_err(|e| DiskImageError::IoError(e.to_string()))?;
            let mut overflow: u32 = 0;
            for _ in 0..rev.track_length {
                let sample: u16 = sc
                    .read_be()
                    .map_err(|e| DiskImageError::IoError(e.to_string()))?;
                if sample == 0 {
                    overflow += 0x1_0000;
                    continue;
                }
                samples.push((overflow + sample as u32) * self.resolution_ns);
                overflow = 0;
            }
            revolutions.push(samples);
        }
        Ok(ScpTrack { revolutions })
    }
}

impl StreamBackend for ScpBackend {
    fn select_track(&mut self, tracknr: u32) -> Result<(), DiskImageError> {
        self.current = Some(self.parse_track(tracknr)?);
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.rev_idx = 0;
        self.sample_idx = 0;
    }

    fn next_flux(&mut self) -> Option<FluxEvent> {
        let track = self.current.as_ref()?;
        if track.revolutions.is_empty() {
            return None;
        }
        let rev = &track.revolutions[self.rev_idx % track.revolutions.len()];
        if rev.is_empty() {
            return None;
        }
        let ns = rev[self.sample_idx];
        let is_last = self.sample_idx + 1 == rev.len();
        self.sample_idx += 1;
        if is_last {
            self.sample_idx = 0;
            self.rev_idx += 1;
        }
        Some(if is_last {
            FluxEvent::Index(ns)
        } else {
            FluxEvent::Flux(ns)
        })
    }

    fn data_rpm(&self) -> u32 {
        DEFAULT_RPM
    }
}

/// KryoFlux master clock constants, grounded on the teacher's
/// `KFX_DEFAULT_{MCK,SCK,ICK}`.
const KFX_MCK: f64 = (18_432_000.0 * 73.0) / 14.0 / 2.0;
const KFX_SCK: f64 = KFX_MCK / 2.0;

/// A [`StreamBackend`] over a KryoFlux stream-file capture: one `.raw` file
/// per (cylinder, side), named `trackNN.S.raw` in a capture directory.
/// Grounded on the teacher's `file_parsers::kryoflux` OOB/flux block
/// decode loop, simplified to a single forward pass that tags the flux
/// sample following an `Index` OOB block as the revolution boundary.
pub struct KryoFluxBackend {
    dir: PathBuf,
    samples: Vec<(u32, bool)>,
    pos: usize,
}

impl KryoFluxBackend {
    pub fn new(dir: PathBuf) -> Self {
        KryoFluxBackend {
            dir,
            samples: Vec::new(),
            pos: 0,
        }
    }

    fn track_path(&self, tracknr: u32) -> PathBuf {
        let cyl = tracknr / 2;
        let side = tracknr % 2;
        self.dir.join(format!("{:02}.{}.raw", cyl, side))
    }

    fn decode(path: &Path) -> Result<Vec<(u32, bool)>, DiskImageError> {
        let data = fs::read(path)?;
        let mut samples = Vec::new();
        let mut i = 0usize;
        let mut overflow: u32 = 0;
        let mut pending_index = false;
        while i < data.len() {
            let byte = data[i];
            match byte {
                0x00..=0x07 => {
                    if i + 1 >= data.len() {
                        break;
                    }
                    let raw = u16::from_be_bytes([byte, data[i + 1]]) as f64;
                    let ns = ((overflow as f64) + raw) / KFX_SCK * 1e9;
                    samples.push((ns as u32, pending_index));
                    pending_index = false;
                    overflow = 0;
                    i += 2;
                }
                0x08 => {
                    i += 1;
                }
                0x09 => {
                    i += 2;
                }
                0x0A => {
                    i += 3;
                }
                0x0B => {
                    overflow = overflow.saturating_add(0x1_0000);
                    i += 1;
                }
                0x0C => {
                    if i + 2 >= data.len() {
                        break;
                    }
                    let raw = u16::from_be_bytes([data[i + 1], data[i + 2]]) as f64;
                    let ns = ((overflow as f64) + raw) / KFX_SCK * 1e9;
                    samples.push((ns as u32, pending_index));
                    pending_index = false;
                    overflow = 0;
                    i += 3;
                }
                0x0D => {
                    if i + 1 >= data.len() {
                        break;
                    }
                    let oob_type = data[i + 1];
                    let size_off = i + 2;
                    if size_off + 1 >= data.len() {
                        break;
                    }
                    let size = u16::from_le_bytes([data[size_off], data[size_off + 1]]) as usize;
                    match oob_type {
                        0x02 => pending_index = true,
                        0x0D => break,
                        _ => {}
                    }
                    i = size_off + 2 + size;
                }
                _ => {
                    i += 1;
                }
            }
        }
        Ok(samples)
    }
}

impl StreamBackend for KryoFluxBackend {
    fn select_track(&mut self, tracknr: u32) -> Result<(), DiskImageError> {
        let path = self.track_path(tracknr);
        self.samples = Self::decode(&path)?;
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.pos = 0;
    }

    fn next_flux(&mut self) -> Option<FluxEvent> {
        if self.samples.is_empty() {
            return None;
        }
        let (ns, is_index) = self.samples[self.pos % self.samples.len()];
        self.pos += 1;
        Some(if is_index {
            FluxEvent::Index(ns)
        } else {
            FluxEvent::Flux(ns)
        })
    }

    fn data_rpm(&self) -> u32 {
        DEFAULT_RPM
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
struct HfeFileHeader {
    signature: [u8; 8],
    _format_revision: u8,
    number_of_tracks: u8,
    number_of_sides: u8,
    _track_encoding: u8,
    _bit_rate: u16,
    rpm: u16,
    _interface_mode: u8,
    _unused: u8,
    track_list_offset: u16,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy)]
struct HfeTrackIndexEntry {
    offset: u16,
    len: u16,
}

const HFE_BLOCK: u64 = 0x200;

/// A [`StreamBackend`] over an HFE bitcell image: already-MFM-encoded bits
/// per track, interleaved in 256-byte (side0, side1) chunks within 512-byte
/// blocks, bits stored LSB-first. Decoded tracks are re-synthesized into
/// flux exactly as [`SoftStream`] does, since HFE is "bitcell-oriented but
/// treated as flux" per the spec's Stream backend list. Grounded on the
/// teacher's `file_parsers::hfe` header/LUT layout.
pub struct HfeBackend {
    tracks: Vec<(Vec<u8>, u32)>,
    rpm: u32,
    current: Option<SoftStream>,
}

const HFE_REVERSE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut b = i as u8;
        b = (b >> 4) | (b << 4);
        b = ((b & 0x33) << 2) | ((b & 0xCC) >> 2);
        b = ((b & 0x55) << 1) | ((b & 0xAA) >> 1);
        table[i] = b;
        i += 1;
    }
    table
};

impl HfeBackend {
    pub fn new(file: Vec<u8>) -> Result<Self, DiskImageError> {
        let mut cursor = Cursor::new(&file);
        let header =
            HfeFileHeader::read(&mut cursor).map_err(|e| DiskImageError::IoError(e.to_string()))?;
        if &header.signature != b"HXCPICFE" {
            return Err(DiskImageError::SignatureMismatch);
        }
        let sides = header.number_of_sides.max(1) as usize;
        let lut_off = header.track_list_offset as u64 * HFE_BLOCK;
        let mut cursor = Cursor::new(&file);
        cursor
            .seek(SeekFrom::Start(lut_off))
            .map_err(|e| DiskImageError::IoError(e.to_string()))?;
        let mut lut = Vec::with_capacity(header.number_of_tracks as usize);
        for _ in 0..header.number_of_tracks {
            lut.push(
                HfeTrackIndexEntry::read(&mut cursor)
                    .map_err(|e| DiskImageError::IoError(e.to_string()))?,
            );
        }

        let mut tracks = Vec::with_capacity(lut.len() * sides);
        for entry in &lut {
            let data_off = entry.offset as u64 * HFE_BLOCK;
            let block_ct = (entry.len as u64 + 511) / 512;
            let mut side_bits: [Vec<bool>; 2] = [Vec::new(), Vec::new()];
            for blk in 0..block_ct {
                let blk_off = (data_off + blk * 512) as usize;
                if blk_off + 512 > file.len() {
                    break;
                }
                for side in 0..2usize {
                    let chunk = &file[blk_off + side * 256..blk_off + side * 256 + 256];
                    for &byte in chunk {
                        let r = HFE_REVERSE[byte as usize];
                        for bit_i in 0..8 {
                            side_bits[side].push((r >> (7 - bit_i)) & 1 != 0);
                        }
                    }
                }
            }
            for side in 0..sides {
                let bits = &side_bits[side];
                let bitlen = bits.len() as u32;
                let mut packed = vec![0u8; (bits.len() + 7) / 8];
                for (i, &b) in bits.iter().enumerate() {
                    if b {
                        packed[i / 8] |= 0x80 >> (i % 8);
                    }
                }
                tracks.push((packed, bitlen));
            }
        }

        let rpm = if header.rpm != 0 {
            header.rpm as u32
        } else {
            DEFAULT_RPM
        };
        Ok(HfeBackend { tracks, rpm, current: None })
    }
}

impl StreamBackend for HfeBackend {
    fn select_track(&mut self, tracknr: u32) -> Result<(), DiskImageError> {
        let (bits, bitlen) = self
            .tracks
            .get(tracknr as usize)
            .ok_or(DiskImageError::SeekError)?
            .clone();
        self.current = Some(SoftStream::new(bits, None, bitlen, self.rpm));
        Ok(())
    }

    fn reset(&mut self) {
        if let Some(s) = self.current.as_mut() {
            s.reset();
        }
    }

    fn next_flux(&mut self) -> Option<FluxEvent> {
        self.current.as_mut()?.next_flux()
    }

    fn data_rpm(&self) -> u32 {
        self.rpm
    }
}

/// Probe `path` by extension and magic bytes (§4.2 `Stream::open`) and
/// return a ready-to-use [`Stream`] over the matching backend.
///
/// KryoFlux captures are a directory of per-(cylinder, side) `.raw` files
/// rather than a single file; `path` should name that directory.
pub fn open(path: &Path) -> Result<Stream, DiskImageError> {
    if path.is_dir() {
        return Ok(Stream::new(Box::new(KryoFluxBackend::new(path.to_path_buf()))));
    }

    let data = fs::read(path)?;

    if data.len() == DR_BYTES_PER_FILE {
        return Ok(Stream::new(Box::new(DiskReadBackend::new(data))));
    }
    if data.len() >= 3 && &data[0..3] == b"SCP" {
        return Ok(Stream::new(Box::new(ScpBackend::new(data)?)));
    }
    if data.len() >= 8 && &data[0..8] == b"HXCPICFE" {
        return Ok(Stream::new(Box::new(HfeBackend::new(data)?)));
    }

    Err(DiskImageError::SignatureMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diskread_fixture() -> Vec<u8> {
        let mut file = vec![0u8; DR_BYTES_PER_FILE];
        // One track: a handful of (latency, data) pairs with the first
        // carrying the index-pulse marker bit.
        let pairs: [(u8, u8); 4] = [(0x80 | 40, 0xAA), (40, 0x55), (40, 0xAA), (40, 0x55)];
        for (i, (lat, b)) in pairs.iter().enumerate() {
            file[2 * i] = *lat;
            file[2 * i + 1] = *b;
        }
        file
    }

    #[test]
    fn diskread_backend_reports_index_on_high_bit_latency() {
        let mut backend = DiskReadBackend::new(diskread_fixture());
        backend.select_track(0).unwrap();
        let mut saw_index = false;
        for _ in 0..64 {
            match backend.next_flux() {
                Some(FluxEvent::Index(_)) => saw_index = true,
                Some(FluxEvent::Flux(_)) => {}
                None => break,
            }
        }
        assert!(saw_index);
    }

    #[test]
    fn open_rejects_unrecognized_file() {
        let dir = std::env::temp_dir().join("amimfm_flux_open_test_garbage.bin");
        fs::write(&dir, b"not a disk image").unwrap();
        let result = open(&dir);
        let _ = fs::remove_file(&dir);
        assert!(matches!(result, Err(DiskImageError::SignatureMismatch)));
    }
}
