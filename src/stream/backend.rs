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

    src/stream/backend.rs

    The backend trait every stream source (flux capture or in-memory
    bitcell buffer) implements. Every backend -- including the soft,
    already-decoded bitcell backend -- is driven through the same
    flux-interval interface, exactly as upstream libdisk's `stream_soft`
    re-synthesizes flux from its bit array so the generic PLL loop in
    `stream::Stream::next_bit` never needs to special-case it.
*/

use crate::DiskImageError;

/// One flux-interval event reported by a backend.
#[derive(Copy, Clone, Debug)]
pub enum FluxEvent {
    /// `ns` nanoseconds until the next flux reversal; no index pulse in this interval.
    Flux(u32),
    /// `ns` nanoseconds until the next flux reversal; an index pulse occurs at the end
    /// of this interval (i.e. coincides with the reversal).
    Index(u32),
}

/// A `Stream` backend: a source of successive flux-reversal intervals for one track.
///
/// Mirrors libdisk's `struct stream_type` (`stream.h`): `open`/`close` are
/// handled by the container/builder that constructs the backend, so the
/// trait itself only needs the per-track operations.
pub trait StreamBackend: Send {
    /// Seek to the given track number, resetting all per-track position state.
    fn select_track(&mut self, tracknr: u32) -> Result<(), DiskImageError>;

    /// Rewind the current track to its origin.
    fn reset(&mut self);

    /// Produce the next flux-reversal interval, or `None` at end of stream
    /// (only soft/bounded backends reach genuine end of stream; physical
    /// flux captures loop via `max_revolutions`).
    fn next_flux(&mut self) -> Option<FluxEvent>;

    /// Nominal recording RPM of this backend's source, used to seed the PLL's
    /// centre clock period.
    fn data_rpm(&self) -> u32;
}
