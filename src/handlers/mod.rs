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

    src/handlers/mod.rs

    A representative catalogue of per-title track format handlers. The full
    catalogue this library is built to hold numbers in the low hundreds; the
    handlers kept here are instances of the Handler Contract chosen to cover
    its distinct shapes: a bare-disk baseline, a title with a custom sync and
    checksum, a title with deliberately non-deterministic (weak) bits, and a
    title with a non-standard bitcell rate.
*/

//! Concrete [`crate::handler::Handler`] implementations. See
//! [`crate::handler::registry::standard_registry`] for the priority order
//! they're dispatched in.

pub mod amigados;
pub mod prison;
pub mod raw;
pub mod rnc;
pub mod silkworm;
pub mod speedlock;
pub mod unformatted;

use crate::handler::Registry;

/// Register every handler this crate ships, title-specific-first, generic
/// custom formats next, the AmigaDOS baseline after that, and the white-noise
/// and raw density fallbacks last. `unformatted` is tried before `raw_dd` so
/// a track of pure flux noise is recognized as such rather than accepted as
/// an opaque raw capture (§8 concrete scenario #3).
pub fn register_all(registry: &mut Registry) {
    registry.register(Box::new(silkworm::Silkworm));
    registry.register(Box::new(prison::Prison));
    registry.register(Box::new(speedlock::Speedlock));
    registry.register(Box::new(rnc::RncDualformat));
    registry.register(Box::new(rnc::RncTriformat));
    registry.register(Box::new(amigados::AmigaDos));
    registry.register(Box::new(unformatted::Unformatted));
    registry.register(Box::new(raw::RawDd));
}
