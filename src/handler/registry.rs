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

    src/handler/registry.rs

    Maps a track_type name to its handler, and exposes the priority order
    the disk analyser tries candidates in: title-specific handlers first,
    generic custom formats next, the AmigaDOS baseline after that, and the
    raw density fallbacks last.
*/

use std::collections::HashMap;

use super::Handler;

/// An ordered catalogue of format handlers.
///
/// Handlers are tried in registration order, so callers should register
/// from most-specific to least-specific: title-specific protections before
/// generic custom formats, and the AmigaDOS baseline and raw fallbacks last
/// of all, matching libdisk's `format_list` strategy of "the first handler
/// to claim a track wins."
#[derive(Clone)]
pub struct Registry {
    order: Vec<Box<dyn Handler>>,
    by_name: HashMap<&'static str, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            order: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register `handler`, appending it to the end of the priority order.
    pub fn register(&mut self, handler: Box<dyn Handler>) {
        self.by_name.insert(handler.name(), self.order.len());
        self.order.push(handler);
    }

    /// Look up a handler by its exact registered name.
    pub fn by_name(&self, name: &str) -> Option<&dyn Handler> {
        self.by_name.get(name).map(|&i| self.order[i].as_ref())
    }

    /// Iterate every registered handler in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Handler> {
        self.order.iter().map(|h| h.as_ref())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the registry with every handler [`crate::handlers`] supplies,
/// already ordered title-specific-first per [`Registry`]'s contract.
pub fn standard_registry() -> Registry {
    let mut registry = Registry::new();
    crate::handlers::register_all(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::amigados::AmigaDos;

    #[test]
    fn lookup_by_name_finds_registered_handler() {
        let mut registry = Registry::new();
        registry.register(Box::new(AmigaDos));
        assert!(registry.by_name("amigados").is_some());
        assert!(registry.by_name("nonexistent").is_none());
    }

    #[test]
    fn standard_registry_places_amigados_before_the_fallbacks() {
        let registry = standard_registry();
        let names: Vec<&str> = registry.iter().map(|h| h.name()).collect();
        let amigados_pos = names.iter().position(|&n| n == "amigados").unwrap();
        let unformatted_pos = names.iter().position(|&n| n == "unformatted").unwrap();
        let raw_dd_pos = names.iter().position(|&n| n == "raw_dd").unwrap();
        assert!(
            amigados_pos < unformatted_pos && unformatted_pos < raw_dd_pos,
            "expected amigados, then unformatted, then raw_dd: {:?}",
            names
        );
    }
}
