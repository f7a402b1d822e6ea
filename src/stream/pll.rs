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

    src/stream/pll.rs

    The flux-to-bitcell PLL (§4.2): tracks a clock window that adjusts its
    period and phase against the error between an observed flux interval
    and the nearest integer multiple of the current window.
*/

/// Mutable PLL tracking state, embedded directly in [`super::Stream`].
#[derive(Copy, Clone, Debug)]
pub struct PllState {
    /// Current window length, in nanoseconds.
    pub clock: i32,
    /// Centre (nominal) window length the clock is not allowed to drift more
    /// than 5% away from.
    pub clock_centre: i32,
    /// 0..100: what percentage of a window's timing error feeds back into
    /// the window period.
    pub period_adj_pct: i32,
    /// 0..100: what percentage of a window's timing error feeds back into
    /// the phase of the next window.
    pub phase_adj_pct: i32,
    /// Nanoseconds of phase carried into the next flux interval.
    pub phase_carry: i32,
}

impl PllState {
    pub fn new(clock_centre: i32) -> Self {
        PllState {
            clock: clock_centre,
            clock_centre,
            period_adj_pct: 60,
            phase_adj_pct: 90,
            phase_carry: 0,
        }
    }

    /// Consume one flux interval of `flux_ns` nanoseconds. Returns the number
    /// of MFM bitcells the interval represents: `k - 1` zero bitcells followed
    /// by one one-bitcell, i.e. `k` total, `k >= 1`.
    pub fn resolve(&mut self, flux_ns: u32) -> u32 {
        let adjusted = (flux_ns as i32 - self.phase_carry).max(1);
        let mut k = ((adjusted as f64) / (self.clock as f64)).round() as i32;
        if k < 1 {
            k = 1;
        }
        let error = adjusted - k * self.clock;

        let period_delta = (error * self.period_adj_pct) / (100 * k.max(1));
        let min_clock = self.clock_centre - self.clock_centre / 20; // -5%
        let max_clock = self.clock_centre + self.clock_centre / 20; // +5%
        self.clock = (self.clock + period_delta).clamp(min_clock, max_clock);

        self.phase_carry = (error * self.phase_adj_pct) / 100;

        k as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_flux_yields_two_bitcells() {
        let mut pll = PllState::new(2000);
        // A 1-bit followed by a 0-bit followed by a 1-bit is one 4000ns flux interval
        // at nominal double-density timing: 2 bitcells (one zero, one reversal).
        assert_eq!(pll.resolve(4000), 2);
    }

    #[test]
    fn clock_stays_within_five_percent_band() {
        let mut pll = PllState::new(2000);
        for _ in 0..500 {
            pll.resolve(2300); // persistently 15% long flux intervals
        }
        assert!(pll.clock <= 2100);
        assert!(pll.clock >= 1900);
    }
}
