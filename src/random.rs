/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024-2025 Daniel Balsom

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

    src/random.rs

    Provide a simple random bit generator.
*/

#[cfg(not(feature = "rand"))]
const RANDOM_BITS_SIZE: usize = 2048;

#[cfg(not(feature = "rand"))]
const PSEUDO_RANDOM_BITS: [bool; RANDOM_BITS_SIZE] = generate_pseudo_random_bits(0x57A857FA, RANDOM_BITS_SIZE);

#[cfg(not(feature = "rand"))]
const fn pseudo_random_bit(seed: u32, index: usize) -> bool {
    // A simple pseudo-random function using bit shifts and XOR
    let mut value = seed ^ (index as u32);
    value = value.wrapping_mul(0x45d9f3b);
    value ^= value >> 16;
    (value & 1) != 0
}

#[cfg(not(feature = "rand"))]
const fn generate_pseudo_random_bits(seed: u32, len: usize) -> [bool; RANDOM_BITS_SIZE] {
    let mut bits = [false; RANDOM_BITS_SIZE];
    let mut i = 0;
    while i < len {
        bits[i] = pseudo_random_bit(seed, i);
        i += 1;
    }
    bits
}

#[cfg(not(feature = "rand"))]
pub fn random_bit(index: usize) -> bool {
    PSEUDO_RANDOM_BITS[index & (RANDOM_BITS_SIZE - 1)]
}

/// The source [`crate::tbuf::TrackBuffer::rnd16`] draws from: a real `rand`
/// generator seeded for reproducibility when the `rand` feature is on, or
/// the const-evaluated [`PSEUDO_RANDOM_BITS`] table walked bit-by-bit when
/// it's off, so the crate never needs an entropy source it doesn't have.
pub struct PseudoRandom {
    #[cfg(feature = "rand")]
    rng: rand::rngs::StdRng,
    #[cfg(not(feature = "rand"))]
    cursor: usize,
}

impl PseudoRandom {
    pub fn new(seed: u32) -> Self {
        #[cfg(feature = "rand")]
        {
            use rand::SeedableRng;
            PseudoRandom {
                rng: rand::rngs::StdRng::seed_from_u64(seed as u64),
            }
        }
        #[cfg(not(feature = "rand"))]
        {
            PseudoRandom { cursor: seed as usize }
        }
    }

    /// The next pseudo-random 16-bit word.
    pub fn next_u16(&mut self) -> u16 {
        #[cfg(feature = "rand")]
        {
            use rand::Rng;
            self.rng.gen::<u16>()
        }
        #[cfg(not(feature = "rand"))]
        {
            let mut word = 0u16;
            for _ in 0..16 {
                word = (word << 1) | (random_bit(self.cursor) as u16);
                self.cursor = self.cursor.wrapping_add(1);
            }
            word
        }
    }
}
