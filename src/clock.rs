/*
 * Copyright 2019 The Regents of the University of California
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
 */

//! Fractional resampling and Gardner symbol-timing recovery

use crate::types::{Complex, Float};
use std::collections::VecDeque;

/// Fractional resampler driven by a fixed symbol period
///
/// Emits a linearly interpolated sample each time the internal phase
/// accumulator crosses a period boundary.
#[derive(Debug, Clone)]
pub struct Sampler {
    period: Float,
    phi: Float,
    prev: Complex,
}

impl Sampler {
    /// Creates a sampler targeting normalized baud `bnor` (symbols/sample)
    pub fn new(bnor: Float) -> Self {
        Sampler {
            period: 1.0 / bnor,
            phi: 0.0,
            prev: Complex::new(0.0, 0.0),
        }
    }

    /// Sets the target normalized baud
    pub fn set_bnor(&mut self, bnor: Float) {
        self.period = 1.0 / bnor;
    }

    /// Feeds one input sample, replacing it in place with the interpolated
    /// symbol sample when a boundary is crossed. Returns `true` exactly
    /// when that happens.
    pub fn feed(&mut self, sample: &mut Complex) -> bool {
        let input = *sample;
        self.phi += 1.0;
        if self.phi >= self.period {
            // Fraction of the last unit step that lies past the boundary
            let overshoot = (self.phi - self.period).clamp(0.0, 1.0);
            let alpha = 1.0 - overshoot;
            *sample = self.prev * (1.0 - alpha) + input * alpha;
            self.phi -= self.period;
            self.prev = input;
            true
        } else {
            self.prev = input;
            false
        }
    }
}

/// Result of reading from a [`ClockDetector`]'s symbol output ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// `n` symbols were delivered
    Delivered(usize),
    /// The reader fell behind the writer; the ring has been resynced
    Overrun,
}

/// Gardner timing-error-detector based symbol-clock recovery
#[derive(Debug, Clone)]
pub struct ClockDetector {
    /// Three previous symbol-spaced samples: `x[0]` newest, `x[2]` oldest
    x: [Complex; 3],
    bnor: Float,
    bmin: Float,
    bmax: Float,
    phi: Float,
    half_cycle: bool,
    alpha: Float,
    beta: Float,
    gain: Float,
    prev_input: Complex,
    out: VecDeque<Complex>,
    bufsiz: usize,
}

impl ClockDetector {
    /// Creates a clock detector hinted at normalized baud `bnor_hint`,
    /// clamped to `[bmin, bmax]`, with output ring capacity `bufsiz`.
    pub fn new(bnor_hint: Float, bmin: Float, bmax: Float, bufsiz: usize) -> Self {
        let alpha = 0.2;
        ClockDetector {
            x: [Complex::new(0.0, 0.0); 3],
            bnor: bnor_hint.clamp(bmin, bmax),
            bmin,
            bmax,
            phi: 0.0,
            half_cycle: false,
            alpha,
            beta: 6e-4 * alpha,
            gain: 1.0,
            prev_input: Complex::new(0.0, 0.0),
            out: VecDeque::with_capacity(bufsiz),
            bufsiz,
        }
    }

    /// Current normalized baud estimate
    pub fn bnor(&self) -> Float {
        self.bnor
    }

    /// Feeds one complex sample
    pub fn feed(&mut self, x: Complex) {
        self.phi += self.bnor;

        if self.phi >= 0.5 {
            self.half_cycle = !self.half_cycle;
            let alpha = (self.bnor * (self.phi - 0.5)).clamp(0.0, 1.0);
            let p = self.prev_input * (1.0 - alpha) + x * alpha;
            self.phi -= 0.5;

            if self.half_cycle {
                // Mid-transition sample: the Gardner detector's x[1]
                self.x[1] = p;
            } else {
                self.x[2] = self.x[0];
                self.x[0] = p;

                let err = self.gain * (self.x[1].conj() * (self.x[0] - self.x[2])).re;
                self.phi += self.alpha * err;
                self.bnor = (self.bnor + self.beta * err).clamp(self.bmin, self.bmax);

                self.push_symbol(p);
            }
        }

        self.prev_input = x;
    }

    fn push_symbol(&mut self, symbol: Complex) {
        if self.out.len() >= self.bufsiz {
            self.out.pop_front();
        }
        self.out.push_back(symbol);
    }

    /// Feeds `xs` in order
    pub fn feed_bulk(&mut self, xs: &[Complex]) {
        for &x in xs {
            self.feed(x);
        }
    }

    /// Non-blocking read of up to `out.len()` delivered symbols. Returns
    /// the number of symbols written into `out`, or `Overrun` if the ring
    /// overflowed since the last read (the ring is cleared and resynced).
    pub fn read(&mut self, out: &mut [Complex]) -> ReadStatus {
        let mut n = 0;
        while n < out.len() {
            match self.out.pop_front() {
                Some(sym) => {
                    out[n] = sym;
                    n += 1;
                }
                None => break,
            }
        }
        ReadStatus::Delivered(n)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{fnor_to_omega, omega_to_fnor};

    #[test]
    fn sampler_emits_roughly_one_symbol_per_period() {
        let bnor = 1.0 / 8.0;
        let mut sampler = Sampler::new(bnor);
        let mut count = 0;
        for i in 0..8000 {
            let mut s = Complex::new(i as Float, 0.0);
            if sampler.feed(&mut s) {
                count += 1;
            }
        }
        let expected = (8000.0 * bnor) as i64;
        assert!((count as i64 - expected).abs() <= 2);
    }

    #[test]
    fn clock_detector_tracks_known_symbol_rate() {
        let bnor_true = 1.2 / 512.0;
        let mut det = ClockDetector::new(1.2 / 512.0 * 1.05, bnor_true * 0.5, bnor_true * 2.0, 64);
        let omega = fnor_to_omega(0.01);
        let mut phi: Float = 0.0;
        let mut sym_phase: Float = 0.0;
        for _ in 0..40000 {
            sym_phase += bnor_true;
            let bit = if sym_phase.fract() < 0.5 { 1.0 } else { -1.0 };
            let carrier = Complex::new(phi.cos(), phi.sin());
            det.feed(carrier * bit);
            phi += omega;
        }
        let recovered_period = 1.0 / det.bnor();
        assert!((recovered_period - 512.0).abs() < 64.0);
        let _ = omega_to_fnor(omega);
    }
}
