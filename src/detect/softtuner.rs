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

//! A minimal complex pre-tuner: mix to baseband, low-pass to reject
//! aliases, and decimate. Used ahead of a [`super::Detector`] when a
//! detector should only look at a narrow slice of a wider input band.

use crate::error::Result;
use crate::iir::{butterworth_lpf, IirFilter};
use crate::ncqo::Ncqo;
use crate::types::Float;
use crate::types::Complex;

/// Extra bandwidth factor given to the anti-alias low-pass, beyond the
/// requested passband, to leave transition-band headroom before decimation
const ANTIALIAS_EXTRA_BW: Float = 2.0;
/// Anti-alias filter order
const ANTIALIAS_ORDER: usize = 4;

/// Complex mixer + anti-alias low-pass + decimator
pub struct SoftTuner {
    mixer: Ncqo,
    lpf: IirFilter,
    decimation: usize,
    counter: usize,
}

impl SoftTuner {
    /// Creates a tuner that mixes `fc` (normalized frequency) down to
    /// baseband, low-pass filters with `bw` (normalized bandwidth) of
    /// headroom, and decimates by `decimation`.
    pub fn new(fc: Float, bw: Float, decimation: usize) -> Result<Self> {
        let cutoff = (bw.abs() * ANTIALIAS_EXTRA_BW / decimation.max(1) as Float).min(0.99);
        let lpf = butterworth_lpf(ANTIALIAS_ORDER, cutoff.max(1e-6))?;
        Ok(SoftTuner {
            mixer: Ncqo::new(fc),
            lpf,
            decimation: decimation.max(1),
            counter: 0,
        })
    }

    /// Feeds one input sample, returning a decimated, filtered, baseband
    /// sample every `decimation` calls.
    pub fn feed(&mut self, x: Complex) -> Option<Complex> {
        let mixed = x * self.mixer.read().conj();
        let filtered = self.lpf.feed(mixed);

        self.counter += 1;
        if self.counter >= self.decimation {
            self.counter = 0;
            Some(filtered)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::TWO_PI;

    #[test]
    fn decimates_at_the_configured_ratio() {
        let mut tuner = SoftTuner::new(0.0, 0.1, 4).unwrap();
        let mut outputs = 0;
        for _ in 0..400 {
            if tuner.feed(Complex::new(1.0, 0.0)).is_some() {
                outputs += 1;
            }
        }
        assert_eq!(outputs, 100);
    }

    #[test]
    fn mixes_a_tone_toward_baseband() {
        let mut tuner = SoftTuner::new(0.25, 0.05, 1).unwrap();
        let omega = 0.25 * std::f64::consts::PI as Float;
        let mut phi: Float = 0.0;
        let mut last = Complex::new(0.0, 0.0);
        for _ in 0..2000 {
            let x = Complex::new(phi.cos(), phi.sin());
            if let Some(y) = tuner.feed(x) {
                last = y;
            }
            phi += omega;
        }
        let _ = TWO_PI;
        assert!(last.norm() > 0.0);
    }
}
