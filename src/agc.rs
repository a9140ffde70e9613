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

//! Hang AGC: a dual fast/slow envelope follower with hang-controlled decay
//! and dB-domain slope compression, adapted from the GQRX AGC.

use crate::types::{db, mag_raw, Complex, Float};
use std::collections::VecDeque;

/// Reference level (dBFS) against which magnitudes are measured
const MAX_REF_DB: Float = 0.0;
/// Global output rescale constant
const AGC_RESCALE: Float = 0.7;

fn alpha_from_time_constant(tau_samples: Float) -> Float {
    if tau_samples <= 0.0 {
        1.0
    } else {
        1.0 - (-1.0 / tau_samples).exp()
    }
}

/// Hang AGC state
#[derive(Debug, Clone)]
pub struct Agc {
    delay_line: VecDeque<Complex>,
    mag_history: VecDeque<Float>,
    delay_len: usize,
    peak: Float,
    fast_level: Float,
    slow_level: Float,
    alpha_fast_rise: Float,
    alpha_fast_fall: Float,
    alpha_slow_rise: Float,
    alpha_slow_fall: Float,
    hang_n: usize,
    hang_max: usize,
    knee_db: Float,
    slope: Float,
    fixed_gain: Float,
}

impl Agc {
    /// Creates an AGC with the given lookahead delay-line length,
    /// magnitude-history length, fast/slow rise and fall time constants (in
    /// samples), hang length (in samples), knee level (dB) and
    /// post-knee compression slope.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        delay_len: usize,
        mag_history_len: usize,
        fast_rise_tau: Float,
        fast_fall_tau: Float,
        slow_rise_tau: Float,
        slow_fall_tau: Float,
        hang_max: usize,
        knee_db: Float,
        slope: Float,
    ) -> Self {
        Agc {
            delay_line: VecDeque::from(vec![Complex::new(0.0, 0.0); delay_len]),
            mag_history: VecDeque::from(vec![-120.0 as Float; mag_history_len]),
            delay_len,
            peak: -120.0,
            fast_level: -120.0,
            slow_level: -120.0,
            alpha_fast_rise: alpha_from_time_constant(fast_rise_tau),
            alpha_fast_fall: alpha_from_time_constant(fast_fall_tau),
            alpha_slow_rise: alpha_from_time_constant(slow_rise_tau),
            alpha_slow_fall: alpha_from_time_constant(slow_fall_tau),
            hang_n: 0,
            hang_max,
            knee_db,
            slope,
            fixed_gain: 1.0,
        }
    }

    /// Feeds one complex sample and returns the gain-controlled,
    /// delay-line-lookahead output.
    pub fn feed(&mut self, x: Complex) -> Complex {
        // 1. Push into the delay line, read the oldest
        self.delay_line.push_back(x);
        let x_delayed = self.delay_line.pop_front().unwrap_or(x);

        // 2. Magnitude in dBFS
        let x_db = db(x.norm_sqr()) - MAX_REF_DB;

        // 3/4. Magnitude history and peak tracking
        self.mag_history.push_back(x_db);
        let oldest = self.mag_history.pop_front().unwrap_or(x_db);

        if x_db > self.peak {
            self.peak = x_db;
        } else if (oldest - self.peak).abs() < 1e-9 {
            self.peak = self
                .mag_history
                .iter()
                .cloned()
                .fold(Float::NEG_INFINITY, Float::max)
                .max(x_db);
        }

        // 5. Fast envelope
        let fast_delta = self.peak - self.fast_level;
        self.fast_level += if fast_delta > 0.0 {
            self.alpha_fast_rise
        } else {
            self.alpha_fast_fall
        } * fast_delta;

        // 6. Slow envelope, gated by the hang counter on decay
        let slow_delta = self.peak - self.slow_level;
        if slow_delta > 0.0 {
            self.slow_level += self.alpha_slow_rise * slow_delta;
            self.hang_n = 0;
        } else if self.hang_n >= self.hang_max {
            self.slow_level += self.alpha_slow_fall * slow_delta;
        } else {
            self.hang_n += 1;
        }

        // 7. Combined envelope
        let envelope = self.fast_level.max(self.slow_level);

        // 8. Knee / slope gain law
        let gain_db = if envelope < self.knee_db {
            self.fixed_gain
        } else {
            mag_raw(envelope * (self.slope - 1.0))
        };

        // 9. Global rescale
        x_delayed * gain_db * AGC_RESCALE
    }

    /// Feeds `xs` in order
    pub fn feed_bulk(&mut self, xs: &[Complex]) -> Vec<Complex> {
        xs.iter().map(|&x| self.feed(x)).collect()
    }

    /// Sets the pre-knee fixed gain
    pub fn set_fixed_gain(&mut self, gain: Float) {
        self.fixed_gain = gain;
    }

    /// Length of the lookahead delay line
    pub fn delay_len(&self) -> usize {
        self.delay_len
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rising_input_converges_toward_rescale_target() {
        let mut agc = Agc::new(8, 32, 4.0, 200.0, 16.0, 4000.0, 100, -60.0, 1.0 / 20.0);
        let mut last = Complex::new(0.0, 0.0);
        for i in 0..20000 {
            let amp = 0.001 * (1.0 + i as Float / 4000.0);
            last = agc.feed(Complex::new(amp, 0.0));
        }
        // Output should have converged to roughly constant (bounded) envelope
        assert!(last.norm() < 10.0);
    }

    #[test]
    fn output_lags_input_by_delay_line_length() {
        let mut agc = Agc::new(4, 16, 4.0, 40.0, 16.0, 400.0, 10, -60.0, 0.1);
        let first = agc.feed(Complex::new(1.0, 0.0));
        // The very first output corresponds to a zero sample still sitting
        // in the (initially zeroed) delay line.
        assert_eq!(first, Complex::new(0.0, 0.0));
    }
}
