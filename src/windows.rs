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

//! Window functions
//!
//! Two flavors of every window are exposed: a raw generator (peak-normalized,
//! suitable for weighting a spectral estimator's input frame) and an
//! `apply_*` helper that multiplies a complex array elementwise by the
//! window after normalizing the window so its coefficients sum to 1 (used
//! when shaping FIR taps, where the window must not change the filter's DC
//! gain).

use crate::types::{Complex, Float};
use std::f64::consts::PI;

/// Window function selector, used by the channel detector to pick its
/// analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFunction {
    /// No windowing (rectangular window)
    None,
    /// Hamming window
    Hamming,
    /// Hann window
    Hann,
    /// Blackman-Harris window (4-term)
    BlackmanHarris,
    /// Flat-top window (5-term)
    FlatTop,
}

impl WindowFunction {
    /// Generates a peak-normalized window of length `n`
    pub fn generate(self, n: usize) -> Vec<Float> {
        match self {
            WindowFunction::None => vec![1.0; n],
            WindowFunction::Hamming => raw_hamming(n),
            WindowFunction::Hann => raw_hann(n),
            WindowFunction::BlackmanHarris => raw_blackman_harris(n),
            WindowFunction::FlatTop => raw_flat_top(n),
        }
    }
}

fn raw_hamming(n: usize) -> Vec<Float> {
    if n <= 1 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| (0.54 - 0.46 * (2.0 * PI * i as f64 / denom).cos()) as Float)
        .collect()
}

fn raw_hann(n: usize) -> Vec<Float> {
    if n <= 1 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| (0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos())) as Float)
        .collect()
}

fn raw_blackman_harris(n: usize) -> Vec<Float> {
    const A0: f64 = 0.358_75;
    const A1: f64 = 0.488_29;
    const A2: f64 = 0.141_28;
    const A3: f64 = 0.011_68;
    if n <= 1 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / denom;
            (A0 - A1 * x.cos() + A2 * (2.0 * x).cos() - A3 * (3.0 * x).cos()) as Float
        })
        .collect()
}

fn raw_flat_top(n: usize) -> Vec<Float> {
    const A0: f64 = 0.215_578_95;
    const A1: f64 = 0.416_631_58;
    const A2: f64 = 0.277_263_158;
    const A3: f64 = 0.083_578_947;
    const A4: f64 = 0.006_947_368;
    if n <= 1 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / denom;
            (A0 - A1 * x.cos() + A2 * (2.0 * x).cos() - A3 * (3.0 * x).cos()
                + A4 * (4.0 * x).cos()) as Float
        })
        .collect()
}

/// Multiplies `data` elementwise by `raw_window`, after normalizing
/// `raw_window` so that its coefficients sum to 1.
fn apply_normalized(data: &mut [Complex], raw_window: &[Float]) {
    let sum: Float = raw_window.iter().sum();
    let norm = if sum.abs() > Float::EPSILON { sum } else { 1.0 };
    for (sample, &w) in data.iter_mut().zip(raw_window.iter()) {
        *sample = *sample * (w / norm);
    }
}

/// Applies a sum-normalized Hamming window to `data`
pub fn apply_hamming(data: &mut [Complex]) {
    let w = raw_hamming(data.len());
    apply_normalized(data, &w);
}

/// Applies a sum-normalized Hann window to `data`
pub fn apply_hann(data: &mut [Complex]) {
    let w = raw_hann(data.len());
    apply_normalized(data, &w);
}

/// Applies a sum-normalized Blackman-Harris window to `data`
pub fn apply_blackman_harris(data: &mut [Complex]) {
    let w = raw_blackman_harris(data.len());
    apply_normalized(data, &w);
}

/// Applies a sum-normalized flat-top window to `data`
pub fn apply_flat_top(data: &mut [Complex]) {
    let w = raw_flat_top(data.len());
    apply_normalized(data, &w);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hamming_window_is_symmetric() {
        let w = raw_hamming(9);
        for i in 0..w.len() {
            assert!((w[i] - w[w.len() - 1 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn apply_hamming_preserves_dc_gain() {
        let mut ones = vec![Complex::new(1.0, 0.0); 64];
        apply_hamming(&mut ones);
        let sum: Float = ones.iter().map(|c| c.re).sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn blackman_harris_window_peaks_near_center() {
        let w = raw_blackman_harris(65);
        let center = w.len() / 2;
        assert!(w[center] > w[0]);
        assert!(w[center] > w[2]);
    }
}
