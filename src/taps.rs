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

//! FIR tap designers
//!
//! These build real-valued tap arrays (returned as [`Complex`] with a zero
//! imaginary part, so they can be fed directly to [`crate::iir::IirFilter`])
//! for the pulse-shaping, brickwall and Hilbert filters the rest of the
//! core is built on.

use crate::error::{Error, Result};
use crate::types::{Complex, Float};
use crate::windows;
use std::f64::consts::PI;

/// Threshold below which a denominator is treated as zero, matching the
/// source's special-casing around `r_t == 0` and `1 - (4*beta*r_t)^2 == 0`.
const THRESHOLD: f64 = 1e-6;

/// Builds a root-raised-cosine FIR of `size` taps, symbol period `t` in
/// samples and roll-off `beta`, Hamming-windowed.
pub fn rrc(t: Float, beta: Float, size: usize) -> Result<Vec<Complex>> {
    if size < 1 {
        return Err(Error::InvalidArgument("rrc: size must be >= 1"));
    }
    let (t, beta) = (t as f64, beta as f64);
    let sqrt_t = t.sqrt();
    let mut h = vec![0.0f64; size];

    for (i, slot) in h.iter_mut().enumerate() {
        let r_t = (i as f64 - size as f64 / 2.0) / t;
        let f = 4.0 * beta * r_t;
        let dem = sqrt_t * PI * r_t * (1.0 - f * f);
        let num =
            (PI * r_t * (1.0 - beta)).sin() + 4.0 * beta * r_t * (PI * r_t * (1.0 + beta)).cos();

        *slot = if r_t.abs() < THRESHOLD {
            (1.0 - beta + 4.0 * beta / PI) / sqrt_t
        } else if dem.abs() < THRESHOLD {
            beta / (2.0 * t).sqrt()
                * ((1.0 + 2.0 / PI) * (PI / (4.0 * beta)).sin()
                    + (1.0 - 2.0 / PI) * (PI / (4.0 * beta)).cos())
        } else {
            num / dem
        };
    }

    let mut taps: Vec<Complex> = h.into_iter().map(|v| Complex::new(v as Float, 0.0)).collect();
    windows::apply_hamming(&mut taps);
    Ok(taps)
}

/// Builds a windowed-sinc brickwall lowpass of `size` taps at normalized
/// cutoff `fc` (cutoff/Nyquist, `(0, 1)`), Blackman-Harris windowed.
pub fn brickwall_lp(fc: Float, size: usize) -> Result<Vec<Complex>> {
    if size < 1 {
        return Err(Error::InvalidArgument("brickwall_lp: size must be >= 1"));
    }
    if !(fc > 0.0 && fc < 1.0) {
        return Err(Error::InvalidArgument("brickwall_lp: fc must be in (0, 1)"));
    }
    let fc = fc as f64;
    let center = size as f64 / 2.0;
    let h: Vec<f64> = (0..size)
        .map(|i| {
            let n = i as f64 - center;
            if n.abs() < THRESHOLD {
                fc
            } else {
                (PI * fc * n).sin() / (PI * n)
            }
        })
        .collect();

    let mut taps: Vec<Complex> = h.into_iter().map(|v| Complex::new(v as Float, 0.0)).collect();
    windows::apply_blackman_harris(&mut taps);
    Ok(taps)
}

/// Builds a windowed-sinc brickwall bandpass of `size` taps, bandwidth `bw`
/// (normalized, `(0, 1)`) centered at normalized intermediate frequency
/// `if_norm`. Implemented by modulating the lowpass prototype of half the
/// bandwidth up to `if_norm`, matching the brickwall bandpass construction
/// described for the spectral-tuner channel filter.
pub fn brickwall_bp(bw: Float, if_norm: Float, size: usize) -> Result<Vec<Complex>> {
    if size < 1 {
        return Err(Error::InvalidArgument("brickwall_bp: size must be >= 1"));
    }
    if !(bw > 0.0 && bw < 2.0) {
        return Err(Error::InvalidArgument("brickwall_bp: bw must be in (0, 2)"));
    }
    let lp = brickwall_lp(bw / 2.0, size)?;
    let if_norm = if_norm as f64;
    let center = size as f64 / 2.0;
    let taps = lp
        .into_iter()
        .enumerate()
        .map(|(i, tap)| {
            let n = i as f64 - center;
            let rot = Complex::new(
                (PI * if_norm * n).cos() as Float,
                (PI * if_norm * n).sin() as Float,
            );
            tap * rot * 2.0
        })
        .collect();
    Ok(taps)
}

/// Builds a standard odd-symmetric FIR Hilbert transformer of `size` taps
/// (odd `size` recommended so the filter has a well-defined center tap),
/// Blackman-Harris windowed.
pub fn hilbert(size: usize) -> Result<Vec<Complex>> {
    if size < 1 {
        return Err(Error::InvalidArgument("hilbert: size must be >= 1"));
    }
    let center = size as f64 / 2.0;
    let h: Vec<f64> = (0..size)
        .map(|i| {
            let n = i as f64 - center;
            if (n as i64 as f64 - n).abs() < THRESHOLD && (n as i64) % 2 == 0 {
                0.0
            } else {
                2.0 / (PI * n)
            }
        })
        .collect();
    let mut taps: Vec<Complex> = h.into_iter().map(|v| Complex::new(v as Float, 0.0)).collect();
    windows::apply_blackman_harris(&mut taps);
    Ok(taps)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rrc_has_requested_length() {
        let h = rrc(8.0, 0.35, 65).unwrap();
        assert_eq!(h.len(), 65);
    }

    #[test]
    fn rrc_rejects_zero_length() {
        assert!(rrc(8.0, 0.35, 0).is_err());
    }

    #[test]
    fn brickwall_lp_peaks_at_center() {
        let h = brickwall_lp(0.2, 129).unwrap();
        let center = h.len() / 2;
        assert!(h[center].re > h[0].re);
    }

    #[test]
    fn brickwall_bp_rejects_bad_bandwidth() {
        assert!(brickwall_bp(3.0, 0.1, 65).is_err());
    }

    #[test]
    fn hilbert_center_tap_is_zero() {
        let h = hilbert(65).unwrap();
        assert!(h[32].re.abs() < 1e-6);
    }
}
