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

//! Direct-form-II IIR filter evaluation and filter-design factories
//!
//! A filter owns its `b` (feedforward) and `a` (feedback) tap arrays and a
//! pair of ring-indexed delay lines. `a[0]` is always the implicit unit
//! coefficient of the just-computed output and is never read back from the
//! delay line; when a filter has no feedback taps beyond that implicit one
//! it behaves as a pure FIR filter.

use crate::coef;
use crate::error::{Error, Result};
use crate::taps;
use crate::types::{Complex, Float};

/// A direct-form IIR (or, with a single `a` coefficient, FIR) filter
#[derive(Debug, Clone)]
pub struct IirFilter {
    /// Feedforward taps, `b[0..M]`
    b: Vec<Complex>,
    /// Feedback taps, `a[0..N]`; `a[0]` is always `1`
    a: Vec<Float>,
    /// Input delay line, most recent sample at `x[0]`
    x: Vec<Complex>,
    /// Output delay line, most recent sample at `y[0]`
    y: Vec<Complex>,
    /// Scalar output gain
    gain: Float,
}

impl IirFilter {
    /// Builds a filter from owned `b` (feedforward) and `a` (feedback, with
    /// `a[0] == 1`) tap arrays. Delay lines start zeroed and `gain` starts
    /// at `1`.
    pub fn new(b: Vec<Complex>, a: Vec<Float>) -> Result<Self> {
        if b.is_empty() {
            return Err(Error::InvalidArgument("iir: b must have at least one tap"));
        }
        if a.is_empty() || (a[0] - 1.0).abs() > 1e-3 {
            return Err(Error::InvalidArgument("iir: a[0] must be 1"));
        }
        let m = b.len();
        let n = a.len();
        Ok(IirFilter {
            b,
            a,
            x: vec![Complex::new(0.0, 0.0); m],
            y: vec![Complex::new(0.0, 0.0); n],
            gain: 1.0,
        })
    }

    /// True if this filter has no feedback taps beyond the implicit `a[0]`
    pub fn is_fir(&self) -> bool {
        self.a.len() <= 1
    }

    /// Sets the output gain
    pub fn set_gain(&mut self, gain: Float) {
        self.gain = gain;
    }

    /// Current output gain
    pub fn gain(&self) -> Float {
        self.gain
    }

    /// Zeros both delay lines, leaving taps and gain untouched
    pub fn reset(&mut self) {
        for v in self.x.iter_mut() {
            *v = Complex::new(0.0, 0.0);
        }
        for v in self.y.iter_mut() {
            *v = Complex::new(0.0, 0.0);
        }
    }

    /// Feeds one sample and returns the filtered output
    pub fn feed(&mut self, sample: Complex) -> Complex {
        // Shift the input delay line and push the new sample at x[0]
        for i in (1..self.x.len()).rev() {
            self.x[i] = self.x[i - 1];
        }
        self.x[0] = sample;

        let mut acc = Complex::new(0.0, 0.0);
        for (i, &b_i) in self.b.iter().enumerate() {
            acc += self.x[i] * b_i;
        }
        for (i, &a_i) in self.a.iter().enumerate().skip(1) {
            acc -= self.y[i - 1] * a_i;
        }

        if self.y.len() > 1 {
            for i in (1..self.y.len()).rev() {
                self.y[i] = self.y[i - 1];
            }
        }
        if !self.y.is_empty() {
            self.y[0] = acc;
        }

        self.gain * acc
    }

    /// Feeds `xs` in order, returning one output per input
    pub fn feed_bulk(&mut self, xs: &[Complex]) -> Vec<Complex> {
        xs.iter().map(|&x| self.feed(x)).collect()
    }

    /// The last output produced by [`feed`](Self::feed), scaled by `gain`
    pub fn get(&self) -> Complex {
        self.gain * self.y.first().copied().unwrap_or_else(|| Complex::new(0.0, 0.0))
    }
}

fn real_taps(taps: &[Float]) -> Vec<Complex> {
    taps.iter().map(|&v| Complex::new(v, 0.0)).collect()
}

fn fir(b: Vec<Complex>) -> Result<IirFilter> {
    IirFilter::new(b, vec![1.0])
}

/// `order`-pole Butterworth lowpass at normalized cutoff `fc`
/// (cutoff/Nyquist, in `(0, 1)`)
pub fn butterworth_lpf(order: usize, fc: Float) -> Result<IirFilter> {
    if order < 1 {
        return Err(Error::InvalidArgument("butterworth_lpf: order must be >= 1"));
    }
    if !(fc > 0.0 && fc < 1.0) {
        return Err(Error::InvalidArgument("butterworth_lpf: fc must be in (0, 1)"));
    }
    let a = coef::dcof_bwlp(order, fc);
    let sf = coef::sf_bwlp(order, fc);
    let b: Vec<Float> = coef::ccof_bwlp(order).into_iter().map(|c| c * sf).collect();
    IirFilter::new(real_taps(&b), a)
}

/// `order`-pole Butterworth highpass at normalized cutoff `fc`
pub fn butterworth_hpf(order: usize, fc: Float) -> Result<IirFilter> {
    if order < 1 {
        return Err(Error::InvalidArgument("butterworth_hpf: order must be >= 1"));
    }
    if !(fc > 0.0 && fc < 1.0) {
        return Err(Error::InvalidArgument("butterworth_hpf: fc must be in (0, 1)"));
    }
    let a = coef::dcof_bwhp(order, fc);
    let sf = coef::sf_bwhp(order, fc);
    let b: Vec<Float> = coef::ccof_bwhp(order).into_iter().map(|c| c * sf).collect();
    IirFilter::new(real_taps(&b), a)
}

/// `order`-pole Butterworth bandpass between normalized edges `f1` and `f2`
pub fn butterworth_bpf(order: usize, f1: Float, f2: Float) -> Result<IirFilter> {
    if order < 1 {
        return Err(Error::InvalidArgument("butterworth_bpf: order must be >= 1"));
    }
    if !(f1 > 0.0 && f2 < 1.0 && f1 < f2) {
        return Err(Error::InvalidArgument("butterworth_bpf: need 0 < f1 < f2 < 1"));
    }
    let a = coef::dcof_bwbp(order, f1, f2);
    let sf = coef::sf_bwbp(order, f1, f2);
    let b: Vec<Float> = coef::ccof_bwbp(order).into_iter().map(|c| c * sf).collect();
    IirFilter::new(real_taps(&b), a)
}

/// Root-raised-cosine pulse-shaping FIR of `size` taps, symbol period `t`
/// samples, roll-off `beta`
pub fn rrc(t: Float, beta: Float, size: usize) -> Result<IirFilter> {
    fir(taps::rrc(t, beta, size)?)
}

/// Windowed-sinc brickwall lowpass FIR of `size` taps at normalized cutoff
/// `fc`
pub fn brickwall_lpf(fc: Float, size: usize) -> Result<IirFilter> {
    fir(taps::brickwall_lp(fc, size)?)
}

/// Windowed-sinc brickwall bandpass FIR of `size` taps, bandwidth `bw`
/// centered at normalized intermediate frequency `if_norm`
pub fn brickwall_bpf(bw: Float, if_norm: Float, size: usize) -> Result<IirFilter> {
    fir(taps::brickwall_bp(bw, if_norm, size)?)
}

/// Standard FIR Hilbert transformer of `size` taps
pub fn hilbert(size: usize) -> Result<IirFilter> {
    fir(taps::hilbert(size)?)
}

#[cfg(test)]
mod test {
    use super::*;

    fn tone(n: usize, fnor: Float) -> Vec<Complex> {
        (0..n)
            .map(|i| {
                let phi = std::f64::consts::PI as Float * fnor * i as Float;
                Complex::new(phi.cos(), phi.sin())
            })
            .collect()
    }

    #[test]
    fn linearity_holds_across_fresh_filters() {
        let u = tone(256, 0.05);
        let v = tone(256, 0.3);
        let (a, b) = (2.0 as Float, -1.5 as Float);
        let combo: Vec<Complex> = u.iter().zip(v.iter()).map(|(&uu, &vv)| uu * a + vv * b).collect();

        let mut fu = butterworth_lpf(4, 0.25).unwrap();
        let mut fv = butterworth_lpf(4, 0.25).unwrap();
        let mut fc = butterworth_lpf(4, 0.25).unwrap();

        let yu = fu.feed_bulk(&u);
        let yv = fv.feed_bulk(&v);
        let yc = fc.feed_bulk(&combo);

        for i in 0..yc.len() {
            let expect = yu[i] * a + yv[i] * b;
            assert!((yc[i] - expect).norm() < 1e-2);
        }
    }

    #[test]
    fn nyquist_tone_through_lowpass_is_attenuated() {
        let mut filt = butterworth_lpf(5, 0.25).unwrap();
        let input = tone(32768, 0.5);
        let input_rms = (input.iter().map(|c| c.norm_sqr()).sum::<Float>() / input.len() as Float).sqrt();
        let output = filt.feed_bulk(&input);
        let tail = &output[output.len() / 2..];
        let output_rms = (tail.iter().map(|c| c.norm_sqr()).sum::<Float>() / tail.len() as Float).sqrt();
        let ratio_db = 20.0 * (output_rms / input_rms).log10();
        assert!(ratio_db <= -40.0, "attenuation was only {} dB", ratio_db);
    }

    #[test]
    fn rejects_mismatched_a0() {
        assert!(IirFilter::new(vec![Complex::new(1.0, 0.0)], vec![0.5, 0.1]).is_err());
    }
}
