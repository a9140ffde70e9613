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

//! The FFT backend collaborator
//!
//! The core does not mandate an FFT implementation; it depends on a
//! service that can allocate aligned complex buffers, build forward and
//! backward 1-D plans, and execute them. This module provides that service
//! with two interchangeable implementations selected at build time: FFTW
//! (default, `fftw` feature) or the pure-Rust `rustfft`.

#[cfg(feature = "fftw")]
mod impl_fftw;
#[cfg(not(feature = "fftw"))]
mod impl_rustfft;

#[cfg(feature = "fftw")]
use self::impl_fftw::FftwPlan as PlanImpl;
#[cfg(not(feature = "fftw"))]
use self::impl_rustfft::RustFftPlan as PlanImpl;

use crate::types::Complex;

/// A forward/backward 1-D complex FFT plan of a fixed size
///
/// A plan owns whatever scratch space its backend needs and can be reused
/// across many `forward`/`inverse` calls of the same size.
pub struct FftPlan {
    inner: PlanImpl,
    size: usize,
}

impl FftPlan {
    /// Builds a plan for transforms of length `size`
    ///
    /// `size` must be positive; the backends used here do not require a
    /// power of two, but the rest of the core only ever requests
    /// power-of-two sizes.
    pub fn new(size: usize) -> Self {
        FftPlan {
            inner: PlanImpl::new(size),
            size,
        }
    }

    /// The transform length this plan was built for
    pub fn size(&self) -> usize {
        self.size
    }

    /// Computes the forward (analysis) transform of `input` into `output`
    ///
    /// No scaling is applied, matching the convention used throughout the
    /// core: a forward transform followed by a backward transform of the
    /// same plan size scales the result by `size`.
    pub fn forward(&mut self, input: &[Complex], output: &mut [Complex]) {
        debug_assert_eq!(input.len(), self.size);
        debug_assert_eq!(output.len(), self.size);
        self.inner.forward(input, output);
    }

    /// Computes the backward (synthesis) transform of `input` into `output`
    pub fn inverse(&mut self, input: &[Complex], output: &mut [Complex]) {
        debug_assert_eq!(input.len(), self.size);
        debug_assert_eq!(output.len(), self.size);
        self.inner.inverse(input, output);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use num_traits::Zero;

    #[test]
    fn forward_then_inverse_recovers_scaled_input() {
        let n = 64;
        let mut plan = FftPlan::new(n);
        let input: Vec<Complex> = (0..n)
            .map(|i| Complex::new((i as f32 / n as f32).cos(), 0.0))
            .collect();
        let mut freq = vec![Complex::zero(); n];
        let mut back = vec![Complex::zero(); n];
        plan.forward(&input, &mut freq);
        plan.inverse(&freq, &mut back);
        for (a, b) in input.iter().zip(back.iter()) {
            assert!((a.re * n as f32 - b.re).abs() < 1e-2);
        }
    }

    #[test]
    fn dc_bin_is_sum() {
        let n = 16;
        let mut plan = FftPlan::new(n);
        let input = vec![Complex::new(1.0, 0.0); n];
        let mut out = vec![Complex::zero(); n];
        plan.forward(&input, &mut out);
        assert!((out[0].re - n as f32).abs() < 1e-3);
    }
}
