/*
 * Copyright 2020 The Regents of the University of California
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

//!
//! An FFT plan backed by `rustfft`
//!

use std::sync::Arc;

use num_traits::Zero;
use rustfft::{FFTplanner, FFT};

use crate::types::Complex;

/// A pair of rustfft plans (one per direction) sharing scratch space
pub struct RustFftPlan {
    forward: Arc<dyn FFT<f32>>,
    backward: Arc<dyn FFT<f32>>,
    scratch_in: Vec<Complex>,
    scratch_out: Vec<Complex>,
}

impl RustFftPlan {
    pub fn new(size: usize) -> Self {
        RustFftPlan {
            forward: FFTplanner::new(false).plan_fft(size),
            backward: FFTplanner::new(true).plan_fft(size),
            scratch_in: vec![Complex::zero(); size],
            scratch_out: vec![Complex::zero(); size],
        }
    }

    pub fn forward(&mut self, input: &[Complex], output: &mut [Complex]) {
        self.scratch_in.copy_from_slice(input);
        self.forward.process(&mut self.scratch_in, &mut self.scratch_out);
        output.copy_from_slice(&self.scratch_out);
    }

    pub fn inverse(&mut self, input: &[Complex], output: &mut [Complex]) {
        self.scratch_in.copy_from_slice(input);
        self.backward.process(&mut self.scratch_in, &mut self.scratch_out);
        output.copy_from_slice(&self.scratch_out);
    }
}
