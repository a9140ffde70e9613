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
//! An FFT plan backed by FFTW
//!

use fftw::array::AlignedVec;
use fftw::plan::{C2CPlan, C2CPlan32};
use fftw::types::{Flag, Sign};

use crate::types::Complex;

/// A pair of FFTW plans (one per direction) sharing aligned scratch space
pub struct FftwPlan {
    forward: C2CPlan32,
    backward: C2CPlan32,
    scratch_in: AlignedVec<Complex>,
    scratch_out: AlignedVec<Complex>,
}

impl FftwPlan {
    pub fn new(size: usize) -> Self {
        let forward = C2CPlan32::aligned(&[size], Sign::Forward, Flag::MEASURE)
            .expect("FFT plan setup failed");
        let backward = C2CPlan32::aligned(&[size], Sign::Backward, Flag::MEASURE)
            .expect("FFT plan setup failed");
        FftwPlan {
            forward,
            backward,
            scratch_in: AlignedVec::new(size),
            scratch_out: AlignedVec::new(size),
        }
    }

    pub fn forward(&mut self, input: &[Complex], output: &mut [Complex]) {
        self.scratch_in.copy_from_slice(input);
        self.forward
            .c2c(&mut self.scratch_in, &mut self.scratch_out)
            .expect("forward FFT failed");
        output.copy_from_slice(&self.scratch_out);
    }

    pub fn inverse(&mut self, input: &[Complex], output: &mut [Complex]) {
        self.scratch_in.copy_from_slice(input);
        self.backward
            .c2c(&mut self.scratch_in, &mut self.scratch_out)
            .expect("inverse FFT failed");
        output.copy_from_slice(&self.scratch_out);
    }
}
