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

//! Numerically-controlled quadrature oscillator
//!
//! Produces `cos(phi) + j*sin(phi)` at a controllable normalized frequency.
//! Two flavors share the same struct: *variable* oscillators can have their
//! frequency and phase changed at any time; *fixed* oscillators instead
//! precompute a ring of `phi`/`sin`/`cos` triples and only ever step through
//! it, which is cheaper when the frequency is known never to change (e.g.
//! a tuner channel's fine-tuning oscillator in precise mode).

use crate::types::{wrap_2pi, Float, TWO_PI};

/// Length of the precalculated ring used by fixed oscillators
pub const PRECALC_LEN: usize = 1024;

#[derive(Debug, Clone)]
enum Mode {
    Variable,
    Fixed { ring: Vec<(Float, Float, Float)>, pos: usize },
}

/// A numerically-controlled quadrature oscillator
#[derive(Debug, Clone)]
pub struct Ncqo {
    phi: Float,
    omega: Float,
    fnor: Float,
    mode: Mode,
    /// Memoized `(phi, cos, sin)` so repeated `get_*` calls at the same
    /// phase do not recompute the trigonometry.
    memo: (Float, Float, Float),
}

impl Ncqo {
    /// Creates a variable oscillator at normalized frequency `fnor`
    pub fn new(fnor: Float) -> Self {
        let omega = crate::types::fnor_to_omega(fnor);
        Ncqo {
            phi: 0.0,
            omega,
            fnor,
            mode: Mode::Variable,
            memo: (0.0, 1.0, 0.0),
        }
    }

    /// Creates a fixed oscillator at normalized frequency `fnor`, with its
    /// `PRECALC_LEN`-sized ring already populated.
    pub fn new_fixed(fnor: Float) -> Self {
        let omega = crate::types::fnor_to_omega(fnor);
        let ring = Self::build_ring(0.0, omega);
        Ncqo {
            phi: 0.0,
            omega,
            fnor,
            mode: Mode::Fixed { ring, pos: 0 },
            memo: (0.0, 1.0, 0.0),
        }
    }

    fn build_ring(start_phi: Float, omega: Float) -> Vec<(Float, Float, Float)> {
        let mut phi = start_phi;
        let mut ring = Vec::with_capacity(PRECALC_LEN);
        for _ in 0..PRECALC_LEN {
            ring.push((phi, phi.cos(), phi.sin()));
            phi = wrap_2pi(phi + omega);
        }
        ring
    }

    /// True if this oscillator is in fixed (precalculated-ring) mode
    pub fn is_fixed(&self) -> bool {
        matches!(self.mode, Mode::Fixed { .. })
    }

    /// Advances the oscillator by one sample without reading it
    pub fn step(&mut self) {
        match &mut self.mode {
            Mode::Variable => {
                self.phi = wrap_2pi(self.phi + self.omega);
            }
            Mode::Fixed { ring, pos } => {
                *pos += 1;
                if *pos >= ring.len() {
                    let next_start = {
                        let (last_phi, _, _) = ring[ring.len() - 1];
                        wrap_2pi(last_phi + self.omega)
                    };
                    *ring = Self::build_ring(next_start, self.omega);
                    *pos = 0;
                }
                self.phi = ring[*pos].0;
            }
        }
    }

    /// Returns `(cos, sin)` at the current position without advancing
    pub fn get(&mut self) -> (Float, Float) {
        match &self.mode {
            Mode::Variable => {
                if (self.memo.0 - self.phi).abs() > Float::EPSILON {
                    self.memo = (self.phi, self.phi.cos(), self.phi.sin());
                }
                (self.memo.1, self.memo.2)
            }
            Mode::Fixed { ring, pos } => {
                let (_, c, s) = ring[*pos];
                (c, s)
            }
        }
    }

    /// Returns `cos` at the current position without advancing
    pub fn get_i(&mut self) -> Float {
        self.get().0
    }

    /// Returns `sin` at the current position without advancing
    pub fn get_q(&mut self) -> Float {
        self.get().1
    }

    /// Advances one sample and returns `cos + j*sin` at the new position
    pub fn read(&mut self) -> crate::types::Complex {
        self.step();
        let (c, s) = self.get();
        crate::types::Complex::new(c, s)
    }

    /// Advances one sample and returns `cos`
    pub fn read_i(&mut self) -> Float {
        self.step();
        self.get_i()
    }

    /// Advances one sample and returns `sin`
    pub fn read_q(&mut self) -> Float {
        self.step();
        self.get_q()
    }

    /// Current normalized frequency (half-cycles per sample)
    pub fn fnor(&self) -> Float {
        self.fnor
    }

    /// Current angular frequency (radians per sample)
    pub fn omega(&self) -> Float {
        self.omega
    }

    /// Current phase, in `[0, 2*pi)`
    pub fn phi(&self) -> Float {
        self.phi
    }

    /// Sets the angular frequency. No-op (logged) on a fixed oscillator.
    pub fn set_angfreq(&mut self, omega: Float) {
        if self.is_fixed() {
            error!("ncqo: set_angfreq on a fixed oscillator is not supported");
            return;
        }
        self.omega = omega;
        self.fnor = crate::types::omega_to_fnor(omega);
    }

    /// Sets the normalized frequency. No-op (logged) on a fixed oscillator.
    pub fn set_freq(&mut self, fnor: Float) {
        self.set_angfreq(crate::types::fnor_to_omega(fnor));
    }

    /// Increments the angular frequency by `delta`. No-op on a fixed
    /// oscillator.
    pub fn inc_angfreq(&mut self, delta: Float) {
        if self.is_fixed() {
            error!("ncqo: inc_angfreq on a fixed oscillator is not supported");
            return;
        }
        self.set_angfreq(self.omega + delta);
    }

    /// Increments the normalized frequency by `delta`. No-op on a fixed
    /// oscillator.
    pub fn inc_freq(&mut self, delta: Float) {
        self.inc_angfreq(crate::types::fnor_to_omega(delta));
    }

    /// Sets the phase directly. No-op (logged) on a fixed oscillator, per
    /// the source's "fail loudly" contract for precalculated oscillators.
    pub fn set_phase(&mut self, phi: Float) {
        if self.is_fixed() {
            error!("ncqo: set_phase on a fixed oscillator is not supported");
            return;
        }
        self.phi = wrap_2pi(phi);
    }

    /// Increments the phase by `delta`. No-op on a fixed oscillator.
    pub fn inc_phase(&mut self, delta: Float) {
        if self.is_fixed() {
            error!("ncqo: inc_phase on a fixed oscillator is not supported");
            return;
        }
        self.phi = wrap_2pi(self.phi + delta);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unit_circle_invariant() {
        let mut ncqo = Ncqo::new(0.13);
        for _ in 0..1000 {
            let c = ncqo.read();
            let mag = (c.re * c.re + c.im * c.im).sqrt();
            assert!((mag - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn fixed_matches_variable() {
        let mut variable = Ncqo::new(0.07);
        let mut fixed = Ncqo::new_fixed(0.07);
        for _ in 0..(PRECALC_LEN * 2 + 5) {
            let v = variable.read();
            let f = fixed.read();
            assert!((v.re - f.re).abs() < 1e-4);
            assert!((v.im - f.im).abs() < 1e-4);
        }
    }

    #[test]
    fn fixed_oscillator_rejects_mutation() {
        let mut fixed = Ncqo::new_fixed(0.1);
        let omega_before = fixed.omega();
        fixed.set_freq(0.3);
        assert_eq!(fixed.omega(), omega_before);
    }

    #[test]
    fn get_is_memoized_between_steps() {
        let mut ncqo = Ncqo::new(0.2);
        let first = ncqo.get();
        let second = ncqo.get();
        assert_eq!(first, second);
    }
}
