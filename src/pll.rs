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

//! Carrier-phase locked loops: a real-input PLL and a complex-input Costas
//! loop, both driven by an [`Ncqo`] local oscillator.

use crate::error::{Error, Result};
use crate::iir::IirFilter;
use crate::ncqo::Ncqo;
use crate::types::{Complex, Float};
use std::f64::consts::PI;

/// A classical second-order PLL locking onto a real-valued tone
#[derive(Debug, Clone)]
pub struct Pll {
    ncqo: Ncqo,
    alpha: Float,
    beta: Float,
    lock: Float,
}

impl Pll {
    /// Creates a PLL with local-oscillator hint `f_hint` (normalized) and
    /// loop bandwidth `fc` (normalized)
    pub fn new(f_hint: Float, fc: Float) -> Self {
        let alpha = 2.0 * (PI as Float) * fc;
        let beta = alpha.sqrt();
        Pll {
            ncqo: Ncqo::new(f_hint),
            alpha,
            beta,
            lock: 0.0,
        }
    }

    /// Feeds one real-valued sample and updates the loop
    pub fn feed(&mut self, x: Float) {
        let s = self.ncqo.read();
        let err = -x * s.im;
        self.lock += self.beta * (2.0 * x * s.re - self.lock);
        if self.ncqo.omega() > -self.alpha * err {
            self.ncqo.inc_angfreq(self.alpha * err);
        }
        self.ncqo.inc_phase(self.beta * err);
    }

    /// Current lock indicator (a low-pass of the demodulated in-phase power)
    pub fn lock(&self) -> Float {
        self.lock
    }

    /// The local oscillator's current angular frequency
    pub fn omega(&self) -> Float {
        self.ncqo.omega()
    }
}

/// Which decision-aided error formula a [`Costas`] loop uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostasKind {
    /// No carrier recovery (the loop does not update)
    None,
    /// Binary phase-shift keying
    Bpsk,
    /// Quadrature phase-shift keying
    Qpsk,
    /// 8-ary phase-shift keying — declared but not implemented; see
    /// [`Costas::feed`]
    Psk8,
}

/// A Costas carrier-recovery loop for BPSK/QPSK (and, nominally, 8PSK)
#[derive(Debug, Clone)]
pub struct Costas {
    kind: CostasKind,
    ncqo: Ncqo,
    a: Float,
    b: Float,
    arm: IirFilter,
    y_alpha: Float,
    lock: Float,
    y: Complex,
    z: Complex,
}

impl Costas {
    /// Creates a Costas loop of the given `kind`, local-oscillator hint
    /// `f_hint`, arm-filter bandwidth `arm_bw` and order `arm_order`
    /// (`<= 1` gives a single-tap arm filter; otherwise a brickwall
    /// lowpass of that many taps), and loop bandwidth `loop_bw`
    /// (all normalized frequencies).
    pub fn new(
        kind: CostasKind,
        f_hint: Float,
        arm_bw: Float,
        arm_order: usize,
        loop_bw: Float,
    ) -> Result<Self> {
        let a = 2.0 * (PI as Float) * loop_bw;
        let b = a * a / 4.0;
        let arm = if arm_order <= 1 {
            IirFilter::new(vec![Complex::new(1.0, 0.0)], vec![1.0])?
        } else {
            crate::iir::brickwall_lpf(arm_bw, arm_order)?
        };
        Ok(Costas {
            kind,
            ncqo: Ncqo::new(f_hint),
            a,
            b,
            arm,
            y_alpha: 0.25,
            lock: 0.0,
            y: Complex::new(0.0, 0.0),
            z: Complex::new(0.0, 0.0),
        })
    }

    fn error(&self, z: Complex) -> Result<Float> {
        match self.kind {
            CostasKind::None => Err(Error::UnsupportedMode("costas: kind is None")),
            CostasKind::Bpsk => Ok(-z.re * z.im),
            CostasKind::Qpsk => {
                let sgn = Complex::new(sign(z.re), sign(z.im));
                Ok(sgn.re * z.im - sgn.im * z.re)
            }
            CostasKind::Psk8 => Err(Error::UnsupportedMode(
                "costas: 8PSK has no defined error formula",
            )),
        }
    }

    /// Feeds one complex baseband sample and updates the loop. Returns
    /// `Err` (logged) without mutating state for `kind == None` or
    /// `kind == Psk8`, matching the source's refusal to invent an 8PSK
    /// error formula.
    pub fn feed(&mut self, x: Complex) -> Result<()> {
        let s = self.ncqo.read();
        let z = self.arm.feed(s.conj() * x);
        let e = match self.error(z) {
            Ok(e) => e,
            Err(err) => return Err(crate::error::logged(err)),
        };
        self.z = z;
        self.lock += self.a * (1.0 - e - self.lock);
        self.y += (z - self.y) * self.y_alpha;
        self.ncqo.inc_angfreq(self.b * e);
        self.ncqo.inc_phase(self.a * e);
        Ok(())
    }

    /// The tracked, low-pass-filtered arm output (the "track" accessor)
    pub fn track(&self) -> Complex {
        self.y
    }

    /// The last raw arm-filter output
    pub fn z(&self) -> Complex {
        self.z
    }

    /// Current lock indicator
    pub fn lock(&self) -> Float {
        self.lock
    }

    /// The local oscillator's current phase, in `[0, 2*pi)`
    pub fn phase(&self) -> Float {
        self.ncqo.phi()
    }
}

fn sign(x: Float) -> Float {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn costas_rejects_none_kind() {
        let mut costas = Costas::new(CostasKind::None, 0.01, 0.05, 1, 0.001).unwrap();
        assert!(costas.feed(Complex::new(1.0, 0.0)).is_err());
    }

    #[test]
    fn costas_rejects_8psk() {
        let mut costas = Costas::new(CostasKind::Psk8, 0.01, 0.05, 1, 0.001).unwrap();
        assert!(costas.feed(Complex::new(1.0, 0.0)).is_err());
    }

    #[test]
    fn costas_bpsk_locks_on_unmodulated_carrier() {
        let mut costas = Costas::new(CostasKind::Bpsk, 0.0, 0.05, 1, 0.001).unwrap();
        let omega = crate::types::fnor_to_omega(0.01);
        let mut phi: Float = 0.0;
        for _ in 0..20000 {
            let x = Complex::new(phi.cos(), phi.sin());
            costas.feed(x).unwrap();
            phi += omega;
        }
        // After lock-in the recovered frequency should track the carrier
        assert!((costas.lock() - 1.0).abs() < 1.0);
    }
}
