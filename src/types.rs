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

//! Numeric kind selection and frequency-unit conversions
//!
//! The core is parameterized over a single floating-point width, chosen at
//! build time through the `double-precision` feature. `Complex` is the
//! matching complex type. Every other module in this crate is written
//! against [`Float`] and [`Complex`] rather than against `f32`/`f64`
//! directly so that switching precision only touches this file.

#[cfg(feature = "double-precision")]
/// The scalar floating-point type used throughout the core
pub type Float = f64;
#[cfg(not(feature = "double-precision"))]
/// The scalar floating-point type used throughout the core
pub type Float = f32;

/// The complex counterpart of [`Float`]
#[cfg(feature = "double-precision")]
pub type Complex = num_complex::Complex64;
#[cfg(not(feature = "double-precision"))]
pub type Complex = num_complex::Complex32;

/// `2*pi`, used constantly when converting between angular and normalized
/// frequency representations
pub const TWO_PI: Float = std::f64::consts::TAU as Float;

/// Converts an absolute frequency in Hz to normalized frequency (half-cycles
/// per sample): `fnor = 2*fabs/fs`.
pub fn abs_to_fnor(fabs: Float, fs: Float) -> Float {
    2.0 * fabs / fs
}

/// Converts normalized frequency back to an absolute frequency in Hz.
pub fn fnor_to_abs(fnor: Float, fs: Float) -> Float {
    fnor * fs / 2.0
}

/// Converts normalized frequency (half-cycles per sample) to angular
/// frequency in radians per sample: `omega = pi*fnor`.
pub fn fnor_to_omega(fnor: Float) -> Float {
    std::f64::consts::PI as Float * fnor
}

/// Converts angular frequency in radians per sample back to normalized
/// frequency.
pub fn omega_to_fnor(omega: Float) -> Float {
    omega / std::f64::consts::PI as Float
}

/// Converts an absolute frequency directly to angular frequency
/// (radians/sample).
pub fn abs_to_omega(fabs: Float, fs: Float) -> Float {
    fnor_to_omega(abs_to_fnor(fabs, fs))
}

/// Converts angular frequency (radians/sample) directly to an absolute
/// frequency in Hz.
pub fn omega_to_abs(omega: Float, fs: Float) -> Float {
    fnor_to_abs(omega_to_fnor(omega), fs)
}

/// Converts a normalized baud (symbols per sample) to a symbol rate in Hz.
pub fn bnor_to_abs(bnor: Float, fs: Float) -> Float {
    bnor * fs
}

/// Converts a symbol rate in Hz to normalized baud (symbols per sample).
pub fn abs_to_bnor(baud: Float, fs: Float) -> Float {
    baud / fs
}

/// Converts a linear power ratio to decibels: `10*log10(x)`.
pub fn db(x: Float) -> Float {
    10.0 * x.log10()
}

/// Converts a decibel value back to a linear power ratio: `10^(x/10)`.
pub fn mag_raw(db: Float) -> Float {
    (10.0 as Float).powf(db / 10.0)
}

/// Wraps an angle into `[0, 2*pi)`.
pub fn wrap_2pi(phi: Float) -> Float {
    let two_pi = TWO_PI;
    let wrapped = phi % two_pi;
    if wrapped < 0.0 {
        wrapped + two_pi
    } else {
        wrapped
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip_abs_fnor() {
        let fs = 8000.0;
        let fabs = 1234.5;
        let fnor = abs_to_fnor(fabs, fs);
        assert!((fnor_to_abs(fnor, fs) - fabs).abs() < 1e-3);
    }

    #[test]
    fn roundtrip_fnor_omega() {
        let fnor = 0.37;
        assert!((omega_to_fnor(fnor_to_omega(fnor)) - fnor).abs() < 1e-6);
    }

    #[test]
    fn db_roundtrip() {
        let x = 3.2;
        assert!((mag_raw(db(x)) - x).abs() < 1e-4);
    }

    #[test]
    fn wrap_keeps_in_range() {
        assert!((wrap_2pi(-0.5) - (TWO_PI - 0.5)).abs() < 1e-6);
        assert!((wrap_2pi(TWO_PI + 0.2) - 0.2).abs() < 1e-6);
    }
}
