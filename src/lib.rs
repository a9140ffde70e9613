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

//!
//! Composable digital-signal-processing primitives for complex-baseband
//! (I/Q) sample streams, built up from a small numerical kernel
//! (oscillator, IIR/FIR design, PLL/Costas, clock recovery, AGC) into two
//! higher-level subsystems: a frequency-domain multi-channel extractor
//! ([`specttuner`]) and a streaming channel detector ([`detect`]).
//!
//! Every type in this crate is plain owned state operated on by `&mut
//! self` methods; there is no internal threading, scheduler, or shared
//! mutable state. Callers that want concurrency are expected to serialize
//! access to each instance themselves (see the crate-level concurrency
//! notes in each module).
//!

#![deny(
    bad_style,
    const_err,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    private_in_public,
    unconditional_recursion,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2018_idioms
)]
#![warn(clippy::all)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;

pub mod agc;
pub mod clock;
pub mod coef;
pub mod detect;
pub mod error;
pub mod fft;
pub mod iir;
pub mod ncqo;
pub mod pll;
pub mod specttuner;
pub mod taps;
pub mod types;
pub mod windows;

pub use crate::error::{Error, Result};
pub use crate::types::{Complex, Float};
