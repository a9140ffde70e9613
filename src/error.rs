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

//! Error kinds produced by the core

use std::error::Error as StdError;
use std::fmt;

/// Convenience alias for fallible core operations
pub type Result<T> = std::result::Result<T, Error>;

/// An error produced by a core component
///
/// Every fallible constructor or method in this crate returns one of these
/// instead of panicking or retrying; constructors that fail free whatever
/// partial state they had allocated before returning the error.
#[derive(Debug)]
pub enum Error {
    /// A buffer or FFT plan allocation failed
    AllocationFailure(&'static str),
    /// An argument was out of its documented range
    InvalidArgument(&'static str),
    /// The requested mode or combination of parameters is not implemented
    UnsupportedMode(&'static str),
    /// A registered callback rejected the data it was given
    CallbackRejection,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::AllocationFailure(what) => write!(f, "allocation failed: {}", what),
            Error::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            Error::UnsupportedMode(what) => write!(f, "unsupported mode: {}", what),
            Error::CallbackRejection => write!(f, "callback rejected the delivered data"),
        }
    }
}

impl StdError for Error {}

/// Logs `err` through the logging collaborator and returns it, matching the
/// source's "log before propagating" error policy.
pub(crate) fn logged(err: Error) -> Error {
    error!("{}", err);
    err
}
