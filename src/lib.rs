#![doc = include_str!(concat!(env!("OUT_DIR"), "/README-rustdocified.md"))]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use std::{fmt, io};

pub use crate::{
    field::{Field, Interpolation, Orientation},
    line::Line,
    selection::{Selection, SelectionShape},
    spectra::Spectra,
    spline::{Spline, XY},
    surface::{Surface, Xyz},
    unit::SiUnit,
};

#[cfg(test)]
#[macro_use]
mod test_util;

mod field;
mod line;
mod math;
mod selection;
mod spectra;
mod spline;
mod surface;
mod unit;

pub mod dft;
pub mod filter;
pub mod funcuse;
pub mod level;
pub mod neural;
pub mod notify;
pub mod peaks;
pub mod plux;
pub mod repair;

// ======================================================================
// TYPE ALIASES - PUBLIC

/// Progress callback for long-running operations.
///
/// The argument is the completed fraction in `0.0 ..= 1.0`.  Returning
/// `false` cancels the operation: it stops with [`Error::Cancelled`],
/// leaving partly updated data valid with its caches invalidated.
pub type ProgressFn = dyn FnMut(f64) -> bool;

// ======================================================================
// Error - PUBLIC

/// Represents all possible errors that can occur in this library.
///
/// Programmer errors (zero dimensions, non-positive extents, mismatched
/// buffer lengths, selection indexes out of range) are not represented
/// here; the functions panic on them and document it under `# Panics`.
#[derive(Debug)]
pub enum Error {
    /// Transform length contains a prime factor outside {2, 3, 5, 7}.
    UnsupportedSize {
        /// Requested transform length.
        size: usize,
        /// The part of the length that could not be factored.
        remainder: usize,
    },

    /// An underlying I/O operation failed.
    Io(io::Error),

    /// Malformed input that could not be parsed.
    Parse {
        /// Human-readable description of what failed to parse.
        reason: String,
    },

    /// A required key is absent from a parsed document.
    MissingKey {
        /// Path of the missing key.
        key: String,
    },

    /// Raw data has a different size than the declared dimensions imply.
    SizeMismatch {
        /// Expected size in bytes or samples.
        expected: usize,
        /// Size actually present.
        got: usize,
    },

    /// Two objects that must share units do not.
    UnitIncompatibility {
        /// Unit of the primary object.
        expected: SiUnit,
        /// Unit actually found.
        got: SiUnit,
    },

    /// A progress callback returned `false`.
    Cancelled,

    /// A container was read successfully but holds no usable data.
    NoData,
}

// ======================================================================
// Error - IMPL DISPLAY

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedSize { size, remainder } => {
                write!(
                    f,
                    "unsupported transform size: {} contains prime factors of {} \
                     outside {{2, 3, 5, 7}}",
                    size, remainder
                )
            }

            Error::Io(err) => write!(f, "input/output error: {}", err),

            Error::Parse { reason } => write!(f, "parse error: {}", reason),

            Error::MissingKey { key } => write!(f, "required key is missing: {}", key),

            Error::SizeMismatch { expected, got } => {
                write!(f, "data size mismatch: expected {}, got {}", expected, got)
            }

            Error::UnitIncompatibility { expected, got } => {
                write!(f, "incompatible units: expected {}, got {}", expected, got)
            }

            Error::Cancelled => write!(f, "operation was cancelled"),

            Error::NoData => write!(f, "container holds no usable data"),
        }
    }
}

// ======================================================================
// Error - IMPL ERROR / FROM

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
