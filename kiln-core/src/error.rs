use crate::dtype::DType;
use std::fmt::{Display, Formatter, Write};

/// KilnError
///
/// Every error aborts compilation of the current unit, there is no
/// partial result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KilnError {
    /// Axis out of range after normalization, or reduction over zero dimensions
    InvalidAxis(Box<str>),
    /// Unexpected dtype found
    TypeMismatch {
        /// Expected dtype
        expected: DType,
        /// Found dtype
        found: DType,
    },
    /// Dimension extent is required to be a compile time constant
    NonConstantExtent(Box<str>),
    /// Module already holds a computation with this name
    DuplicateComputationName(Box<str>),
    /// Operand does not exist yet, shapes do not match or builder was already frozen
    InvalidOperandReference(Box<str>),
    /// Index out of bounds
    IndexOutOfBounds {
        /// Passed index
        index: usize,
        /// Actual length
        len: usize,
    },
    /// Failure while interpreting tensors or computations
    EvalError(Box<str>),
    /// Invalid configuration
    ConfigError(Box<str>),
}

#[track_caller]
fn located(e: Box<str>) -> Box<str> {
    let location = std::panic::Location::caller();
    let mut e: String = e.into();
    // Writing into a String never fails
    let _ = write!(e, ", {}:{}:{}", location.file(), location.line(), location.column());
    e.into()
}

impl KilnError {
    /// Invalid axis error
    #[track_caller]
    pub fn invalid_axis(e: impl Into<Box<str>>) -> Self {
        Self::InvalidAxis(located(e.into()))
    }

    /// Non constant extent error
    #[track_caller]
    pub fn non_constant_extent(e: impl Into<Box<str>>) -> Self {
        Self::NonConstantExtent(located(e.into()))
    }

    /// Invalid operand reference error
    #[track_caller]
    pub fn invalid_operand(e: impl Into<Box<str>>) -> Self {
        Self::InvalidOperandReference(located(e.into()))
    }

    /// Evaluation error
    #[track_caller]
    pub fn eval_error(e: impl Into<Box<str>>) -> Self {
        Self::EvalError(located(e.into()))
    }

    /// Type mismatch, unlike the other variants it carries no location
    pub const fn type_mismatch(expected: DType, found: DType) -> Self {
        Self::TypeMismatch { expected, found }
    }
}

impl Display for KilnError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KilnError::InvalidAxis(e) => f.write_fmt(format_args!("Invalid axis {e}")),
            KilnError::TypeMismatch { expected, found } => f.write_fmt(format_args!(
                "TypeMismatch: Expected {expected:?} but found {found:?}."
            )),
            KilnError::NonConstantExtent(e) => {
                f.write_fmt(format_args!("Extent is not a compile time constant {e}"))
            }
            KilnError::DuplicateComputationName(name) => {
                f.write_fmt(format_args!("Computation {name:?} already exists in module"))
            }
            KilnError::InvalidOperandReference(e) => {
                f.write_fmt(format_args!("Invalid operand reference {e}"))
            }
            KilnError::IndexOutOfBounds { index, len } => f.write_fmt(format_args!(
                "Range out of bounds: The index is {index}, but the len is {len}"
            )),
            KilnError::EvalError(e) => f.write_fmt(format_args!("Evaluation failed {e}")),
            KilnError::ConfigError(e) => f.write_fmt(format_args!("Config {e}")),
        }
    }
}

impl std::error::Error for KilnError {}
