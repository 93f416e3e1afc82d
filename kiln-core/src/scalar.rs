use crate::{dtype::DType, error::KilnError, expr::BOp};
use core::fmt::Display;
use duplicate::duplicate_item;
use half::{bf16, f16};

/// Compile time constant of any [`DType`].
///
/// Floats are stored as their bit patterns, so constants are `Eq`, `Ord` and `Hash`
/// and can be used as keys during common subexpression elimination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Constant {
    /// bf16 bits
    BF16(u16),
    /// f16 bits
    F16(u16),
    /// f32 bits
    F32(u32),
    /// f64 bits
    F64(u64),
    /// i32
    I32(i32),
    /// i64
    I64(i64),
    /// bool
    Bool(bool),
}

/// Scalar trait is implemented for all rust types backing a [`DType`]
pub trait Scalar: Copy + PartialOrd + core::fmt::Debug + 'static {
    /// Get dtype of Self
    fn dtype() -> DType;
    /// Get zero of Self
    fn zero() -> Self;
    /// Get one of Self
    fn one() -> Self;
    /// Wrap self into constant
    fn into_constant(self) -> Constant;
    /// Unwrap constant, returns None if constant has different dtype
    fn from_constant(constant: Constant) -> Option<Self>;
    /// Apply binary op
    fn binary(self, rhs: Self, op: BOp) -> Result<Constant, KilnError>;
}

#[duplicate_item(
    float   variant;
    [f32]   [F32];
    [f64]   [F64];
    [f16]   [F16];
    [bf16]  [BF16];
)]
impl Scalar for float {
    fn dtype() -> DType {
        DType::variant
    }

    fn zero() -> Self {
        Self::from(0u8)
    }

    fn one() -> Self {
        Self::from(1u8)
    }

    fn into_constant(self) -> Constant {
        Constant::variant(self.to_bits())
    }

    fn from_constant(constant: Constant) -> Option<Self> {
        if let Constant::variant(bits) = constant {
            Some(Self::from_bits(bits))
        } else {
            None
        }
    }

    fn binary(self, rhs: Self, op: BOp) -> Result<Constant, KilnError> {
        Ok(match op {
            BOp::Add => (self + rhs).into_constant(),
            BOp::Sub => (self - rhs).into_constant(),
            BOp::Mul => (self * rhs).into_constant(),
            BOp::Div => (self / rhs).into_constant(),
            BOp::Mod => (self % rhs).into_constant(),
            BOp::Max => (if self < rhs { rhs } else { self }).into_constant(),
            BOp::Min => (if rhs < self { rhs } else { self }).into_constant(),
            BOp::Cmplt => Constant::Bool(self < rhs),
            BOp::Cmpge => Constant::Bool(self >= rhs),
            BOp::And | BOp::Or => {
                return Err(KilnError::eval_error(format!(
                    "{op} is not defined for {}",
                    Self::dtype()
                )))
            }
        })
    }
}

#[duplicate_item(
    int     variant;
    [i32]   [I32];
    [i64]   [I64];
)]
impl Scalar for int {
    fn dtype() -> DType {
        DType::variant
    }

    fn zero() -> Self {
        0
    }

    fn one() -> Self {
        1
    }

    fn into_constant(self) -> Constant {
        Constant::variant(self)
    }

    fn from_constant(constant: Constant) -> Option<Self> {
        if let Constant::variant(x) = constant {
            Some(x)
        } else {
            None
        }
    }

    fn binary(self, rhs: Self, op: BOp) -> Result<Constant, KilnError> {
        Ok(match op {
            BOp::Add => self.wrapping_add(rhs).into_constant(),
            BOp::Sub => self.wrapping_sub(rhs).into_constant(),
            BOp::Mul => self.wrapping_mul(rhs).into_constant(),
            BOp::Div => self
                .checked_div(rhs)
                .ok_or_else(|| KilnError::eval_error("Division by zero constant"))?
                .into_constant(),
            BOp::Mod => self
                .checked_rem(rhs)
                .ok_or_else(|| KilnError::eval_error("Modulo by zero constant"))?
                .into_constant(),
            BOp::Max => self.max(rhs).into_constant(),
            BOp::Min => self.min(rhs).into_constant(),
            BOp::Cmplt => Constant::Bool(self < rhs),
            BOp::Cmpge => Constant::Bool(self >= rhs),
            BOp::And | BOp::Or => {
                return Err(KilnError::eval_error(format!(
                    "{op} is not defined for {}",
                    Self::dtype()
                )))
            }
        })
    }
}

impl Scalar for bool {
    fn dtype() -> DType {
        DType::Bool
    }

    fn zero() -> Self {
        false
    }

    fn one() -> Self {
        true
    }

    fn into_constant(self) -> Constant {
        Constant::Bool(self)
    }

    fn from_constant(constant: Constant) -> Option<Self> {
        if let Constant::Bool(x) = constant {
            Some(x)
        } else {
            None
        }
    }

    fn binary(self, rhs: Self, op: BOp) -> Result<Constant, KilnError> {
        Ok(Constant::Bool(match op {
            BOp::And | BOp::Min => self && rhs,
            BOp::Or | BOp::Max => self || rhs,
            _ => {
                return Err(KilnError::eval_error(format!("{op} is not defined for bool")))
            }
        }))
    }
}

impl Constant {
    /// Create new constant from scalar
    pub fn new<T: Scalar>(x: T) -> Constant {
        x.into_constant()
    }

    /// DType of constant
    #[must_use]
    pub const fn dtype(&self) -> DType {
        match self {
            Constant::BF16(_) => DType::BF16,
            Constant::F16(_) => DType::F16,
            Constant::F32(_) => DType::F32,
            Constant::F64(_) => DType::F64,
            Constant::I32(_) => DType::I32,
            Constant::I64(_) => DType::I64,
            Constant::Bool(_) => DType::Bool,
        }
    }

    /// Zero (additive identity) of dtype
    #[must_use]
    pub fn zero(dtype: DType) -> Constant {
        match dtype {
            DType::BF16 => bf16::zero().into_constant(),
            DType::F16 => f16::zero().into_constant(),
            DType::F32 => f32::zero().into_constant(),
            DType::F64 => f64::zero().into_constant(),
            DType::I32 => i32::zero().into_constant(),
            DType::I64 => i64::zero().into_constant(),
            DType::Bool => bool::zero().into_constant(),
        }
    }

    /// One (multiplicative identity) of dtype
    #[must_use]
    pub fn one(dtype: DType) -> Constant {
        match dtype {
            DType::BF16 => bf16::one().into_constant(),
            DType::F16 => f16::one().into_constant(),
            DType::F32 => f32::one().into_constant(),
            DType::F64 => f64::one().into_constant(),
            DType::I32 => i32::one().into_constant(),
            DType::I64 => i64::one().into_constant(),
            DType::Bool => bool::one().into_constant(),
        }
    }

    /// Is this constant zero of it's dtype?
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.to_f64() == 0.0
    }

    /// Is this constant one of it's dtype?
    #[must_use]
    pub fn is_one(&self) -> bool {
        self.to_f64() == 1.0
    }

    /// Returns value of integer constants
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Constant::I32(x) => Some(*x as i64),
            Constant::I64(x) => Some(*x),
            _ => None,
        }
    }

    /// Lossy conversion to f64
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        match *self {
            Constant::BF16(x) => bf16::from_bits(x).to_f64(),
            Constant::F16(x) => f16::from_bits(x).to_f64(),
            Constant::F32(x) => f64::from(f32::from_bits(x)),
            Constant::F64(x) => f64::from_bits(x),
            Constant::I32(x) => f64::from(x),
            #[allow(clippy::cast_precision_loss)]
            Constant::I64(x) => x as f64,
            Constant::Bool(x) => f64::from(u8::from(x)),
        }
    }

    /// Lossy conversion from f64 to constant of dtype
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(dtype: DType, x: f64) -> Constant {
        match dtype {
            DType::BF16 => bf16::from_f64(x).into_constant(),
            DType::F16 => f16::from_f64(x).into_constant(),
            DType::F32 => (x as f32).into_constant(),
            DType::F64 => x.into_constant(),
            DType::I32 => (x as i32).into_constant(),
            DType::I64 => (x as i64).into_constant(),
            DType::Bool => Constant::Bool(x != 0.0),
        }
    }

    /// Apply binary op to two constants of the same dtype
    pub fn binary(self, rhs: Constant, op: BOp) -> Result<Constant, KilnError> {
        fn apply<T: Scalar>(x: Constant, y: Constant, op: BOp) -> Result<Constant, KilnError> {
            match (T::from_constant(x), T::from_constant(y)) {
                (Some(x), Some(y)) => x.binary(y, op),
                _ => Err(KilnError::type_mismatch(x.dtype(), y.dtype())),
            }
        }
        match self.dtype() {
            DType::BF16 => apply::<bf16>(self, rhs, op),
            DType::F16 => apply::<f16>(self, rhs, op),
            DType::F32 => apply::<f32>(self, rhs, op),
            DType::F64 => apply::<f64>(self, rhs, op),
            DType::I32 => apply::<i32>(self, rhs, op),
            DType::I64 => apply::<i64>(self, rhs, op),
            DType::Bool => apply::<bool>(self, rhs, op),
        }
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Constant::BF16(x) => f.write_fmt(format_args!("{}bf16", bf16::from_bits(x))),
            Constant::F16(x) => f.write_fmt(format_args!("{}f16", f16::from_bits(x))),
            Constant::F32(x) => f.write_fmt(format_args!("{:?}f", f32::from_bits(x))),
            Constant::F64(x) => f.write_fmt(format_args!("{:?}", f64::from_bits(x))),
            Constant::I32(x) => f.write_fmt(format_args!("{x}")),
            Constant::I64(x) => f.write_fmt(format_args!("{x}")),
            Constant::Bool(x) => f.write_fmt(format_args!("{x}")),
        }
    }
}

impl From<f32> for Constant {
    fn from(value: f32) -> Self {
        value.into_constant()
    }
}

impl From<f64> for Constant {
    fn from(value: f64) -> Self {
        value.into_constant()
    }
}

impl From<i32> for Constant {
    fn from(value: i32) -> Self {
        value.into_constant()
    }
}

impl From<i64> for Constant {
    fn from(value: i64) -> Self {
        value.into_constant()
    }
}

impl From<bool> for Constant {
    fn from(value: bool) -> Self {
        value.into_constant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_roundtrip_arithmetic() {
        let x = Constant::new(f16::from_f32(1.5));
        let y = Constant::new(f16::from_f32(2.0));
        let z = x.binary(y, BOp::Add).unwrap();
        assert_eq!(z, Constant::new(f16::from_f32(3.5)));
        assert_eq!(z.dtype(), DType::F16);
    }

    #[test]
    fn mixed_dtypes_are_rejected() {
        let err = Constant::from(1i32).binary(Constant::from(1f32), BOp::Add).unwrap_err();
        assert_eq!(err, KilnError::type_mismatch(DType::I32, DType::F32));
    }

    #[test]
    fn integer_division_by_zero() {
        assert!(Constant::from(4i64).binary(Constant::from(0i64), BOp::Div).is_err());
        assert_eq!(
            Constant::from(7i64).binary(Constant::from(2i64), BOp::Mod),
            Ok(Constant::from(1i64))
        );
    }
}
