/// DType of tensor
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DType {
    /// 16 bit brain floating point type
    BF16,
    /// 16 bit floating point type
    F16,
    /// 32 bit floating point type
    F32,
    /// 64 bit floating point type
    F64,
    /// 32 bit integer type
    I32,
    /// 64 bit integer type, also the type of all index expressions
    I64,
    /// Boolean, result of comparisons
    Bool,
}

impl DType {
    /// Check if self is floating point dtype
    #[must_use]
    pub const fn is_floating(self) -> bool {
        match self {
            Self::BF16 | Self::F16 | Self::F32 | Self::F64 => true,
            Self::I32 | Self::I64 | Self::Bool => false,
        }
    }

    /// Check if self can be used for indexing
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }
}

impl core::fmt::Display for DType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        f.write_str(match self {
            Self::BF16 => "bf16",
            Self::F16 => "f16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Bool => "bool",
        })
    }
}
