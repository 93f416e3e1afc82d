use kiln_core::{dtype::DType, expr::BOp, scalar::Constant, shape::Shape};
use core::fmt::{Display, Formatter};

/// Position of instruction in its computation.
///
/// Only valid within the computation that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(pub usize);

impl Display for InstrId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("%{}", self.0))
    }
}

/// Elementwise binary opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstrCode {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Maximum
    Max,
    /// Minimum
    Min,
}

impl InstrCode {
    /// Scalar op applied to every element
    #[must_use]
    pub const fn bop(self) -> BOp {
        match self {
            InstrCode::Add => BOp::Add,
            InstrCode::Sub => BOp::Sub,
            InstrCode::Mul => BOp::Mul,
            InstrCode::Div => BOp::Div,
            InstrCode::Max => BOp::Max,
            InstrCode::Min => BOp::Min,
        }
    }
}

impl Display for InstrCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        self.bop().fmt(f)
    }
}

/// Type configuration of one parameter position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParameterConfig {
    /// Element type of the parameter
    pub dtype: DType,
}

impl ParameterConfig {
    /// Config with dtype
    #[must_use]
    pub const fn new(dtype: DType) -> ParameterConfig {
        ParameterConfig { dtype }
    }
}

/// What the instruction computes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstrKind {
    /// External input bound to positional index
    Parameter {
        /// Position among parameters
        index: usize,
        /// Name of the parameter
        name: Box<str>,
        /// Type of the parameter
        config: ParameterConfig,
    },
    /// Every element equals value
    Constant(Constant),
    /// Elementwise binary op
    Binary {
        /// Opcode
        code: InstrCode,
        /// Left operand
        x: InstrId,
        /// Right operand
        y: InstrId,
    },
}

/// Node of a [`Computation`](crate::computation::Computation)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    kind: InstrKind,
    shape: Shape,
    // Binaries get their dtype once added to a computation
    dtype: Option<DType>,
}

impl Instruction {
    /// External input
    pub fn parameter(
        index: usize,
        shape: impl Into<Shape>,
        name: &str,
        config: ParameterConfig,
    ) -> Instruction {
        Instruction {
            kind: InstrKind::Parameter {
                index,
                name: name.into(),
                config,
            },
            shape: shape.into(),
            dtype: Some(config.dtype),
        }
    }

    /// Splat constant
    pub fn constant(shape: impl Into<Shape>, value: impl Into<Constant>) -> Instruction {
        let value = value.into();
        Instruction {
            kind: InstrKind::Constant(value),
            shape: shape.into(),
            dtype: Some(value.dtype()),
        }
    }

    /// Elementwise binary op of two earlier instructions with shape
    pub fn binary(shape: impl Into<Shape>, code: InstrCode, x: InstrId, y: InstrId) -> Instruction {
        Instruction {
            kind: InstrKind::Binary { code, x, y },
            shape: shape.into(),
            dtype: None,
        }
    }

    /// Kind
    #[must_use]
    pub const fn kind(&self) -> &InstrKind {
        &self.kind
    }

    /// Result shape
    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Result type, None for binaries not yet added to a computation
    #[must_use]
    pub const fn dtype(&self) -> Option<DType> {
        self.dtype
    }

    pub(crate) fn set_dtype(&mut self, dtype: DType) {
        self.dtype = Some(dtype);
    }

    /// Is this a parameter?
    #[must_use]
    pub const fn is_parameter(&self) -> bool {
        matches!(self.kind, InstrKind::Parameter { .. })
    }

    /// Constant value of splat constants
    #[must_use]
    pub const fn as_constant(&self) -> Option<Constant> {
        if let InstrKind::Constant(c) = self.kind {
            Some(c)
        } else {
            None
        }
    }

    /// Iterate over operands of instruction
    #[must_use]
    pub fn operands(&self) -> InstrOperandsIterator {
        match self.kind {
            InstrKind::Parameter { .. } | InstrKind::Constant(_) => InstrOperandsIterator {
                operands: [InstrId(0); 2],
                len: 0,
                idx: 0,
            },
            InstrKind::Binary { x, y, .. } => InstrOperandsIterator {
                operands: [x, y],
                len: 2,
                idx: 0,
            },
        }
    }

    pub(crate) fn remap_operands(&mut self, mut f: impl FnMut(InstrId) -> InstrId) {
        if let InstrKind::Binary { x, y, .. } = &mut self.kind {
            *x = f(*x);
            *y = f(*y);
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match &self.kind {
            InstrKind::Parameter { index, name, .. } => {
                f.write_fmt(format_args!("parameter({index}, {name:?})"))?;
            }
            InstrKind::Constant(c) => f.write_fmt(format_args!("constant({c})"))?,
            InstrKind::Binary { code, x, y } => f.write_fmt(format_args!("{code}({x}, {y})"))?,
        }
        match self.dtype {
            Some(dtype) => f.write_fmt(format_args!(" : {dtype}{}", self.shape)),
            None => f.write_fmt(format_args!(" : {}", self.shape)),
        }
    }
}

/// Iterator over operands of instruction which does not allocate on heap.
pub struct InstrOperandsIterator {
    operands: [InstrId; 2],
    len: u8,
    idx: u8,
}

impl Iterator for InstrOperandsIterator {
    type Item = InstrId;
    fn next(&mut self) -> Option<Self::Item> {
        if self.idx == self.len {
            return None;
        }
        let idx = self.idx;
        self.idx += 1;
        Some(self.operands[idx as usize])
    }
}
