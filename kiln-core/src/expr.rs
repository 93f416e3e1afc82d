//! Expression algebra used for shapes, indices and compute bodies.
//!
//! Expressions are immutable trees. Constructors fold constants eagerly,
//! so shapes built only from constants stay constants.

use crate::{dtype::DType, error::KilnError, scalar::Constant, tensor::Tensor};
use core::fmt::{Display, Formatter};
use std::rc::Rc;

/// Binary op
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division, rounds toward zero for integers
    Div,
    /// Remainder
    Mod,
    /// Maximum
    Max,
    /// Minimum
    Min,
    /// Compare less than
    Cmplt,
    /// Compare greater or equal
    Cmpge,
    /// Logical and
    And,
    /// Logical or
    Or,
}

impl BOp {
    /// Does this op return bool?
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(self, BOp::Cmplt | BOp::Cmpge)
    }

    /// Can operands be swapped?
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(self, BOp::Add | BOp::Mul | BOp::Max | BOp::Min | BOp::And | BOp::Or)
    }

    const fn symbol(self) -> Option<&'static str> {
        match self {
            BOp::Add => Some("+"),
            BOp::Sub => Some("-"),
            BOp::Mul => Some("*"),
            BOp::Div => Some("/"),
            BOp::Mod => Some("%"),
            BOp::Cmplt => Some("<"),
            BOp::Cmpge => Some(">="),
            BOp::And => Some("&&"),
            BOp::Or => Some("||"),
            BOp::Max | BOp::Min => None,
        }
    }
}

impl Display for BOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            BOp::Add => "add",
            BOp::Sub => "sub",
            BOp::Mul => "mul",
            BOp::Div => "div",
            BOp::Mod => "mod",
            BOp::Max => "max",
            BOp::Min => "min",
            BOp::Cmplt => "cmplt",
            BOp::Cmpge => "cmpge",
            BOp::And => "and",
            BOp::Or => "or",
        })
    }
}

/// Integer variable ranging over `[0, extent)`.
///
/// Variables are compared by name and extent, names are unique
/// within one [`Context`](crate::context::Context).
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    name: Rc<str>,
    extent: Rc<Expr>,
}

impl Var {
    /// New variable with given name and extent
    pub fn new(name: impl Into<Rc<str>>, extent: impl Into<Expr>) -> Var {
        Var {
            name: name.into(),
            extent: Rc::new(extent.into()),
        }
    }

    /// Name of variable
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared name of variable
    #[must_use]
    pub fn name_rc(&self) -> &Rc<str> {
        &self.name
    }

    /// Upper bound (exclusive)
    #[must_use]
    pub fn extent(&self) -> &Expr {
        &self.extent
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant
    Const(Constant),
    /// Index or reduction variable
    Var(Var),
    /// Binary op
    Binary {
        /// Op
        op: BOp,
        /// Left operand
        x: Box<Expr>,
        /// Right operand
        y: Box<Expr>,
    },
    /// `cond ? then : otherwise`
    Select {
        /// Bool condition
        cond: Box<Expr>,
        /// Value if cond is true
        then: Box<Expr>,
        /// Value if cond is false
        otherwise: Box<Expr>,
    },
    /// Element of tensor
    Load {
        /// Loaded tensor
        tensor: Tensor,
        /// One index per tensor dimension
        indices: Vec<Expr>,
    },
    /// Fold of body over cartesian product of axes domains
    Reduce {
        /// Combine op
        op: BOp,
        /// Folded expression
        body: Box<Expr>,
        /// Reduction variables
        axes: Vec<Var>,
        /// Seed of the fold, if the fold has one
        init: Option<Box<Expr>>,
    },
    /// Call of external device intrinsic
    Call {
        /// Intrinsic name
        name: Rc<str>,
        /// Positional arguments
        args: Vec<Expr>,
        /// Return type
        dtype: DType,
    },
    /// Whole tensor passed as argument to [`Expr::Call`]
    Tensor(Tensor),
}

impl Expr {
    /// Integer (index) constant
    #[must_use]
    pub const fn int(x: i64) -> Expr {
        Expr::Const(Constant::I64(x))
    }

    /// Binary op, constants are folded
    #[must_use]
    pub fn binary(op: BOp, x: Expr, y: Expr) -> Expr {
        if let (Expr::Const(cx), Expr::Const(cy)) = (&x, &y) {
            if let Ok(c) = cx.binary(*cy, op) {
                return Expr::Const(c);
            }
        }
        // Identities are only applied to integers, 0*x is not 0 for floats
        let int_zero = |e: &Expr| matches!(e, Expr::Const(c) if c.dtype().is_integer() && c.is_zero());
        let int_one = |e: &Expr| matches!(e, Expr::Const(c) if c.dtype().is_integer() && c.is_one());
        match op {
            BOp::Add if int_zero(&x) => return y,
            BOp::Add | BOp::Sub if int_zero(&y) => return x,
            BOp::Mul if int_one(&x) => return y,
            BOp::Mul | BOp::Div if int_one(&y) => return x,
            BOp::Mul if int_zero(&x) => return x,
            BOp::Mul if int_zero(&y) => return y,
            _ => {}
        }
        Expr::Binary {
            op,
            x: Box::new(x),
            y: Box::new(y),
        }
    }

    /// `cond ? then : otherwise`
    #[must_use]
    pub fn select(cond: Expr, then: Expr, otherwise: Expr) -> Expr {
        match cond {
            Expr::Const(Constant::Bool(true)) => then,
            Expr::Const(Constant::Bool(false)) => otherwise,
            cond => Expr::Select {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        }
    }

    /// Fold of body over axes with op, seeded by init
    #[must_use]
    pub fn reduce(op: BOp, body: Expr, axes: Vec<Var>, init: Option<Expr>) -> Expr {
        Expr::Reduce {
            op,
            body: Box::new(body),
            axes,
            init: init.map(Box::new),
        }
    }

    /// Call external intrinsic
    #[must_use]
    pub fn call(name: impl Into<Rc<str>>, args: Vec<Expr>, dtype: DType) -> Expr {
        Expr::Call {
            name: name.into(),
            args,
            dtype,
        }
    }

    /// self < rhs
    #[must_use]
    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BOp::Cmplt, self, rhs.into())
    }

    /// self >= rhs
    #[must_use]
    pub fn ge(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BOp::Cmpge, self, rhs.into())
    }

    /// self && rhs
    #[must_use]
    pub fn and(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BOp::And, self, rhs.into())
    }

    /// max(self, rhs)
    #[must_use]
    pub fn max(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BOp::Max, self, rhs.into())
    }

    /// min(self, rhs)
    #[must_use]
    pub fn min(self, rhs: impl Into<Expr>) -> Expr {
        Expr::binary(BOp::Min, self, rhs.into())
    }

    /// Returns constant if this expression folds into one
    #[must_use]
    pub fn as_constant(&self) -> Option<Constant> {
        match self.fold() {
            Expr::Const(c) => Some(c),
            _ => None,
        }
    }

    /// Returns value if this expression folds into an integer constant
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        self.as_constant().and_then(|c| c.as_i64())
    }

    /// Constant folding of arithmetic subtrees
    #[must_use]
    pub fn fold(&self) -> Expr {
        match self {
            Expr::Binary { op, x, y } => Expr::binary(*op, x.fold(), y.fold()),
            Expr::Select {
                cond,
                then,
                otherwise,
            } => Expr::select(cond.fold(), then.fold(), otherwise.fold()),
            _ => self.clone(),
        }
    }

    /// Infer dtype of this expression
    pub fn dtype(&self) -> Result<DType, KilnError> {
        match self {
            Expr::Const(c) => Ok(c.dtype()),
            Expr::Var(_) => Ok(DType::I64),
            Expr::Binary { op, x, y } => {
                let xd = x.dtype()?;
                let yd = y.dtype()?;
                if xd != yd {
                    return Err(KilnError::type_mismatch(xd, yd));
                }
                Ok(if op.is_comparison() { DType::Bool } else { xd })
            }
            Expr::Select {
                cond,
                then,
                otherwise,
            } => {
                let cd = cond.dtype()?;
                if cd != DType::Bool {
                    return Err(KilnError::type_mismatch(DType::Bool, cd));
                }
                let td = then.dtype()?;
                let od = otherwise.dtype()?;
                if td != od {
                    return Err(KilnError::type_mismatch(td, od));
                }
                Ok(td)
            }
            Expr::Load { tensor, indices } => {
                if indices.len() != tensor.rank() {
                    return Err(KilnError::invalid_axis(format!(
                        "tensor {} has rank {} but is indexed with {} indices",
                        tensor.name(),
                        tensor.rank(),
                        indices.len()
                    )));
                }
                for index in indices {
                    let d = index.dtype()?;
                    if !d.is_integer() {
                        return Err(KilnError::type_mismatch(DType::I64, d));
                    }
                }
                Ok(tensor.dtype())
            }
            Expr::Reduce { body, init, .. } => {
                let d = body.dtype()?;
                if let Some(init) = init {
                    let id = init.dtype()?;
                    if id != d {
                        return Err(KilnError::type_mismatch(d, id));
                    }
                }
                Ok(d)
            }
            Expr::Call { dtype, .. } => Ok(*dtype),
            Expr::Tensor(tensor) => Ok(tensor.dtype()),
        }
    }

    /// Calls f on every tensor this expression reads from
    pub fn visit_tensors(&self, f: &mut impl FnMut(&Tensor)) {
        match self {
            Expr::Const(_) | Expr::Var(_) => {}
            Expr::Binary { x, y, .. } => {
                x.visit_tensors(f);
                y.visit_tensors(f);
            }
            Expr::Select {
                cond,
                then,
                otherwise,
            } => {
                cond.visit_tensors(f);
                then.visit_tensors(f);
                otherwise.visit_tensors(f);
            }
            Expr::Load { tensor, indices } => {
                f(tensor);
                for index in indices {
                    index.visit_tensors(f);
                }
            }
            Expr::Reduce { body, init, .. } => {
                body.visit_tensors(f);
                if let Some(init) = init {
                    init.visit_tensors(f);
                }
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.visit_tensors(f);
                }
            }
            Expr::Tensor(tensor) => f(tensor),
        }
    }
}

/// Row major flat offset of indices into tensor with shape
pub fn index_to_offset(shape: &[Expr], indices: &[Expr]) -> Result<Expr, KilnError> {
    if shape.len() != indices.len() || shape.is_empty() {
        return Err(KilnError::invalid_axis(format!(
            "can not compute offset of {} indices into shape of rank {}",
            indices.len(),
            shape.len()
        )));
    }
    let mut offset = indices[0].clone();
    for (dim, index) in shape.iter().zip(indices).skip(1) {
        offset = offset * dim.clone() + index.clone();
    }
    Ok(offset)
}

/// Sum of body over axes
#[must_use]
pub fn sum(body: Expr, axes: Vec<Var>) -> Expr {
    Expr::reduce(BOp::Add, body, axes, None)
}

macro_rules! impl_bop {
    ($trait:ident, $fn:ident, $op:expr) => {
        impl<T: Into<Expr>> core::ops::$trait<T> for Expr {
            type Output = Expr;
            fn $fn(self, rhs: T) -> Expr {
                Expr::binary($op, self, rhs.into())
            }
        }
    };
}

impl_bop!(Add, add, BOp::Add);
impl_bop!(Sub, sub, BOp::Sub);
impl_bop!(Mul, mul, BOp::Mul);
impl_bop!(Div, div, BOp::Div);
impl_bop!(Rem, rem, BOp::Mod);

impl From<Constant> for Expr {
    fn from(value: Constant) -> Self {
        Expr::Const(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::int(value)
    }
}

impl From<usize> for Expr {
    fn from(value: usize) -> Self {
        Expr::int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f32> for Expr {
    fn from(value: f32) -> Self {
        Expr::Const(value.into())
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value.into())
    }
}

impl From<Var> for Expr {
    fn from(value: Var) -> Self {
        Expr::Var(value)
    }
}

impl From<&Var> for Expr {
    fn from(value: &Var) -> Self {
        Expr::Var(value.clone())
    }
}

impl From<&Expr> for Expr {
    fn from(value: &Expr) -> Self {
        value.clone()
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> core::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.fmt(f)?;
    }
    Ok(())
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Expr::Const(c) => c.fmt(f),
            Expr::Var(v) => v.fmt(f),
            Expr::Binary { op, x, y } => match op.symbol() {
                Some(symbol) => f.write_fmt(format_args!("({x} {symbol} {y})")),
                None => f.write_fmt(format_args!("{op}({x}, {y})")),
            },
            Expr::Select {
                cond,
                then,
                otherwise,
            } => f.write_fmt(format_args!("select({cond}, {then}, {otherwise})")),
            Expr::Load { tensor, indices } => {
                f.write_fmt(format_args!("{}[", tensor.name()))?;
                write_list(f, indices)?;
                f.write_str("]")
            }
            Expr::Reduce {
                op,
                body,
                axes,
                init,
            } => {
                f.write_fmt(format_args!("reduce_{op}({body}, {{"))?;
                for (i, axis) in axes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_fmt(format_args!("{axis} < {}", axis.extent()))?;
                }
                f.write_str("}")?;
                if let Some(init) = init {
                    f.write_fmt(format_args!(", {init}"))?;
                }
                f.write_str(")")
            }
            Expr::Call { name, args, .. } => {
                f.write_fmt(format_args!("{name}("))?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::Tensor(tensor) => f.write_str(tensor.name()),
        }
    }
}
