//! Named reductions.

use crate::{
    axes::IntoAxes,
    reduce::{reduce, Fold},
};
use kiln_core::{
    context::Context,
    dtype::DType,
    error::KilnError,
    expr::{BOp, Expr},
    scalar::Constant,
    tensor::Tensor,
};

/// Reduction op
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReduceOp {
    /// Sum, seeded with 0 unless initial is given
    Sum,
    /// Product, seeded with 1 unless initial is given
    Prod,
    /// Maximum, never seeded
    Max,
    /// Minimum, never seeded
    Min,
}

impl ReduceOp {
    /// Combine op
    #[must_use]
    pub const fn bop(self) -> BOp {
        match self {
            ReduceOp::Sum => BOp::Add,
            ReduceOp::Prod => BOp::Mul,
            ReduceOp::Max => BOp::Max,
            ReduceOp::Min => BOp::Min,
        }
    }

    /// Fold of this op over elements of dtype.
    ///
    /// Max and min have no identity common to all dtypes, so initial
    /// is discarded for them.
    #[must_use]
    pub fn fold(self, dtype: DType, initial: Option<Expr>) -> Fold {
        let identity = match self {
            ReduceOp::Sum => Some(initial.unwrap_or(Expr::Const(Constant::zero(dtype)))),
            ReduceOp::Prod => Some(initial.unwrap_or(Expr::Const(Constant::one(dtype)))),
            ReduceOp::Max | ReduceOp::Min => {
                if let Some(initial) = initial {
                    log::debug!("Initial value {initial} of reduce {self:?} is ignored");
                }
                None
            }
        };
        Fold::new(self.bop(), identity)
    }

    /// Reduce tensor with this op
    pub fn apply(
        self,
        ctx: &Context,
        tensor: &Tensor,
        axes: impl IntoAxes,
        keep_dims: bool,
        initial: Option<Expr>,
        name: &str,
    ) -> Result<Tensor, KilnError> {
        let fold = self.fold(tensor.dtype(), initial);
        reduce(ctx, tensor, axes, &fold, keep_dims, name)
    }
}

/// Sum of tensor along axes
pub fn reduce_sum(
    ctx: &Context,
    tensor: &Tensor,
    axes: impl IntoAxes,
    keep_dims: bool,
    initial: Option<Expr>,
    name: &str,
) -> Result<Tensor, KilnError> {
    ReduceOp::Sum.apply(ctx, tensor, axes, keep_dims, initial, name)
}

/// Product of tensor along axes
pub fn reduce_prod(
    ctx: &Context,
    tensor: &Tensor,
    axes: impl IntoAxes,
    keep_dims: bool,
    initial: Option<Expr>,
    name: &str,
) -> Result<Tensor, KilnError> {
    ReduceOp::Prod.apply(ctx, tensor, axes, keep_dims, initial, name)
}

/// Maximum of tensor along axes, initial is ignored
pub fn reduce_max(
    ctx: &Context,
    tensor: &Tensor,
    axes: impl IntoAxes,
    keep_dims: bool,
    initial: Option<Expr>,
    name: &str,
) -> Result<Tensor, KilnError> {
    ReduceOp::Max.apply(ctx, tensor, axes, keep_dims, initial, name)
}

/// Minimum of tensor along axes, initial is ignored
pub fn reduce_min(
    ctx: &Context,
    tensor: &Tensor,
    axes: impl IntoAxes,
    keep_dims: bool,
    initial: Option<Expr>,
    name: &str,
) -> Result<Tensor, KilnError> {
    ReduceOp::Min.apply(ctx, tensor, axes, keep_dims, initial, name)
}
