//! Lowering of axis reductions into compute definitions.

use crate::axes::{output_shape, real_axes, Axes, IntoAxes};
use kiln_core::{
    context::Context,
    error::KilnError,
    expr::{BOp, Expr, Var},
    tensor::Tensor,
};
use log::{debug, info};

/// Folding strategy of a reduction: combine op and optional seed.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    /// Associative, commutative combine op
    pub op: BOp,
    /// Seed of the fold, without it the fold starts with the first element
    pub identity: Option<Expr>,
}

impl Fold {
    /// New fold
    #[must_use]
    pub const fn new(op: BOp, identity: Option<Expr>) -> Fold {
        Fold { op, identity }
    }
}

/// Resolved description of one reduction
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionSpec {
    /// Reduced axes, sorted and unique
    pub real_axes: Axes,
    /// Reduced axes removed from the output, empty with keep dims
    pub squeeze_axes: Axes,
    /// Seed of the fold
    pub initial: Option<Expr>,
    /// Shape of the output, never empty
    pub output_shape: Vec<Expr>,
}

impl ReductionSpec {
    /// Resolve axes of reduction of tensor
    pub fn new(
        tensor: &Tensor,
        axes: impl IntoAxes,
        keep_dims: bool,
        initial: Option<Expr>,
    ) -> Result<ReductionSpec, KilnError> {
        let real_axes = real_axes(tensor.rank(), axes)?;
        let output_shape = output_shape(&real_axes, tensor.shape(), keep_dims);
        let squeeze_axes = if keep_dims {
            Axes::default()
        } else {
            real_axes.clone()
        };
        Ok(ReductionSpec {
            real_axes,
            squeeze_axes,
            initial,
            output_shape,
        })
    }

    fn check(&self, tensor: &Tensor) -> Result<(), KilnError> {
        let ndim = tensor.rank();
        if ndim == 0 {
            return Err(KilnError::invalid_axis(
                "reduction requires tensor with at least one dimension",
            ));
        }
        if self.real_axes.is_empty() || self.real_axes.iter().any(|a| *a >= ndim) {
            return Err(KilnError::invalid_axis(format!(
                "{} for tensor with {ndim} dimensions",
                self.real_axes
            )));
        }
        if self.squeeze_axes.iter().any(|a| !self.real_axes.contains(*a)) {
            return Err(KilnError::invalid_axis(format!(
                "squeeze axes {} are not reduced",
                self.squeeze_axes
            )));
        }
        let rank = (ndim - self.squeeze_axes.len()).max(1);
        if self.output_shape.len() != rank {
            return Err(KilnError::invalid_axis(format!(
                "output shape of rank {} does not match reduction to rank {rank}",
                self.output_shape.len()
            )));
        }
        if let Some(initial) = &self.initial {
            let dtype = initial.dtype()?;
            if dtype != tensor.dtype() {
                return Err(KilnError::type_mismatch(tensor.dtype(), dtype));
            }
        }
        Ok(())
    }
}

/// Reduce tensor along axes with fold.
///
/// Empty axes reduce everything, negative axes count from the back.
pub fn reduce(
    ctx: &Context,
    tensor: &Tensor,
    axes: impl IntoAxes,
    fold: &Fold,
    keep_dims: bool,
    name: &str,
) -> Result<Tensor, KilnError> {
    let spec = ReductionSpec::new(tensor, axes, keep_dims, fold.identity.clone())?;
    do_reduce(ctx, tensor, &spec, fold.op, name)
}

/// Build output tensor of resolved reduction.
///
/// Every real axis gets a fresh reduction variable over its extent. Source
/// indices are built by walking source dimensions, reduced ones take their
/// variable and consume an output index only if they are kept.
pub fn do_reduce(
    ctx: &Context,
    tensor: &Tensor,
    spec: &ReductionSpec,
    op: BOp,
    name: &str,
) -> Result<Tensor, KilnError> {
    spec.check(tensor)?;
    let reduce_axes: Vec<Var> = spec
        .real_axes
        .iter()
        .map(|&axis| ctx.var("kk", tensor.shape()[axis].clone()))
        .collect();
    if ctx.config().debug_reduce() {
        info!(
            "Reduce {op} of {} along {} into {name} with shape {:?}",
            tensor.name(),
            spec.real_axes,
            spec.output_shape.iter().map(ToString::to_string).collect::<Vec<_>>()
        );
    } else {
        debug!("Reduce {op} of {} along {} into {name}", tensor.name(), spec.real_axes);
    }
    Tensor::compute(ctx, spec.output_shape.clone(), name, |indices| {
        let mut source_indices = Vec::with_capacity(tensor.rank());
        let mut cursor = 0;
        for dim in 0..tensor.rank() {
            if let Some(r) = spec.real_axes.position(dim) {
                source_indices.push(Expr::from(&reduce_axes[r]));
                if !spec.squeeze_axes.contains(dim) {
                    cursor += 1;
                }
            } else {
                source_indices.push(indices[cursor].clone());
                cursor += 1;
            }
        }
        Expr::reduce(
            op,
            tensor.at(source_indices),
            reduce_axes.clone(),
            spec.initial.clone(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::dtype::DType;

    #[test]
    fn squeeze_walk() {
        let ctx = Context::new();
        let a = Tensor::placeholder("A", [2usize, 3, 4], DType::F32);
        let spec = ReductionSpec::new(&a, [1], false, None).unwrap();
        assert_eq!(&*spec.squeeze_axes, [1]);
        let b = do_reduce(&ctx, &a, &spec, BOp::Add, "B").unwrap();
        assert_eq!(b.rank(), 2);
        let shown = b.to_string();
        assert!(shown.contains("A[i_0, kk_0, i_1]"), "{shown}");
    }

    #[test]
    fn inconsistent_reduction_spec() {
        let ctx = Context::new();
        let a = Tensor::placeholder("A", [2usize, 3], DType::F32);
        let mut spec = ReductionSpec::new(&a, [0], true, None).unwrap();
        spec.output_shape.pop();
        assert!(matches!(
            do_reduce(&ctx, &a, &spec, BOp::Add, "B"),
            Err(KilnError::InvalidAxis(_))
        ));
    }
}
