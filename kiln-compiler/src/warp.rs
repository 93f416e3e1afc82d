//! Two stage reduction of trailing dimensions on a hardware warp.
//!
//! The staging tensor calls a device intrinsic once per retained index.
//! Its trailing axis of [`WARP_SIZE`] models the lanes taking part in the
//! call, only slot 0 holds the result, which the output tensor reads.

use kiln_core::{
    context::Context,
    error::KilnError,
    expr::{index_to_offset, BOp, Expr},
    interpreter::{Buffer, Intrinsics},
    scalar::Constant,
    tensor::Tensor,
};
use log::{debug, info};

/// Number of lanes in a warp
pub const WARP_SIZE: usize = 32;

/// Tensors of warp reduction
#[derive(Debug, Clone)]
pub struct WarpReduction {
    /// Leading dims plus trailing axis of [`WARP_SIZE`], holds intrinsic results
    pub staging: Tensor,
    /// Leading dims, slot 0 of staging
    pub output: Tensor,
}

impl WarpReduction {
    /// Staging first, then output
    #[must_use]
    pub fn into_tensors(self) -> [Tensor; 2] {
        [self.staging, self.output]
    }
}

/// Intrinsic implementing the warp reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarpOp {
    /// Maximum
    Max,
    /// Sum
    Sum,
    /// Average
    Avg,
}

impl WarpOp {
    /// Name of device intrinsic
    #[must_use]
    pub const fn intrinsic(self) -> &'static str {
        match self {
            WarpOp::Max => "warp_reduce_max",
            WarpOp::Sum => "warp_reduce_sum",
            WarpOp::Avg => "warp_reduce_avg",
        }
    }

    /// Op with given intrinsic name
    #[must_use]
    pub fn from_intrinsic(name: &str) -> Option<WarpOp> {
        [WarpOp::Max, WarpOp::Sum, WarpOp::Avg]
            .into_iter()
            .find(|op| op.intrinsic() == name)
    }
}

/// Reduce the last `last_reduce_dim_num` dimensions of tensor with
/// device intrinsic. Extents of reduced dimensions must be constants.
pub fn warp_reduce(
    ctx: &Context,
    tensor: &Tensor,
    last_reduce_dim_num: usize,
    intrinsic: &str,
    name: &str,
) -> Result<WarpReduction, KilnError> {
    let ndim = tensor.rank();
    if last_reduce_dim_num == 0 || last_reduce_dim_num > ndim {
        return Err(KilnError::invalid_axis(format!(
            "can not warp reduce last {last_reduce_dim_num} dimensions of tensor with {ndim} dimensions"
        )));
    }
    let keep = ndim - last_reduce_dim_num;
    let mut lane: i64 = 1;
    for dim in &tensor.shape()[keep..] {
        let extent = dim.as_int().ok_or_else(|| {
            KilnError::non_constant_extent(format!("{dim} of tensor {}", tensor.name()))
        })?;
        if extent <= 0 {
            return Err(KilnError::invalid_axis(format!(
                "extent {extent} of tensor {} can not be warp reduced",
                tensor.name()
            )));
        }
        lane = lane.checked_mul(extent).ok_or_else(|| {
            KilnError::invalid_axis(format!("lane count of tensor {} overflows", tensor.name()))
        })?;
    }
    let leading = &tensor.shape()[..keep];

    let staging_name = ctx.unique_name(&format!("{name}_{intrinsic}"));
    let output_name = ctx.unique_name(name);
    if ctx.config().debug_reduce() {
        info!(
            "Warp reduce {} with {intrinsic} over {lane} lanes into {staging_name}, {output_name}",
            tensor.name()
        );
    } else {
        debug!("Warp reduce {} with {intrinsic} over {lane} lanes", tensor.name());
    }

    let staging_shape = leading.iter().cloned().chain([Expr::from(WARP_SIZE)]);
    let staging = Tensor::try_compute(ctx, staging_shape, staging_name, |indices| {
        let source_indices: Vec<Expr> = indices[..keep]
            .iter()
            .cloned()
            .chain((0..last_reduce_dim_num).map(|_| Expr::int(0)))
            .collect();
        let offset = index_to_offset(tensor.shape(), &source_indices)?;
        Ok(Expr::call(
            intrinsic,
            vec![Expr::Tensor(tensor.clone()), offset, Expr::int(lane)],
            tensor.dtype(),
        ))
    })?;
    let output = Tensor::compute(ctx, leading.to_vec(), output_name, |indices| {
        staging.at(indices.iter().cloned().chain([Expr::int(0)]))
    })?;
    Ok(WarpReduction { staging, output })
}

/// Warp reduction with `warp_reduce_max`
pub fn warp_reduce_max(
    ctx: &Context,
    tensor: &Tensor,
    last_reduce_dim_num: usize,
    name: &str,
) -> Result<WarpReduction, KilnError> {
    warp_reduce(ctx, tensor, last_reduce_dim_num, WarpOp::Max.intrinsic(), name)
}

/// Warp reduction with `warp_reduce_sum`
pub fn warp_reduce_sum(
    ctx: &Context,
    tensor: &Tensor,
    last_reduce_dim_num: usize,
    name: &str,
) -> Result<WarpReduction, KilnError> {
    warp_reduce(ctx, tensor, last_reduce_dim_num, WarpOp::Sum.intrinsic(), name)
}

/// Warp reduction with `warp_reduce_avg`
pub fn warp_reduce_avg(
    ctx: &Context,
    tensor: &Tensor,
    last_reduce_dim_num: usize,
    name: &str,
) -> Result<WarpReduction, KilnError> {
    warp_reduce(ctx, tensor, last_reduce_dim_num, WarpOp::Avg.intrinsic(), name)
}

/// Host emulation of the warp intrinsics, folds `lane` consecutive
/// elements starting at offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostIntrinsics;

impl Intrinsics for HostIntrinsics {
    fn call(&self, name: &str, data: &Buffer, offset: usize, lane: usize) -> Result<Constant, KilnError> {
        let op = WarpOp::from_intrinsic(name)
            .ok_or_else(|| KilnError::eval_error(format!("unknown intrinsic {name}")))?;
        if lane == 0 {
            return Err(KilnError::eval_error(format!("{name} over zero lanes")));
        }
        let mut acc = data.get(offset)?;
        for i in offset + 1..offset + lane {
            let x = data.get(i)?;
            acc = acc.binary(x, if op == WarpOp::Max { BOp::Max } else { BOp::Add })?;
        }
        if op == WarpOp::Avg {
            #[allow(clippy::cast_precision_loss)]
            let n = Constant::from_f64(data.dtype(), lane as f64);
            acc = acc.binary(n, BOp::Div)?;
        }
        Ok(acc)
    }
}
