//! Tensors are named, immutable compute definitions.

use crate::{
    context::Context,
    dtype::DType,
    error::KilnError,
    expr::{Expr, Var},
};
use core::fmt::{Display, Formatter};
use std::rc::Rc;

/// What a tensor evaluates to
#[derive(Debug)]
pub enum TensorBody {
    /// External input bound before evaluation
    Placeholder,
    /// Element at index `axes` equals `body`
    Compute {
        /// One index variable per dimension
        axes: Vec<Var>,
        /// Element expression
        body: Expr,
    },
}

#[derive(Debug)]
struct TensorData {
    name: Rc<str>,
    shape: Vec<Expr>,
    dtype: DType,
    body: TensorBody,
}

/// Handle to immutable tensor. Cloning is cheap, all clones refer to the same tensor.
#[derive(Clone)]
pub struct Tensor(Rc<TensorData>);

impl Tensor {
    /// External input with given shape and dtype
    pub fn placeholder(
        name: impl Into<Rc<str>>,
        shape: impl IntoIterator<Item = impl Into<Expr>>,
        dtype: DType,
    ) -> Tensor {
        Tensor(Rc::new(TensorData {
            name: name.into(),
            shape: shape.into_iter().map(Into::into).collect(),
            dtype,
            body: TensorBody::Placeholder,
        }))
    }

    /// Tensor whose element at every index of shape is `f(indices)`.
    ///
    /// Index variables are allocated from ctx, dtype is inferred from the body.
    pub fn compute(
        ctx: &Context,
        shape: impl IntoIterator<Item = impl Into<Expr>>,
        name: impl Into<Rc<str>>,
        f: impl FnOnce(&[Expr]) -> Expr,
    ) -> Result<Tensor, KilnError> {
        Tensor::try_compute(ctx, shape, name, |indices| Ok(f(indices)))
    }

    /// Like [`Tensor::compute`], for bodies whose construction can fail
    pub fn try_compute(
        ctx: &Context,
        shape: impl IntoIterator<Item = impl Into<Expr>>,
        name: impl Into<Rc<str>>,
        f: impl FnOnce(&[Expr]) -> Result<Expr, KilnError>,
    ) -> Result<Tensor, KilnError> {
        let shape: Vec<Expr> = shape.into_iter().map(Into::into).collect();
        for dim in &shape {
            let d = dim.dtype()?;
            if !d.is_integer() {
                return Err(KilnError::type_mismatch(DType::I64, d));
            }
        }
        let axes: Vec<Var> = shape.iter().map(|dim| ctx.var("i", dim.clone())).collect();
        let indices: Vec<Expr> = axes.iter().map(Expr::from).collect();
        let body = f(&indices)?;
        let dtype = body.dtype()?;
        Ok(Tensor(Rc::new(TensorData {
            name: name.into(),
            shape,
            dtype,
            body: TensorBody::Compute { axes, body },
        })))
    }

    /// Name of tensor
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Shape of tensor
    #[must_use]
    pub fn shape(&self) -> &[Expr] {
        &self.0.shape
    }

    /// Number of dimensions
    #[must_use]
    pub fn rank(&self) -> usize {
        self.0.shape.len()
    }

    /// Element type
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.0.dtype
    }

    /// Body of tensor
    #[must_use]
    pub fn body(&self) -> &TensorBody {
        &self.0.body
    }

    /// Is this tensor an external input?
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self.0.body, TensorBody::Placeholder)
    }

    /// Element at indices
    #[must_use]
    pub fn at(&self, indices: impl IntoIterator<Item = impl Into<Expr>>) -> Expr {
        Expr::Load {
            tensor: self.clone(),
            indices: indices.into_iter().map(Into::into).collect(),
        }
    }

    /// Identity of this tensor, shared by all clones of the handle
    #[must_use]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Tensors read directly by this tensor's body, without duplicates
    #[must_use]
    pub fn inputs(&self) -> Vec<Tensor> {
        let mut inputs: Vec<Tensor> = Vec::new();
        if let TensorBody::Compute { axes, body } = &self.0.body {
            let mut push = |t: &Tensor| {
                if !inputs.iter().any(|x| x.id() == t.id()) {
                    inputs.push(t.clone());
                }
            };
            for axis in axes {
                axis.extent().visit_tensors(&mut push);
            }
            body.visit_tensors(&mut push);
        }
        inputs
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl core::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("Tensor({}, {:?})", self.0.name, self.0.dtype))
    }
}

impl Display for Tensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{}: {}[", self.0.name, self.0.dtype))?;
        for (i, dim) in self.0.shape.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            dim.fmt(f)?;
        }
        f.write_str("]")?;
        match &self.0.body {
            TensorBody::Placeholder => f.write_str(" = placeholder"),
            TensorBody::Compute { axes, body } => {
                f.write_str(" = compute(")?;
                for (i, axis) in axes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    axis.fmt(f)?;
                }
                f.write_fmt(format_args!(") {{ {body} }}"))
            }
        }
    }
}
