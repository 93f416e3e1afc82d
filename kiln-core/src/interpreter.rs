//! Reference interpreter for tensors.
//!
//! Evaluates compute definitions element by element over bound placeholder
//! buffers. It is slow and exists to check numerics of compiled tensors.

use crate::{
    dtype::DType,
    error::KilnError,
    expr::Expr,
    scalar::{Constant, Scalar},
    tensor::{Tensor, TensorBody},
};
use alloc::collections::BTreeMap;
use log::trace;
use std::rc::Rc;

/// Device intrinsics callable from [`Expr::Call`].
///
/// Every intrinsic receives the whole argument tensor, a flat offset into it
/// and a lane count.
pub trait Intrinsics {
    /// Call intrinsic with name
    fn call(&self, name: &str, data: &Buffer, offset: usize, lane: usize) -> Result<Constant, KilnError>;
}

/// No intrinsics are available, every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIntrinsics;

impl Intrinsics for NoIntrinsics {
    fn call(&self, name: &str, _: &Buffer, _: usize, _: usize) -> Result<Constant, KilnError> {
        Err(KilnError::eval_error(format!("unknown intrinsic {name}")))
    }
}

static NO_INTRINSICS: NoIntrinsics = NoIntrinsics;

/// Row major buffer of constants
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<Constant>,
}

impl Buffer {
    /// New buffer, data must have numel of shape elements of dtype
    pub fn new(dtype: DType, shape: Vec<usize>, data: Vec<Constant>) -> Result<Buffer, KilnError> {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(KilnError::eval_error(format!(
                "buffer with shape {shape:?} needs {numel} elements, got {}",
                data.len()
            )));
        }
        if let Some(c) = data.iter().find(|c| c.dtype() != dtype) {
            return Err(KilnError::type_mismatch(dtype, c.dtype()));
        }
        Ok(Buffer { dtype, shape, data })
    }

    /// Buffer from rust scalars
    pub fn from_scalars<T: Scalar>(shape: Vec<usize>, data: Vec<T>) -> Result<Buffer, KilnError> {
        Buffer::new(T::dtype(), shape, data.into_iter().map(Scalar::into_constant).collect())
    }

    /// Buffer filled with value
    #[must_use]
    pub fn full(shape: Vec<usize>, value: Constant) -> Buffer {
        let numel = shape.iter().product();
        Buffer {
            dtype: value.dtype(),
            shape,
            data: vec![value; numel],
        }
    }

    /// Element type
    #[must_use]
    pub const fn dtype(&self) -> DType {
        self.dtype
    }

    /// Shape
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Elements in row major order
    #[must_use]
    pub fn data(&self) -> &[Constant] {
        &self.data
    }

    /// Element at flat offset
    pub fn get(&self, offset: usize) -> Result<Constant, KilnError> {
        self.data.get(offset).copied().ok_or(KilnError::IndexOutOfBounds {
            index: offset,
            len: self.data.len(),
        })
    }

    /// Element at index
    pub fn at(&self, index: &[usize]) -> Result<Constant, KilnError> {
        if index.len() != self.shape.len() {
            return Err(KilnError::invalid_axis(format!(
                "index of rank {} into buffer of rank {}",
                index.len(),
                self.shape.len()
            )));
        }
        let mut offset = 0;
        for (&i, &d) in index.iter().zip(&self.shape) {
            if i >= d {
                return Err(KilnError::IndexOutOfBounds { index: i, len: d });
            }
            offset = offset * d + i;
        }
        self.get(offset)
    }

    /// Lossy conversion of all elements to f64
    #[must_use]
    pub fn to_f64(&self) -> Vec<f64> {
        self.data.iter().map(Constant::to_f64).collect()
    }
}

/// Calls f with every index of the box given by extents, last index fastest
fn for_each_index(
    extents: &[usize],
    mut f: impl FnMut(&[usize]) -> Result<(), KilnError>,
) -> Result<(), KilnError> {
    if extents.contains(&0) {
        return Ok(());
    }
    let mut index = vec![0; extents.len()];
    loop {
        f(&index)?;
        let mut i = extents.len();
        loop {
            if i == 0 {
                return Ok(());
            }
            i -= 1;
            index[i] += 1;
            if index[i] < extents[i] {
                break;
            }
            index[i] = 0;
        }
    }
}

fn to_usize(x: i64) -> Result<usize, KilnError> {
    usize::try_from(x).map_err(|_| KilnError::eval_error(format!("negative extent {x}")))
}

/// Reference interpreter
pub struct Interpreter<'a> {
    intrinsics: &'a dyn Intrinsics,
    // Keyed by tensor id, the tensor is stored to keep the id alive
    placeholders: BTreeMap<usize, (Tensor, Rc<Buffer>)>,
    computed: BTreeMap<usize, (Tensor, Rc<Buffer>)>,
    vars: BTreeMap<Rc<str>, i64>,
}

impl Interpreter<'static> {
    /// Interpreter without intrinsics
    #[must_use]
    pub fn new() -> Interpreter<'static> {
        Interpreter::with_intrinsics(&NO_INTRINSICS)
    }
}

impl Default for Interpreter<'static> {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl<'a> Interpreter<'a> {
    /// Interpreter dispatching [`Expr::Call`] to intrinsics
    #[must_use]
    pub fn with_intrinsics(intrinsics: &'a dyn Intrinsics) -> Interpreter<'a> {
        Interpreter {
            intrinsics,
            placeholders: BTreeMap::new(),
            computed: BTreeMap::new(),
            vars: BTreeMap::new(),
        }
    }

    /// Bind value of symbolic variable used in shapes
    pub fn bind_var(&mut self, name: &str, value: i64) {
        self.vars.insert(name.into(), value);
        self.computed.clear();
    }

    /// Bind buffer to placeholder
    pub fn bind(&mut self, tensor: &Tensor, buffer: Buffer) -> Result<(), KilnError> {
        if !tensor.is_placeholder() {
            return Err(KilnError::eval_error(format!(
                "{} is not a placeholder",
                tensor.name()
            )));
        }
        if tensor.dtype() != buffer.dtype() {
            return Err(KilnError::type_mismatch(tensor.dtype(), buffer.dtype()));
        }
        let shape = self.shape(tensor)?;
        if shape != buffer.shape() {
            return Err(KilnError::eval_error(format!(
                "placeholder {} has shape {shape:?}, buffer has shape {:?}",
                tensor.name(),
                buffer.shape()
            )));
        }
        self.placeholders
            .insert(tensor.id(), (tensor.clone(), Rc::new(buffer)));
        self.computed.clear();
        Ok(())
    }

    /// Evaluate all elements of tensor
    pub fn evaluate(&mut self, tensor: &Tensor) -> Result<Buffer, KilnError> {
        Ok(self.materialize(tensor)?.as_ref().clone())
    }

    /// Concrete shape of tensor under bound variables
    pub fn shape(&mut self, tensor: &Tensor) -> Result<Vec<usize>, KilnError> {
        let mut env = Vec::new();
        tensor
            .shape()
            .iter()
            .map(|dim| self.eval_int(dim, &mut env).and_then(to_usize))
            .collect()
    }

    fn materialize(&mut self, tensor: &Tensor) -> Result<Rc<Buffer>, KilnError> {
        if let Some((_, buffer)) = self.placeholders.get(&tensor.id()) {
            return Ok(buffer.clone());
        }
        if let Some((_, buffer)) = self.computed.get(&tensor.id()) {
            return Ok(buffer.clone());
        }
        let TensorBody::Compute { axes, body } = tensor.body() else {
            return Err(KilnError::eval_error(format!(
                "placeholder {} is not bound",
                tensor.name()
            )));
        };
        let shape = self.shape(tensor)?;
        trace!("Evaluating {} with shape {shape:?}", tensor.name());
        let mut data = Vec::with_capacity(shape.iter().product());
        let mut env: Vec<(Rc<str>, i64)> = axes.iter().map(|a| (a.name_rc().clone(), 0)).collect();
        for_each_index(&shape, |index| {
            for (slot, &i) in env.iter_mut().zip(index) {
                slot.1 = i64::try_from(i).unwrap_or(i64::MAX);
            }
            data.push(self.eval(body, &mut env)?);
            Ok(())
        })?;
        let buffer = Rc::new(Buffer::new(tensor.dtype(), shape, data)?);
        self.computed
            .insert(tensor.id(), (tensor.clone(), buffer.clone()));
        Ok(buffer)
    }

    fn eval_int(&mut self, expr: &Expr, env: &mut Vec<(Rc<str>, i64)>) -> Result<i64, KilnError> {
        let c = self.eval(expr, env)?;
        c.as_i64()
            .ok_or_else(|| KilnError::type_mismatch(DType::I64, c.dtype()))
    }

    fn eval(&mut self, expr: &Expr, env: &mut Vec<(Rc<str>, i64)>) -> Result<Constant, KilnError> {
        Ok(match expr {
            Expr::Const(c) => *c,
            Expr::Var(var) => {
                let value = env
                    .iter()
                    .rev()
                    .find(|(name, _)| **name == *var.name())
                    .map(|(_, value)| *value)
                    .or_else(|| self.vars.get(var.name()).copied())
                    .ok_or_else(|| {
                        KilnError::eval_error(format!("variable {} is not bound", var.name()))
                    })?;
                Constant::I64(value)
            }
            Expr::Binary { op, x, y } => {
                let x = self.eval(x, env)?;
                let y = self.eval(y, env)?;
                x.binary(y, *op)?
            }
            Expr::Select {
                cond,
                then,
                otherwise,
            } => match self.eval(cond, env)? {
                Constant::Bool(true) => self.eval(then, env)?,
                Constant::Bool(false) => self.eval(otherwise, env)?,
                c => return Err(KilnError::type_mismatch(DType::Bool, c.dtype())),
            },
            Expr::Load { tensor, indices } => {
                let buffer = self.materialize(tensor)?;
                let mut index = Vec::with_capacity(indices.len());
                for (i, &d) in indices.iter().zip(buffer.shape()) {
                    let i = self.eval_int(i, env)?;
                    // Negative indices are reported as out of bounds too
                    let i = usize::try_from(i).unwrap_or(usize::MAX);
                    if i >= d {
                        return Err(KilnError::IndexOutOfBounds { index: i, len: d });
                    }
                    index.push(i);
                }
                buffer.at(&index)?
            }
            Expr::Reduce {
                op,
                body,
                axes,
                init,
            } => {
                let mut acc = match init {
                    Some(init) => Some(self.eval(init, env)?),
                    None => None,
                };
                let mut extents = Vec::with_capacity(axes.len());
                for axis in axes {
                    extents.push(to_usize(self.eval_int(axis.extent(), env)?)?);
                }
                let base = env.len();
                env.extend(axes.iter().map(|a| (a.name_rc().clone(), 0)));
                let res = for_each_index(&extents, |index| {
                    for (slot, &i) in env[base..].iter_mut().zip(index) {
                        slot.1 = i64::try_from(i).unwrap_or(i64::MAX);
                    }
                    let x = self.eval(body, env)?;
                    acc = Some(match acc {
                        Some(acc) => acc.binary(x, *op)?,
                        None => x,
                    });
                    Ok(())
                });
                env.truncate(base);
                res?;
                acc.ok_or_else(|| {
                    KilnError::eval_error("reduction over empty domain without initial value")
                })?
            }
            Expr::Call { name, args, dtype } => {
                let [Expr::Tensor(tensor), offset, lane] = args.as_slice() else {
                    return Err(KilnError::eval_error(format!(
                        "intrinsic {name} expects (tensor, offset, lane) arguments"
                    )));
                };
                let data = self.materialize(tensor)?;
                let offset = to_usize(self.eval_int(offset, env)?)?;
                let lane = to_usize(self.eval_int(lane, env)?)?;
                let res = self.intrinsics.call(name, &data, offset, lane)?;
                if res.dtype() != *dtype {
                    return Err(KilnError::type_mismatch(*dtype, res.dtype()));
                }
                res
            }
            Expr::Tensor(tensor) => {
                return Err(KilnError::eval_error(format!(
                    "tensor {} can only be passed to an intrinsic",
                    tensor.name()
                )))
            }
        })
    }
}
