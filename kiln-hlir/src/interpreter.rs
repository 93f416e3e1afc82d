// Reference evaluation of computations on host buffers

use crate::{
    computation::Computation,
    instruction::{InstrId, InstrKind},
};
use kiln_core::{error::KilnError, interpreter::Buffer};

/// Evaluate computation with params ordered by parameter index,
/// returns value of the root.
pub fn evaluate(computation: &Computation, params: &[Buffer]) -> Result<Buffer, KilnError> {
    let parameters = computation.parameters();
    if parameters.len() != params.len() {
        return Err(KilnError::eval_error(format!(
            "{} takes {} parameters, {} were passed",
            computation.name(),
            parameters.len(),
            params.len()
        )));
    }
    let mut values: Vec<Option<Buffer>> = vec![None; computation.len()];
    for (id, buffer) in parameters.into_iter().zip(params) {
        let Some(inst) = computation.instruction(id) else {
            continue;
        };
        if Some(buffer.dtype()) != inst.dtype() {
            return Err(KilnError::type_mismatch(
                inst.dtype().unwrap_or(buffer.dtype()),
                buffer.dtype(),
            ));
        }
        if buffer.shape() != inst.shape().as_slice() {
            return Err(KilnError::eval_error(format!(
                "parameter {id} has shape {} but buffer has shape {:?}",
                inst.shape(),
                buffer.shape()
            )));
        }
        values[id.0] = Some(buffer.clone());
    }
    for (i, inst) in computation.instructions().iter().enumerate() {
        let value = match inst.kind() {
            InstrKind::Parameter { .. } => continue,
            InstrKind::Constant(c) => Buffer::full(inst.shape().as_slice().to_vec(), *c),
            InstrKind::Binary { code, x, y } => {
                let get = |id: InstrId| {
                    values
                        .get(id.0)
                        .and_then(Option::as_ref)
                        .ok_or_else(|| KilnError::eval_error(format!("{id} has no value")))
                };
                let (x, y) = (get(*x)?, get(*y)?);
                let data = x
                    .data()
                    .iter()
                    .zip(y.data())
                    .map(|(a, b)| a.binary(*b, code.bop()))
                    .collect::<Result<Vec<_>, KilnError>>()?;
                Buffer::new(x.dtype(), x.shape().to_vec(), data)?
            }
        };
        values[i] = Some(value);
    }
    values
        .swap_remove(computation.root().0)
        .ok_or_else(|| KilnError::eval_error(format!("root of {} has no value", computation.name())))
}
