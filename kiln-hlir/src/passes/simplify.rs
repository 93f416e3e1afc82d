// Algebraic simplification
//
// Folds binaries of two splat constants and removes identities
// x + 0, 0 + x, x - 0, x * 1, 1 * x, x / 1, max(x, x), min(x, x).
// For floats the additive zero must be -0.0, subtracted zero +0.0.

use crate::{
    computation::Computation,
    instruction::{InstrCode, InstrId, InstrKind, Instruction},
    pass::Pass,
};
use kiln_core::{dtype::DType, error::KilnError, scalar::Constant};

/// Algebraic simplification pass
#[derive(Debug, Clone, Copy, Default)]
pub struct AlgebraicSimplify;

enum Rewrite {
    Fold(Instruction),
    Forward(InstrId),
}

fn rewrite(computation: &Computation, id: InstrId) -> Option<Rewrite> {
    let inst = computation.instruction(id)?;
    let InstrKind::Binary { code, x, y } = *inst.kind() else {
        return None;
    };
    let constant = |op: InstrId| computation.instruction(op).and_then(|i| i.as_constant());
    let (cx, cy) = (constant(x), constant(y));
    if let (Some(cx), Some(cy)) = (cx, cy) {
        // Errors like integer division by zero are left for runtime
        return cx
            .binary(cy, code.bop())
            .ok()
            .map(|c| Rewrite::Fold(Instruction::constant(inst.shape().clone(), c)));
    }
    let dtype = inst.dtype()?;
    if dtype == DType::Bool {
        return None;
    }
    // x + 0 is not x for x = -0.0, only x + -0.0 and x - 0.0 keep every float
    let additive = |c: Option<Constant>, sign_negative: bool| {
        c.is_some_and(|c| {
            c.is_zero() && (!dtype.is_floating() || c.to_f64().is_sign_negative() == sign_negative)
        })
    };
    let is_one = |c: Option<Constant>| c.is_some_and(|c| c.is_one());
    match code {
        InstrCode::Add if additive(cy, true) => Some(Rewrite::Forward(x)),
        InstrCode::Add if additive(cx, true) => Some(Rewrite::Forward(y)),
        InstrCode::Sub if additive(cy, false) => Some(Rewrite::Forward(x)),
        InstrCode::Mul | InstrCode::Div if is_one(cy) => Some(Rewrite::Forward(x)),
        InstrCode::Mul if is_one(cx) => Some(Rewrite::Forward(y)),
        InstrCode::Max | InstrCode::Min if x == y => Some(Rewrite::Forward(x)),
        _ => None,
    }
}

impl Pass for AlgebraicSimplify {
    fn name(&self) -> &str {
        "simplify"
    }

    fn run(&self, computation: &mut Computation) -> Result<bool, KilnError> {
        let mut forwarded = vec![false; computation.len()];
        let mut changed = false;
        for i in 0..computation.len() {
            let id = InstrId(i);
            match rewrite(computation, id) {
                Some(Rewrite::Fold(inst)) => {
                    computation.replace(id, inst)?;
                    changed = true;
                }
                // The root keeps its position, so it is not forwarded
                Some(Rewrite::Forward(to)) if id != computation.root() => {
                    computation.replace_uses(id, to)?;
                    forwarded[i] = true;
                    changed = true;
                }
                _ => {}
            }
        }
        computation.retain(|id, _| !forwarded[id.0])?;
        Ok(changed)
    }
}
