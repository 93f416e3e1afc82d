// Common subexpression elimination
//
// Two instructions are equivalent if they have the same kind, operands and
// shape. Operands of commutative ops are compared in canonical order.
// Parameters are never merged.

use crate::{
    computation::Computation,
    instruction::{InstrId, InstrKind},
    pass::Pass,
};
use kiln_core::{error::KilnError, shape::Shape};
use std::collections::BTreeMap;

/// Common subexpression elimination pass
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonSubexpressionElimination;

fn canonical(kind: &InstrKind) -> InstrKind {
    match *kind {
        InstrKind::Binary { code, x, y } if code.bop().is_commutative() && y < x => {
            InstrKind::Binary { code, x: y, y: x }
        }
        _ => kind.clone(),
    }
}

impl Pass for CommonSubexpressionElimination {
    fn name(&self) -> &str {
        "cse"
    }

    fn run(&self, computation: &mut Computation) -> Result<bool, KilnError> {
        let mut seen: BTreeMap<(InstrKind, Shape), InstrId> = BTreeMap::new();
        let mut merged = vec![false; computation.len()];
        let mut changed = false;
        for i in 0..computation.len() {
            let id = InstrId(i);
            // Earlier merges already rewrote the operands of this instruction
            let Some(inst) = computation.instruction(id) else {
                continue;
            };
            if inst.is_parameter() {
                continue;
            }
            let key = (canonical(inst.kind()), inst.shape().clone());
            match seen.get(&key) {
                Some(&first) => {
                    changed |= computation.replace_uses(id, first)?;
                    if id != computation.root() {
                        merged[i] = true;
                        changed = true;
                    }
                }
                None => {
                    seen.insert(key, id);
                }
            }
        }
        computation.retain(|id, _| !merged[id.0])?;
        Ok(changed)
    }
}
