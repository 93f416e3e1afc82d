// Dead code elimination
//
// Removes instructions the root does not depend on. Parameters are kept
// even when unused, they are part of the computation's signature.

use crate::{computation::Computation, pass::Pass};
use kiln_core::error::KilnError;

/// Dead code elimination pass
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadCodeElimination;

impl Pass for DeadCodeElimination {
    fn name(&self) -> &str {
        "dce"
    }

    fn run(&self, computation: &mut Computation) -> Result<bool, KilnError> {
        let mut live = vec![false; computation.len()];
        live[computation.root().0] = true;
        // Operands precede their users, so one backward sweep finds all live instructions
        for (id, inst) in computation.instructions().iter().enumerate().rev() {
            if inst.is_parameter() {
                live[id] = true;
            }
            if live[id] {
                for op in inst.operands() {
                    live[op.0] = true;
                }
            }
        }
        let removed = computation.retain(|id, _| live[id.0])?;
        if removed > 0 {
            log::trace!("Removed {removed} dead instructions from {}", computation.name());
        }
        Ok(removed > 0)
    }
}
