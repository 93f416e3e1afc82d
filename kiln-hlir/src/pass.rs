// Optimization pass infrastructure

use crate::computation::Computation;
use kiln_core::error::KilnError;

/// Semantics preserving rewrite of a computation.
///
/// Passes keep parameters and the value of the root for every input,
/// only the internal structure of the computation may change.
/// A pass holds no state between runs.
pub trait Pass {
    /// Name used in config and logs
    fn name(&self) -> &str;

    /// Run the pass on a computation.
    /// Returns true if the computation was modified.
    fn run(&self, computation: &mut Computation) -> Result<bool, KilnError>;
}
