//! Passes shipped with kiln

mod cse;
mod dce;
mod simplify;

pub use cse::CommonSubexpressionElimination;
pub use dce::DeadCodeElimination;
pub use simplify::AlgebraicSimplify;

use crate::pass::Pass;

/// Pass with name as used in config, None if there is no such pass
#[must_use]
pub fn pass_by_name(name: &str) -> Option<Box<dyn Pass>> {
    match name {
        "simplify" => Some(Box::new(AlgebraicSimplify)),
        "cse" => Some(Box::new(CommonSubexpressionElimination)),
        "dce" => Some(Box::new(DeadCodeElimination)),
        _ => None,
    }
}
