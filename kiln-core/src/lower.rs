//! Hand-off of finished tensors to a lowering backend.

use crate::{error::KilnError, tensor::Tensor};
use alloc::collections::BTreeSet;
use core::fmt::Write;

/// Backend turning a complete list of tensors into backend IR
pub trait LoweringBackend {
    /// Lowered function
    type Output;
    /// Lower function `name`. Tensors are ordered so that every tensor comes
    /// after all tensors it reads, each tensor is listed once.
    fn lower(&mut self, name: &str, tensors: &[Tensor]) -> Result<Self::Output, KilnError>;
}

/// All tensors outputs depend on, including outputs, dependencies first
#[must_use]
pub fn collect_tensors(outputs: &[Tensor]) -> Vec<Tensor> {
    let mut visited = BTreeSet::new();
    let mut order = Vec::new();
    // (tensor, inputs already pushed)
    let mut stack: Vec<(Tensor, bool)> = outputs.iter().rev().map(|t| (t.clone(), false)).collect();
    while let Some((tensor, expanded)) = stack.pop() {
        if expanded {
            if visited.insert(tensor.id()) {
                order.push(tensor);
            }
            continue;
        }
        if visited.contains(&tensor.id()) {
            continue;
        }
        let inputs = tensor.inputs();
        stack.push((tensor, true));
        for input in inputs.into_iter().rev() {
            if !visited.contains(&input.id()) {
                stack.push((input, false));
            }
        }
    }
    order
}

/// Complete outputs with their dependencies and lower them with backend
pub fn lower<B: LoweringBackend>(
    backend: &mut B,
    name: &str,
    outputs: &[Tensor],
) -> Result<B::Output, KilnError> {
    let tensors = collect_tensors(outputs);
    log::debug!("Lowering {name} with {} tensors", tensors.len());
    backend.lower(name, &tensors)
}

/// Renders tensors as readable pseudo code
#[derive(Debug, Default)]
pub struct PseudoCode;

impl LoweringBackend for PseudoCode {
    type Output = String;

    fn lower(&mut self, name: &str, tensors: &[Tensor]) -> Result<String, KilnError> {
        let mut code = String::new();
        // Writing into a String never fails
        let _ = writeln!(code, "fn {name} {{");
        for tensor in tensors {
            let _ = writeln!(code, "  {tensor}");
        }
        code.push('}');
        Ok(code)
    }
}
