//! Computations and their builder.
//!
//! Instructions may only reference instructions added before them, so every
//! computation is acyclic and in topological order by construction.

use crate::instruction::{InstrCode, InstrId, InstrKind, Instruction};
use kiln_core::{context::Context, dtype::DType, error::KilnError};
use log::{debug, info};
use core::fmt::{Display, Formatter};

/// Check instruction against instructions preceding it and infer its dtype
fn resolve(preceding: &[Instruction], inst: &mut Instruction) -> Result<(), KilnError> {
    match inst.kind() {
        InstrKind::Parameter { index, .. } => {
            if preceding
                .iter()
                .any(|i| matches!(i.kind(), InstrKind::Parameter { index: j, .. } if j == index))
            {
                return Err(KilnError::invalid_operand(format!(
                    "parameter {index} is already defined"
                )));
            }
        }
        InstrKind::Constant(_) => {}
        InstrKind::Binary { code, x, y } => {
            let get = |id: InstrId| {
                preceding.get(id.0).ok_or_else(|| {
                    KilnError::invalid_operand(format!(
                        "{code} references {id} but only {} instructions exist",
                        preceding.len()
                    ))
                })
            };
            let (xi, yi) = (get(*x)?, get(*y)?);
            if xi.shape() != yi.shape() || xi.shape() != inst.shape() {
                return Err(KilnError::invalid_operand(format!(
                    "{code} of shapes {} and {} can not produce shape {}",
                    xi.shape(),
                    yi.shape(),
                    inst.shape()
                )));
            }
            let (Some(xd), Some(yd)) = (xi.dtype(), yi.dtype()) else {
                return Err(KilnError::invalid_operand(format!("operands of {code} have no dtype")));
            };
            if xd != yd {
                return Err(KilnError::type_mismatch(xd, yd));
            }
            if xd == DType::Bool && !matches!(code, InstrCode::Max | InstrCode::Min) {
                return Err(KilnError::invalid_operand(format!("{code} is not defined for bool")));
            }
            inst.set_dtype(xd);
        }
    }
    Ok(())
}

/// Frozen single assignment sequence of instructions with a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Computation {
    name: Box<str>,
    instructions: Vec<Instruction>,
    root: InstrId,
}

impl Computation {
    /// Name of computation
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instructions in order of creation
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Instruction with id
    #[must_use]
    pub fn instruction(&self, id: InstrId) -> Option<&Instruction> {
        self.instructions.get(id.0)
    }

    /// Instruction whose value is the result of computation
    #[must_use]
    pub const fn root(&self) -> InstrId {
        self.root
    }

    /// Number of instructions
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Computations are never empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Ids of parameters, ordered by parameter index
    #[must_use]
    pub fn parameters(&self) -> Vec<InstrId> {
        let mut params: Vec<(usize, InstrId)> = self
            .instructions
            .iter()
            .enumerate()
            .filter_map(|(id, inst)| match inst.kind() {
                InstrKind::Parameter { index, .. } => Some((*index, InstrId(id))),
                _ => None,
            })
            .collect();
        params.sort_unstable();
        params.into_iter().map(|(_, id)| id).collect()
    }

    /// Replace instruction with another of the same shape and dtype.
    /// Operands of the new instruction must precede it.
    pub fn replace(&mut self, id: InstrId, mut inst: Instruction) -> Result<(), KilnError> {
        let old = self.instruction(id).ok_or_else(|| {
            KilnError::invalid_operand(format!("{id} does not exist in {}", self.name))
        })?;
        if old.is_parameter() || inst.is_parameter() {
            return Err(KilnError::invalid_operand(format!(
                "parameter {id} of {} can not be replaced",
                self.name
            )));
        }
        resolve(&self.instructions[..id.0], &mut inst)?;
        if inst.shape() != old.shape() || inst.dtype() != old.dtype() {
            return Err(KilnError::invalid_operand(format!(
                "replacement of {id} changes its type from {old} to {inst}"
            )));
        }
        self.instructions[id.0] = inst;
        Ok(())
    }

    /// Make every instruction using `from` use `to` instead.
    ///
    /// `to` must precede `from` and have the same shape and dtype.
    /// The root is left as it is. Returns whether anything changed.
    pub fn replace_uses(&mut self, from: InstrId, to: InstrId) -> Result<bool, KilnError> {
        let (Some(f), Some(t)) = (self.instruction(from), self.instruction(to)) else {
            return Err(KilnError::invalid_operand(format!(
                "{from} or {to} does not exist in {}",
                self.name
            )));
        };
        if to >= from || f.shape() != t.shape() || f.dtype() != t.dtype() {
            return Err(KilnError::invalid_operand(format!(
                "uses of {from} can not be replaced by {to}"
            )));
        }
        let mut changed = false;
        for inst in &mut self.instructions[from.0 + 1..] {
            inst.remap_operands(|id| {
                if id == from {
                    changed = true;
                    to
                } else {
                    id
                }
            });
        }
        Ok(changed)
    }

    /// Remove all instructions for which keep returns false and renumber the rest.
    ///
    /// Parameters, the root and instructions still in use can not be removed.
    /// Returns number of removed instructions.
    pub fn retain(&mut self, mut keep: impl FnMut(InstrId, &Instruction) -> bool) -> Result<usize, KilnError> {
        let mask: Vec<bool> = self
            .instructions
            .iter()
            .enumerate()
            .map(|(id, inst)| keep(InstrId(id), inst))
            .collect();
        for (id, inst) in self.instructions.iter().enumerate() {
            if !mask[id] && (inst.is_parameter() || InstrId(id) == self.root) {
                return Err(KilnError::invalid_operand(format!(
                    "{} of {} can not be removed",
                    InstrId(id),
                    self.name
                )));
            }
            if mask[id] {
                if let Some(op) = inst.operands().find(|op| !mask[op.0]) {
                    return Err(KilnError::invalid_operand(format!(
                        "{op} is used by {} and can not be removed",
                        InstrId(id)
                    )));
                }
            }
        }
        let mut new_ids = Vec::with_capacity(mask.len());
        let mut next = 0;
        for &kept in &mask {
            new_ids.push(InstrId(next));
            next += usize::from(kept);
        }
        let removed = mask.len() - next;
        let old = core::mem::take(&mut self.instructions);
        self.instructions = old
            .into_iter()
            .zip(&mask)
            .filter(|(_, kept)| **kept)
            .map(|(mut inst, _)| {
                inst.remap_operands(|id| new_ids[id.0]);
                inst
            })
            .collect();
        self.root = new_ids[self.root.0];
        Ok(removed)
    }
}

impl Display for Computation {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("computation {} {{\n", self.name))?;
        for (id, inst) in self.instructions.iter().enumerate() {
            let root = if InstrId(id) == self.root { "ROOT " } else { "" };
            f.write_fmt(format_args!("  {root}{} = {inst}\n", InstrId(id)))?;
        }
        f.write_str("}")
    }
}

/// Appends instructions to a computation under construction
pub struct Builder<'a> {
    ctx: &'a Context,
    name: Box<str>,
    instructions: Vec<Instruction>,
    root: Option<InstrId>,
    frozen: bool,
}

impl<'a> Builder<'a> {
    /// Builder of computation with name
    #[must_use]
    pub fn new(ctx: &'a Context, name: &str) -> Builder<'a> {
        Builder {
            ctx,
            name: name.into(),
            instructions: Vec::new(),
            root: None,
            frozen: false,
        }
    }

    fn check_not_frozen(&self) -> Result<(), KilnError> {
        if self.frozen {
            return Err(KilnError::invalid_operand(format!(
                "computation {} was already built",
                self.name
            )));
        }
        Ok(())
    }

    /// Append instruction, returns handle usable as operand of later instructions.
    /// Parameters without name get a unique one.
    pub fn add_instruction(&mut self, mut inst: Instruction) -> Result<InstrId, KilnError> {
        self.check_not_frozen()?;
        if let InstrKind::Parameter { index, name, config } = inst.kind() {
            if name.is_empty() {
                let name = self.ctx.unique_name("param");
                inst = Instruction::parameter(*index, inst.shape().clone(), &name, *config);
            }
        }
        resolve(&self.instructions, &mut inst)?;
        let id = InstrId(self.instructions.len());
        self.instructions.push(inst);
        Ok(id)
    }

    /// Choose root, by default the last added instruction is the root
    pub fn set_root(&mut self, id: InstrId) -> Result<(), KilnError> {
        self.check_not_frozen()?;
        if id.0 >= self.instructions.len() {
            return Err(KilnError::invalid_operand(format!(
                "root {id} does not exist in {}",
                self.name
            )));
        }
        self.root = Some(id);
        Ok(())
    }

    /// Freeze instructions into computation. The builder can not be used afterwards.
    pub fn build(&mut self) -> Result<Computation, KilnError> {
        self.check_not_frozen()?;
        if self.instructions.is_empty() {
            return Err(KilnError::invalid_operand(format!(
                "computation {} has no instructions",
                self.name
            )));
        }
        self.frozen = true;
        let root = self.root.unwrap_or(InstrId(self.instructions.len() - 1));
        let computation = Computation {
            name: self.name.clone(),
            instructions: core::mem::take(&mut self.instructions),
            root,
        };
        if self.ctx.config().debug_ir() {
            info!("Built {computation}");
        } else {
            debug!(
                "Built computation {} with {} instructions",
                computation.name,
                computation.len()
            );
        }
        Ok(computation)
    }
}
