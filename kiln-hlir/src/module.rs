use crate::computation::Computation;
use kiln_core::error::KilnError;
use std::collections::BTreeMap;

/// Named collection of computations with unique names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    name: Box<str>,
    computations: BTreeMap<Box<str>, Computation>,
}

impl Module {
    /// Empty module
    #[must_use]
    pub fn new(name: &str) -> Module {
        Module {
            name: name.into(),
            computations: BTreeMap::new(),
        }
    }

    /// Name of module
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add computation, fails if computation with the same name exists
    pub fn add_computation(&mut self, computation: Computation) -> Result<(), KilnError> {
        if self.computations.contains_key(computation.name()) {
            return Err(KilnError::DuplicateComputationName(computation.name().into()));
        }
        self.computations
            .insert(computation.name().into(), computation);
        Ok(())
    }

    /// Computation with name
    #[must_use]
    pub fn computation(&self, name: &str) -> Option<&Computation> {
        self.computations.get(name)
    }

    /// Computations ordered by name
    pub fn computations(&self) -> impl Iterator<Item = &Computation> {
        self.computations.values()
    }

    /// Mutable computations ordered by name
    pub fn computations_mut(&mut self) -> impl Iterator<Item = &mut Computation> {
        self.computations.values_mut()
    }

    /// Number of computations
    #[must_use]
    pub fn len(&self) -> usize {
        self.computations.len()
    }

    /// Has no computations?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.computations.is_empty()
    }
}

impl core::fmt::Display for Module {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("module {}\n", self.name))?;
        for computation in self.computations.values() {
            f.write_fmt(format_args!("{computation}\n"))?;
        }
        Ok(())
    }
}
