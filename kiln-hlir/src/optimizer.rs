use crate::{module::Module, pass::Pass, passes::pass_by_name};
use kiln_core::{config::Config, error::KilnError};
use log::{debug, info, trace};

/// Ordered list of passes
pub struct Optimizer {
    passes: Vec<Box<dyn Pass>>,
    debug_passes: bool,
    debug_ir: bool,
}

impl Optimizer {
    /// Optimizer without passes, running it changes nothing
    #[must_use]
    pub fn new() -> Optimizer {
        Optimizer {
            passes: Vec::new(),
            debug_passes: false,
            debug_ir: false,
        }
    }

    /// Optimizer with passes named in config
    pub fn from_config(config: &Config) -> Result<Optimizer, KilnError> {
        let mut optimizer = Optimizer {
            passes: Vec::with_capacity(config.passes.len()),
            debug_passes: config.debug_passes(),
            debug_ir: config.debug_ir(),
        };
        for name in &config.passes {
            let pass = pass_by_name(name)
                .ok_or_else(|| KilnError::ConfigError(format!("unknown pass {name:?}").into()))?;
            optimizer.passes.push(pass);
        }
        Ok(optimizer)
    }

    /// Append pass
    #[must_use]
    pub fn with_pass(mut self, pass: impl Pass + 'static) -> Optimizer {
        self.passes.push(Box::new(pass));
        self
    }

    /// Names of passes in order
    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|p| p.name())
    }

    /// Run every pass once, in order, on every computation of module.
    /// Returns true if any pass changed anything.
    pub fn run(&self, module: &mut Module) -> Result<bool, KilnError> {
        let mut changed = false;
        for pass in &self.passes {
            for computation in module.computations_mut() {
                if self.debug_passes {
                    info!("Running pass {} on {}", pass.name(), computation.name());
                } else {
                    debug!("Running pass {} on {}", pass.name(), computation.name());
                }
                let modified = pass.run(computation)?;
                if modified {
                    debug!("Pass {} modified {}", pass.name(), computation.name());
                } else {
                    trace!("Pass {} made no changes to {}", pass.name(), computation.name());
                }
                if self.debug_ir {
                    info!("After {}:\n{computation}", pass.name());
                }
                changed |= modified;
            }
        }
        Ok(changed)
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Optimizer::new()
    }
}
