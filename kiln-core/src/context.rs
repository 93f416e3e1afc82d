//! Compilation context.
//!
//! Owns name generation for one compilation unit, so that two units
//! compiled with fresh contexts get identical names.

use crate::{
    config::Config,
    expr::{Expr, Var},
};
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

/// Compilation context
#[derive(Debug, Default)]
pub struct Context {
    config: Config,
    // Next free id for each prefix
    names: RefCell<BTreeMap<Box<str>, u32>>,
}

impl Context {
    /// New context with default config
    #[must_use]
    pub fn new() -> Context {
        Context::with_config(Config::default())
    }

    /// New context with config read from disk and env, see [`Config::load`]
    #[must_use]
    pub fn from_env() -> Context {
        Context::with_config(Config::load())
    }

    /// New context with given config
    #[must_use]
    pub fn with_config(config: Config) -> Context {
        Context {
            config,
            names: RefCell::new(BTreeMap::new()),
        }
    }

    /// Config of this context
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns `{prefix}_{n}` where n is the number of names
    /// previously generated with this prefix.
    #[must_use]
    pub fn unique_name(&self, prefix: &str) -> Rc<str> {
        let mut names = self.names.borrow_mut();
        let id = names.entry(prefix.into()).or_insert(0);
        let name = format!("{prefix}_{id}");
        *id += 1;
        name.into()
    }

    /// Fresh variable ranging over `[0, extent)`
    #[must_use]
    pub fn var(&self, prefix: &str, extent: impl Into<Expr>) -> Var {
        Var::new(self.unique_name(prefix), extent)
    }

    /// Forget all generated names, the context can be used for a new unit
    pub fn reset(&self) {
        self.names.borrow_mut().clear();
    }
}
