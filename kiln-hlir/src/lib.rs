//! # kiln-hlir
//!
//! High level instruction graph of kiln. Computations are built from
//! parameters, splat constants and elementwise binaries, collected into
//! modules and rewritten by an ordered pipeline of optimization passes.
//!
#![forbid(unsafe_code)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![forbid(rustdoc::private_intra_doc_links)]
#![forbid(missing_docs)]
#![forbid(rustdoc::missing_crate_level_docs)]
//#![forbid(rustdoc::missing_doc_code_examples)]
#![forbid(rustdoc::private_doc_tests)]
#![forbid(rustdoc::invalid_codeblock_attributes)]
#![forbid(rustdoc::invalid_html_tags)]
#![forbid(rustdoc::invalid_rust_codeblocks)]
#![forbid(rustdoc::bare_urls)]
#![forbid(rustdoc::unescaped_backticks)]
#![forbid(rustdoc::redundant_explicit_links)]

/// See [Computation](computation::Computation) and [Builder](computation::Builder)
pub mod computation;
/// See [Instruction](instruction::Instruction)
pub mod instruction;
/// See [evaluate](interpreter::evaluate)
pub mod interpreter;
/// See [Module](module::Module)
pub mod module;
/// See [Optimizer](optimizer::Optimizer)
pub mod optimizer;
/// See [Pass](pass::Pass)
pub mod pass;
pub mod passes;

pub use computation::{Builder, Computation};
pub use instruction::{InstrCode, InstrId, InstrKind, Instruction, ParameterConfig};
pub use module::Module;
pub use optimizer::Optimizer;
pub use pass::Pass;
