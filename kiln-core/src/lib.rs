//! # kiln-core
//!
//! kiln-core is the core part of the kiln tensor compiler.
//! kiln-core contains definitions of dtype, scalar constants, the symbolic
//! expression algebra, tensors with their compute definitions, the naming
//! context of one compilation unit, configuration, errors, the reference
//! interpreter and the hand-off to lowering backends.
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

extern crate alloc;

/// See [Config](config::Config)
pub mod config;
/// See [Context](context::Context)
pub mod context;
/// See [DType](dtype::DType)
pub mod dtype;
/// See [KilnError](error::KilnError)
pub mod error;
/// See [Expr](expr::Expr)
pub mod expr;
/// See [Interpreter](interpreter::Interpreter)
pub mod interpreter;
/// See [LoweringBackend](lower::LoweringBackend)
pub mod lower;
/// See [Scalar](scalar::Scalar)
pub mod scalar;
/// See [Shape](shape::Shape)
pub mod shape;
/// See [Tensor](tensor::Tensor)
pub mod tensor;
