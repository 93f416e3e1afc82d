//! Kiln reduction compiler
//!
//! Turns axis reductions (sum, product, max, min) into explicit compute
//! definitions over fresh reduction variables, and lowers reductions of
//! trailing dimensions onto warp intrinsics.

#![forbid(unsafe_code)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![forbid(rustdoc::private_intra_doc_links)]
//#![forbid(missing_docs)]
#![forbid(rustdoc::missing_crate_level_docs)]
//#![forbid(rustdoc::missing_doc_code_examples)]
#![forbid(rustdoc::private_doc_tests)]
#![forbid(rustdoc::invalid_codeblock_attributes)]
#![forbid(rustdoc::invalid_html_tags)]
#![forbid(rustdoc::invalid_rust_codeblocks)]
#![forbid(rustdoc::bare_urls)]
#![forbid(rustdoc::unescaped_backticks)]
#![forbid(rustdoc::redundant_explicit_links)]

pub mod axes;
pub mod ops;
pub mod reduce;
pub mod warp;

pub use axes::{output_shape, real_axes, Axes, IntoAxes};
pub use ops::{reduce_max, reduce_min, reduce_prod, reduce_sum, ReduceOp};
pub use reduce::{do_reduce, reduce, Fold, ReductionSpec};
pub use warp::{
    warp_reduce, warp_reduce_avg, warp_reduce_max, warp_reduce_sum, HostIntrinsics, WarpOp,
    WarpReduction, WARP_SIZE,
};
