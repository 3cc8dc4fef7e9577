//! Runtime side of lowered kernel launches.
//!
//! Lowered host code calls [`abi::LAUNCH_KERNEL_SYMBOL`] with an execution
//! context, the embedded kernel binary, the zero-terminated kernel name, the
//! grid and block dimensions, and an array with one pointer per kernel
//! argument. The `host` feature provides that entry point on top of
//! `rustacuda`.

/// Checked views of the raw launch arguments.
pub mod abi;
/// Errors of the launch runtime.
pub mod error;

/// CUDA-backed implementation of the launch entry point.
#[cfg(feature = "host")]
pub mod host;

pub use abi::{kernel_name_from_ptr, LaunchDims, LaunchRequest, LAUNCH_KERNEL_SYMBOL};
pub use error::LaunchError;
