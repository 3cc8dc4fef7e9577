use std::str::Utf8Error;

/// Reasons a lowered launch cannot be performed.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// A grid or block dimension is zero, negative or too large.
    #[error("launch {axis} dimension {value} must be in 1..=u32::MAX")]
    InvalidDimension {
        /// Axis name, e.g. `grid.x`.
        axis: &'static str,
        /// The raw dimension.
        value: isize,
    },
    /// A required pointer argument is null.
    #[error("launch received a null {0} pointer")]
    NullPointer(&'static str),
    /// The kernel name is not valid UTF-8.
    #[error("kernel name is not valid UTF-8")]
    InvalidKernelName(#[source] Utf8Error),
    /// The CUDA driver failed to load or launch the kernel.
    #[cfg(feature = "host")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] rustacuda::error::CudaError),
}
