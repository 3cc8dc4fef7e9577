//! The C ABI between lowered host code and the launch runtime.

use std::{
    ffi::{c_char, c_void, CStr},
    ptr::NonNull,
};

use crate::error::LaunchError;

/// Name under which lowered code calls the launch runtime.
pub const LAUNCH_KERNEL_SYMBOL: &str = "kernelGenLaunchKernel";

/// Checked grid and block dimensions of one launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaunchDims {
    /// Blocks per grid along x, y and z.
    pub grid: (u32, u32, u32),
    /// Threads per block along x, y and z.
    pub block: (u32, u32, u32),
}

impl LaunchDims {
    /// Converts the six pointer-sized dimensions passed by lowered code.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::InvalidDimension`] for a dimension that is zero,
    /// negative, or does not fit a `u32`.
    pub fn from_raw(grid: [isize; 3], block: [isize; 3]) -> Result<Self, LaunchError> {
        let [gx, gy, gz] = grid;
        let [bx, by, bz] = block;

        Ok(Self {
            grid: (
                dimension("grid.x", gx)?,
                dimension("grid.y", gy)?,
                dimension("grid.z", gz)?,
            ),
            block: (
                dimension("block.x", bx)?,
                dimension("block.y", by)?,
                dimension("block.z", bz)?,
            ),
        })
    }

    /// Total number of threads in one block.
    #[must_use]
    pub fn threads_per_block(&self) -> u64 {
        let (x, y, z) = self.block;
        u64::from(x) * u64::from(y) * u64::from(z)
    }
}

fn dimension(axis: &'static str, value: isize) -> Result<u32, LaunchError> {
    match u32::try_from(value) {
        Ok(dimension) if dimension > 0 => Ok(dimension),
        _ => Err(LaunchError::InvalidDimension { axis, value }),
    }
}

/// Reads the zero-terminated kernel name emitted next to every launch.
///
/// # Errors
///
/// Returns [`LaunchError::NullPointer`] if `name` is null and
/// [`LaunchError::InvalidKernelName`] if it is not UTF-8.
///
/// # Safety
///
/// `name` must be null or point to a zero-terminated byte buffer that stays
/// alive and unchanged for `'a`.
pub unsafe fn kernel_name_from_ptr<'a>(name: *const c_char) -> Result<&'a str, LaunchError> {
    if name.is_null() {
        return Err(LaunchError::NullPointer("kernel name"));
    }

    // SAFETY: name is non-null and zero-terminated by the caller's contract
    let name = unsafe { CStr::from_ptr(name) };

    name.to_str().map_err(LaunchError::InvalidKernelName)
}

/// One launch as received from lowered code, with every pointer checked.
#[derive(Clone, Copy, Debug)]
pub struct LaunchRequest<'a> {
    /// Start of the embedded kernel binary. Its length is implied by the
    /// binary format.
    pub blob: NonNull<c_char>,
    /// Name of the kernel function inside the binary.
    pub kernel: &'a CStr,
    /// Checked grid and block dimensions.
    pub dims: LaunchDims,
    /// One pointer per kernel parameter, in parameter order. The array is not
    /// terminated, its length is the parameter count of `kernel`.
    pub params: NonNull<*mut c_void>,
}

impl LaunchRequest<'_> {
    /// Checks the raw arguments of one [`LAUNCH_KERNEL_SYMBOL`] call.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::NullPointer`] for a null binary, kernel name or
    /// parameter array, [`LaunchError::InvalidKernelName`] for a name that is
    /// not UTF-8, and [`LaunchError::InvalidDimension`] for a bad dimension.
    ///
    /// # Safety
    ///
    /// `name` must be null or point to a zero-terminated byte buffer that
    /// stays alive and unchanged for the lifetime of the request.
    pub unsafe fn from_raw(
        blob: *const c_char,
        name: *const c_char,
        grid: [isize; 3],
        block: [isize; 3],
        params: *mut *mut c_void,
    ) -> Result<Self, LaunchError> {
        let blob = NonNull::new(blob.cast_mut()).ok_or(LaunchError::NullPointer("binary"))?;
        let params = NonNull::new(params).ok_or(LaunchError::NullPointer("parameter array"))?;

        // SAFETY: forwarded from the caller's contract
        unsafe { kernel_name_from_ptr(name) }?;
        // SAFETY: name was checked to be non-null and zero-terminated above
        let kernel = unsafe { CStr::from_ptr(name) };

        Ok(Self {
            blob,
            kernel,
            dims: LaunchDims::from_raw(grid, block)?,
            params,
        })
    }
}
