use std::{
    collections::{hash_map::Entry, HashMap},
    ffi::{c_char, c_void, CStr},
    sync::{Mutex, PoisonError},
};

use rustacuda::{
    error::CudaResult,
    function::{BlockSize, Function, GridSize},
    module::Module,
    stream::Stream,
};

use crate::{abi::LaunchRequest, error::LaunchError};

/// Execution context handed to lowered host functions as their first
/// argument.
///
/// Every embedded binary is loaded as a CUDA module on its first launch and
/// kept, keyed by its address, until the context is dropped. Kernels are
/// looked up in their module by name at every launch.
pub struct LaunchContext {
    stream: Stream,
    modules: Mutex<HashMap<usize, Module>>,
    last_error: Mutex<Option<LaunchError>>,
}

impl LaunchContext {
    /// Creates a context that launches every kernel on `stream`.
    #[must_use]
    pub fn new(stream: Stream) -> Self {
        Self {
            stream,
            modules: Mutex::new(HashMap::new()),
            last_error: Mutex::new(None),
        }
    }

    /// Returns and clears the error of the most recent failed launch through
    /// [`kernelGenLaunchKernel`].
    #[must_use]
    pub fn take_last_error(&self) -> Option<LaunchError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Launches `request` on the context's stream and waits for it to
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Cuda`] if the binary cannot be loaded, has no
    /// kernel of the requested name, or the launch fails.
    ///
    /// # Safety
    ///
    /// The binary of `request` must stay alive and unchanged for the lifetime
    /// of `self`. Its parameter array must hold exactly one pointer per
    /// parameter of the kernel, each addressing a value of that parameter's
    /// type.
    pub unsafe fn launch(&self, request: &LaunchRequest<'_>) -> Result<(), LaunchError> {
        let mut modules = self.modules.lock().unwrap_or_else(PoisonError::into_inner);

        let module = match modules.entry(request.blob.as_ptr() as usize) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                // SAFETY: cuModuleLoadData reads the image through its address
                let image = unsafe { CStr::from_ptr(request.blob.as_ptr()) };
                entry.insert(Module::load_from_string(image)?)
            },
        };

        let function = module.get_function(request.kernel)?;

        // SAFETY: the parameter array matches the kernel by the caller's contract
        unsafe { launch_with_param_array(&self.stream, &function, request) }?;

        self.stream.synchronize()?;

        Ok(())
    }

    fn record(&self, result: Result<(), LaunchError>) {
        if let Err(err) = result {
            *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
        }
    }
}

impl Drop for LaunchContext {
    fn drop(&mut self) {
        let modules = self
            .modules
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        for (_, module) in modules.drain() {
            if let Err((_err, module)) = Module::drop(module) {
                std::mem::forget(module);
            }
        }
    }
}

/// Enqueues `function` with the unterminated parameter array of `request`.
///
/// The launch ABI carries no parameter count, so the array is handed over as
/// an empty slice whose pointer is the array itself. `cuLaunchKernel` reads
/// `kernelParams` through that pointer and takes the count from the kernel's
/// own signature.
///
/// # Safety
///
/// The parameter array of `request` must hold one pointer per parameter of
/// `function`, each addressing a value of that parameter's type.
unsafe fn launch_with_param_array(
    stream: &Stream,
    function: &Function,
    request: &LaunchRequest<'_>,
) -> CudaResult<()> {
    let (gx, gy, gz) = request.dims.grid;
    let (bx, by, bz) = request.dims.block;

    // SAFETY: a zero-length slice only needs a non-null, aligned pointer
    let params = unsafe { std::slice::from_raw_parts(request.params.as_ptr().cast_const(), 0) };

    // SAFETY: the argument types match the kernel by the caller's contract
    unsafe {
        stream.launch(
            function,
            GridSize::xyz(gx, gy, gz),
            BlockSize::xyz(bx, by, bz),
            0,
            params,
        )
    }
}

/// Entry point called by lowered host code for every kernel launch.
///
/// Failures are recorded in the [`LaunchContext`], see
/// [`LaunchContext::take_last_error`]. The ABI has no result, so a launch
/// with a null `ctx` has nowhere to report to and is skipped.
///
/// # Safety
///
/// `ctx` must be null or point to a live [`LaunchContext`]. `name` must be
/// null or zero-terminated. The binary and parameter array must satisfy the
/// contract of [`LaunchContext::launch`].
#[no_mangle]
#[allow(non_snake_case, clippy::too_many_arguments, clippy::similar_names)]
pub unsafe extern "C" fn kernelGenLaunchKernel(
    ctx: *mut c_void,
    blob: *const c_char,
    name: *const c_char,
    grid_x: isize,
    grid_y: isize,
    grid_z: isize,
    block_x: isize,
    block_y: isize,
    block_z: isize,
    params: *mut *mut c_void,
) {
    // SAFETY: ctx is null or a live LaunchContext by the caller's contract
    let Some(ctx) = (unsafe { ctx.cast::<LaunchContext>().as_ref() }) else {
        return;
    };

    // SAFETY: name is null or zero-terminated by the caller's contract
    let request = unsafe {
        LaunchRequest::from_raw(
            blob,
            name,
            [grid_x, grid_y, grid_z],
            [block_x, block_y, block_z],
            params,
        )
    };

    // SAFETY: forwarded from the caller's contract
    let result = request.and_then(|request| unsafe { ctx.launch(&request) });

    ctx.record(result);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_without_context_is_skipped() {
        let mut slot = std::ptr::null_mut::<c_void>();

        unsafe {
            kernelGenLaunchKernel(
                std::ptr::null_mut(),
                b"\x7FELF".as_ptr().cast(),
                b"k\0".as_ptr().cast(),
                1,
                1,
                1,
                1,
                1,
                1,
                &mut slot,
            );
        }

        assert!(slot.is_null());
    }
}
