//! Launch plumbing shared by both backends.
//!
//! Argument marshalling and the group-parallel entry-point driver live here
//! so the two backends differ only in how they are constructed and where
//! their program comes from.

use kinflux_kernel_abi::{
    marshal::Marshaller, CKernelLaunch, KernelExecuteFn, KernelStatus,
};
use rayon::prelude::*;

use crate::arena::BufferArena;
use crate::backend::KernelArg;
use crate::error::{BackendError, Result};

/// Resolve bound arguments into the ABI parameter blob.
///
/// Buffer arguments are resolved to their base addresses at launch time, so a
/// rebind or reallocation between launches can never leave a stale pointer in
/// a blob.
pub(crate) fn marshal_args(args: &[Option<KernelArg>], arena: &BufferArena) -> Result<Vec<u8>> {
    let mut marshaller = Marshaller::new();
    for (index, slot) in args.iter().enumerate() {
        match slot {
            None => return Err(BackendError::UnboundArg(index)),
            Some(KernelArg::Int(value)) => {
                marshaller.push_i32(*value);
            }
            Some(KernelArg::Buffer(handle)) => {
                marshaller.push_device_ptr(arena.base_ptr(*handle)? as u64);
            }
        }
    }
    Ok(marshaller.finish())
}

/// Check launch geometry and return the work-group count.
pub(crate) fn validate_launch(global_size: usize, local_size: usize) -> Result<usize> {
    if local_size == 0 {
        return Err(BackendError::InvalidLaunch(
            "local work size must be at least 1".to_string(),
        ));
    }
    if global_size == 0 {
        return Err(BackendError::InvalidLaunch(
            "global work size must be at least 1".to_string(),
        ));
    }
    if global_size % local_size != 0 {
        return Err(BackendError::InvalidLaunch(format!(
            "global size {global_size} is not a multiple of local size {local_size}"
        )));
    }
    Ok(global_size / local_size)
}

/// Invoke the kernel entry once per work group, in parallel on `pool`.
///
/// # Safety
///
/// `params` must encode device pointers that stay valid for the duration of
/// the call; the caller guarantees this by holding the owning arena borrowed
/// for the whole launch. The kernel contract requires distinct groups to
/// write disjoint regions, so the parallel invocations do not race.
pub(crate) fn launch_groups(
    pool: &rayon::ThreadPool,
    entry: KernelExecuteFn,
    params: &[u8],
    groups: usize,
    local_size: usize,
) -> Result<()> {
    pool.install(|| {
        (0..groups).into_par_iter().try_for_each(|group_id| {
            let launch = CKernelLaunch {
                group_id: group_id as i32,
                group_count: groups as i32,
                local_size: local_size as i32,
            };
            let status = unsafe { entry(&launch, params.as_ptr(), params.len()) };
            match KernelStatus::from_raw(status) {
                KernelStatus::Success => Ok(()),
                _ => Err(BackendError::KernelFailure(status)),
            }
        })
    })
}
