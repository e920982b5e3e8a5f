//! C ABI shared by the kinflux runtime and loadable kernel binaries.
//!
//! A generated kernel is either compiled into the process (a registered entry
//! point) or built as a cdylib and loaded by path. Both forms expose the same
//! entry signature, so the runtime binds arguments and launches work groups
//! identically regardless of where the kernel came from.
//!
//! A kernel cdylib exports three symbols, normally via the macros in this
//! crate:
//!
//! - [`KERNEL_ABI_VERSION_SYMBOL`] — returns [`ABI_VERSION`]; checked at load.
//! - [`KERNEL_NAME_SYMBOL`] — returns the kernel's name as a C string.
//! - [`KERNEL_EXECUTE_SYMBOL`] — the entry point, called once per work group.
//!
//! Parameters cross the boundary as a little-endian blob built by
//! [`marshal::Marshaller`]: the chunk size first, then one device pointer per
//! named array in the generation-determined order. The kernel unpacks them
//! with [`marshal::Unmarshaller`].

pub mod marshal;

use std::os::raw::c_char;

/// Current ABI version. Bumped whenever [`CKernelLaunch`] or the parameter
/// blob encoding changes.
pub const ABI_VERSION: u32 = 2;

/// Symbol exporting the ABI version getter.
pub const KERNEL_ABI_VERSION_SYMBOL: &[u8] = b"kinflux_kernel_abi_version";

/// Symbol exporting the kernel name getter.
pub const KERNEL_NAME_SYMBOL: &[u8] = b"kinflux_kernel_name";

/// Symbol exporting the kernel entry point.
pub const KERNEL_EXECUTE_SYMBOL: &[u8] = b"kinflux_kernel_execute";

/// Work-group geometry for one entry-point invocation.
///
/// The backend calls the entry once per work group; a group covers the
/// conditions `group_id, group_id + group_count, ...` below the chunk size
/// carried in the parameter blob (lockstep striding).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CKernelLaunch {
    /// Index of this work group in `[0, group_count)`.
    pub group_id: i32,
    /// Total number of work groups in the launch.
    pub group_count: i32,
    /// Work items per group (the vector width the kernel was generated for).
    pub local_size: i32,
}

/// Status codes returned by the kernel entry point.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelStatus {
    Success = 0,
    InvalidParams = 1,
    ExecutionFailed = 2,
}

impl KernelStatus {
    /// Interpret a raw entry-point return value.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::InvalidParams,
            _ => Self::ExecutionFailed,
        }
    }
}

/// Entry-point signature every kernel exports.
///
/// # Safety
///
/// `params` must point to `params_len` readable bytes encoding the argument
/// blob for this launch; device pointers inside it must stay valid for the
/// whole call, and distinct work groups must write disjoint regions.
pub type KernelExecuteFn =
    unsafe extern "C" fn(launch: *const CKernelLaunch, params: *const u8, params_len: usize) -> i32;

/// Name-getter signature.
pub type KernelNameFn = unsafe extern "C" fn() -> *const c_char;

/// ABI-version-getter signature.
pub type KernelAbiVersionFn = unsafe extern "C" fn() -> u32;

/// Export the standard ABI version getter from a kernel cdylib.
#[macro_export]
macro_rules! define_kernel_abi_version {
    () => {
        #[no_mangle]
        pub unsafe extern "C" fn kinflux_kernel_abi_version() -> u32 {
            $crate::ABI_VERSION
        }
    };
}

/// Export the standard kernel name getter from a kernel cdylib.
///
/// The name must be a string literal; a NUL terminator is appended at compile
/// time so the returned pointer is valid for the life of the library.
#[macro_export]
macro_rules! define_kernel_name {
    ($name:literal) => {
        #[no_mangle]
        pub unsafe extern "C" fn kinflux_kernel_name() -> *const ::std::os::raw::c_char {
            concat!($name, "\0").as_ptr() as *const ::std::os::raw::c_char
        }
    };
}

/// Export the standard entry point, delegating to a safe-signature function
/// `fn(&CKernelLaunch, &[u8]) -> i32`.
#[macro_export]
macro_rules! define_kernel_execute {
    ($inner:path) => {
        #[no_mangle]
        pub unsafe extern "C" fn kinflux_kernel_execute(
            launch: *const $crate::CKernelLaunch,
            params: *const u8,
            params_len: usize,
        ) -> i32 {
            if launch.is_null() || params.is_null() {
                return $crate::KernelStatus::InvalidParams as i32;
            }
            let params_slice = ::std::slice::from_raw_parts(params, params_len);
            $inner(&*launch, params_slice)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_known_codes() {
        assert_eq!(KernelStatus::from_raw(0), KernelStatus::Success);
        assert_eq!(KernelStatus::from_raw(1), KernelStatus::InvalidParams);
        assert_eq!(KernelStatus::from_raw(2), KernelStatus::ExecutionFailed);
        // unknown codes collapse to ExecutionFailed
        assert_eq!(KernelStatus::from_raw(-7), KernelStatus::ExecutionFailed);
    }

    #[test]
    fn launch_struct_is_c_layout() {
        assert_eq!(std::mem::size_of::<CKernelLaunch>(), 12);
    }
}
