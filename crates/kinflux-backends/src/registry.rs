//! In-process kernel registry.
//!
//! Kernels come in two forms: compiled into the binary (registered here at
//! startup) or built as cdylibs and loaded by path. Registered kernels let
//! host builds and tests run without a separate kernel artifact; both forms
//! share the entry signature from `kinflux-kernel-abi`.

use std::collections::HashMap;
use std::sync::OnceLock;

use kinflux_kernel_abi::KernelExecuteFn;
use parking_lot::Mutex;

static REGISTRY: OnceLock<Mutex<HashMap<String, KernelExecuteFn>>> = OnceLock::new();

fn table() -> &'static Mutex<HashMap<String, KernelExecuteFn>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register an in-process kernel under `name`. Re-registering replaces the
/// previous entry (latest wins).
pub fn register_kernel(name: &str, entry: KernelExecuteFn) {
    table().lock().insert(name.to_string(), entry);
    tracing::debug!(kernel = name, "kernel_registered");
}

/// Look up a registered kernel entry point.
pub fn lookup_kernel(name: &str) -> Option<KernelExecuteFn> {
    table().lock().get(name).copied()
}

/// Names of every registered kernel, unordered.
pub fn registered_kernels() -> Vec<String> {
    table().lock().keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinflux_kernel_abi::CKernelLaunch;

    unsafe extern "C" fn nop_entry(
        _launch: *const CKernelLaunch,
        _params: *const u8,
        _params_len: usize,
    ) -> i32 {
        0
    }

    #[test]
    fn register_and_lookup() {
        register_kernel("registry_test_nop", nop_entry);
        assert!(lookup_kernel("registry_test_nop").is_some());
        assert!(lookup_kernel("registry_test_missing").is_none());
        assert!(registered_kernels().contains(&"registry_test_nop".to_string()));
    }
}
