//! Kernel program loading.
//!
//! A program is the executable form of the generated kernel: either a cdylib
//! produced by an external build step and loaded by path, or an entry point
//! registered in-process. Load-time checks are the only place the runtime can
//! catch a bad artifact, so failures carry the loader's diagnostics verbatim.

use std::ffi::CStr;
use std::path::{Path, PathBuf};

use kinflux_kernel_abi::{
    KernelAbiVersionFn, KernelExecuteFn, KernelNameFn, ABI_VERSION, KERNEL_ABI_VERSION_SYMBOL,
    KERNEL_EXECUTE_SYMBOL, KERNEL_NAME_SYMBOL,
};
use libloading::Library;

use crate::error::{BackendError, Result};
use crate::registry;

/// Where the kernel program comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramSource {
    /// A compiled kernel cdylib on disk.
    Binary(PathBuf),
    /// A kernel registered in-process under this name.
    Registered(String),
}

/// A loaded, launch-ready kernel program.
pub struct Program {
    name: String,
    entry: KernelExecuteFn,
    // keeps the dylib mapped for as long as `entry` may be called
    _library: Option<Library>,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("name", &self.name)
            .field("dynamic", &self._library.is_some())
            .finish()
    }
}

impl Program {
    /// Load a program from either source.
    pub fn load(source: &ProgramSource) -> Result<Self> {
        match source {
            ProgramSource::Registered(name) => {
                let entry = registry::lookup_kernel(name).ok_or_else(|| {
                    BackendError::BuildFailure {
                        log: format!("no registered kernel named '{name}'"),
                    }
                })?;
                tracing::debug!(kernel = %name, "program_resolved_from_registry");
                Ok(Self {
                    name: name.clone(),
                    entry,
                    _library: None,
                })
            }
            ProgramSource::Binary(path) => Self::load_binary(path),
        }
    }

    fn load_binary(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BackendError::BinaryNotFound {
                path: path.to_path_buf(),
            });
        }

        // readability probe; a truncated artifact fails here rather than in
        // the dynamic loader with a less useful message
        let bytes = std::fs::read(path).map_err(|err| BackendError::BinaryReadError {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        if bytes.len() < 64 {
            return Err(BackendError::BinaryReadError {
                path: path.to_path_buf(),
                reason: format!("short read: {} bytes", bytes.len()),
            });
        }
        drop(bytes);

        let library = unsafe { Library::new(path) }.map_err(|err| BackendError::BuildFailure {
            log: err.to_string(),
        })?;

        let abi_version = unsafe {
            let getter: KernelAbiVersionFn = *library
                .get::<KernelAbiVersionFn>(KERNEL_ABI_VERSION_SYMBOL)
                .map_err(|err| BackendError::BuildFailure {
                    log: format!("missing ABI version symbol: {err}"),
                })?;
            getter()
        };
        if abi_version != ABI_VERSION {
            return Err(BackendError::BuildFailure {
                log: format!(
                    "kernel ABI version {abi_version} does not match runtime version {ABI_VERSION}"
                ),
            });
        }

        let name = unsafe {
            match library.get::<KernelNameFn>(KERNEL_NAME_SYMBOL) {
                Ok(getter) => CStr::from_ptr(getter()).to_string_lossy().into_owned(),
                // name symbol is informational only
                Err(_) => path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "kernel".to_string()),
            }
        };

        let entry = unsafe {
            *library
                .get::<KernelExecuteFn>(KERNEL_EXECUTE_SYMBOL)
                .map_err(|err| BackendError::BuildFailure {
                    log: format!("missing kernel entry symbol: {err}"),
                })?
        };

        tracing::info!(kernel = %name, path = %path.display(), "program_loaded");

        Ok(Self {
            name,
            entry,
            _library: Some(library),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> KernelExecuteFn {
        self.entry
    }
}
