//! Runtime configuration.
//!
//! Everything that used to be a compiled-in constant in this kind of driver
//! (platform filter, device type, build flags, memory ceiling) is explicit
//! immutable configuration here, so one process can run several
//! configurations side by side.

use kinflux_backends::{DeviceKind, DeviceQuery};
use serde::{Deserialize, Serialize};

use crate::layout::{BufferLayout, DataOrder};

fn default_work_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

const fn default_mem_limit() -> usize {
    // matches the generator's default global-memory ceiling
    512 * 1024 * 1024
}

/// Immutable configuration for one [`crate::KernelRuntime`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Storage order of host data and the order the kernel was generated for.
    pub order: DataOrder,
    /// Vector width the backend was generated for; 0 or 1 disables padding.
    pub vec_width: usize,
    /// Default degree of parallelism; `resize` may override per call.
    pub work_size: usize,
    /// Device/host memory ceiling bounding MaxPerRun.
    pub mem_limit_bytes: usize,
    /// Substring matched against device descriptors; `None` accepts any.
    pub platform_hint: Option<String>,
    pub device_kind: DeviceKind,
    /// Program build options, recorded with the loaded program.
    pub build_options: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            order: DataOrder::RowMajor,
            vec_width: 1,
            work_size: default_work_size(),
            mem_limit_bytes: default_mem_limit(),
            platform_hint: None,
            device_kind: DeviceKind::Accelerator,
            build_options: String::new(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON, filling omitted fields with defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Layout calculator for this configuration.
    pub fn layout(&self) -> BufferLayout {
        BufferLayout::new(self.order, self.vec_width)
    }

    /// Device selection criteria for `work_size` parallel units.
    pub fn device_query(&self, work_size: usize) -> DeviceQuery {
        DeviceQuery {
            platform_hint: self.platform_hint.clone(),
            kind: self.device_kind,
            work_size,
        }
    }
}
