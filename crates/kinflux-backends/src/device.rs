//! Device enumeration and selection for the command-queue backend.
//!
//! The offload device is an in-process command-queue implementation, so
//! enumeration describes the host it runs on: one accelerator-style
//! descriptor exposing every hardware thread as a compute unit, and one
//! CPU-kind descriptor that supports partitioning into a sub-device with a
//! caller-chosen number of units.
//!
//! Selection is driven by an explicit [`DeviceQuery`] rather than compiled-in
//! platform constants, so one process can exercise several configurations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};

/// Kind of compute device requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Command-queue accelerator: all compute units, no partitioning.
    Accelerator,
    /// CPU device: partitionable into a sub-device of N compute units.
    Cpu,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Accelerator => write!(f, "accelerator"),
            DeviceKind::Cpu => write!(f, "cpu"),
        }
    }
}

/// Descriptor for one enumerable device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub kind: DeviceKind,
    /// Maximum compute units the hardware reports.
    pub compute_units: usize,
}

impl DeviceInfo {
    fn matches_hint(&self, hint: &str) -> bool {
        let hint = hint.to_ascii_lowercase();
        self.name.to_ascii_lowercase().contains(&hint)
            || self.vendor.to_ascii_lowercase().contains(&hint)
    }
}

/// Selection criteria passed into backend construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceQuery {
    /// Substring matched against device name/vendor; `None` accepts any.
    pub platform_hint: Option<String>,
    pub kind: DeviceKind,
    /// Degree of parallelism requested; for CPU-kind devices this becomes
    /// the sub-device's compute-unit count.
    pub work_size: usize,
}

impl DeviceQuery {
    pub fn new(kind: DeviceKind, work_size: usize) -> Self {
        Self {
            platform_hint: None,
            kind,
            work_size,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.platform_hint = Some(hint.into());
        self
    }
}

/// A selected (and, for CPU kinds, partitioned) device.
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub info: DeviceInfo,
    /// Compute units actually granted: the partition size for CPU devices,
    /// the full unit count otherwise.
    pub compute_units: usize,
}

fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Enumerate the devices visible to this process.
pub fn enumerate() -> Vec<DeviceInfo> {
    let units = host_parallelism();
    vec![
        DeviceInfo {
            name: "Kinflux Portable Accelerator".to_string(),
            vendor: "kinflux".to_string(),
            kind: DeviceKind::Accelerator,
            compute_units: units,
        },
        DeviceInfo {
            name: format!("Host CPU ({units} units)"),
            vendor: "kinflux".to_string(),
            kind: DeviceKind::Cpu,
            compute_units: units,
        },
    ]
}

/// Select a device matching the query.
///
/// Fails with [`BackendError::NoDevicesOfKind`] when zero devices of the
/// requested kind exist, [`BackendError::DeviceNotFound`] when the platform
/// hint matches none of them, and [`BackendError::TooManyUnitsRequested`]
/// when a CPU partition asks for more units than the device reports.
pub fn select_device(query: &DeviceQuery) -> Result<SelectedDevice> {
    select_from(&enumerate(), query)
}

/// Selection over an explicit descriptor list (separable for tests).
pub fn select_from(devices: &[DeviceInfo], query: &DeviceQuery) -> Result<SelectedDevice> {
    let of_kind: Vec<&DeviceInfo> = devices.iter().filter(|d| d.kind == query.kind).collect();
    if of_kind.is_empty() {
        return Err(BackendError::NoDevicesOfKind { kind: query.kind });
    }

    let info: &DeviceInfo = match &query.platform_hint {
        Some(hint) => of_kind
            .iter()
            .copied()
            .find(|d| d.matches_hint(hint))
            .ok_or_else(|| BackendError::DeviceNotFound { hint: hint.clone() })?,
        None => of_kind[0],
    };

    let compute_units = match query.kind {
        DeviceKind::Cpu => {
            let requested = query.work_size.max(1);
            if requested > info.compute_units {
                return Err(BackendError::TooManyUnitsRequested {
                    requested,
                    available: info.compute_units,
                });
            }
            requested
        }
        DeviceKind::Accelerator => info.compute_units,
    };

    tracing::debug!(
        device = %info.name,
        kind = %info.kind,
        compute_units = compute_units,
        "device_selected"
    );

    Ok(SelectedDevice {
        info: info.clone(),
        compute_units,
    })
}
