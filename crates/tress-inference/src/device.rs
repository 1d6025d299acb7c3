//! Device detection for the analysis model runtime
//!
//! Detects whether an accelerator is present and usable before model
//! weights are placed. Detection uses filesystem probes and process
//! checks rather than linking to GPU libraries at compile time, keeping
//! the crate lightweight on machines without an accelerator.

use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Where the caller would like the model placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Probe for an accelerator and use it if present, else CPU
    #[default]
    Auto,
    /// Force CPU placement
    Cpu,
    /// Force GPU placement (availability is validated at load time)
    Gpu,
}

impl std::fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DevicePreference::Auto => write!(f, "auto"),
            DevicePreference::Cpu => write!(f, "cpu"),
            DevicePreference::Gpu => write!(f, "gpu"),
        }
    }
}

/// A concrete device the model can be resident on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Gpu,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Gpu => write!(f, "gpu"),
        }
    }
}

impl Device {
    /// Resolve a preference into a concrete device.
    ///
    /// `Auto` probes the host for an accelerator and falls back to CPU.
    /// An explicit preference is returned unchecked; the load path is
    /// responsible for rejecting a forced GPU that is not actually there.
    pub fn detect(preference: DevicePreference) -> Self {
        match preference {
            DevicePreference::Cpu => Device::Cpu,
            DevicePreference::Gpu => Device::Gpu,
            DevicePreference::Auto => {
                if accelerator_present() {
                    Device::Gpu
                } else {
                    Device::Cpu
                }
            }
        }
    }
}

/// Returns true if any usable GPU accelerator is visible to this process.
///
/// Detection strategy, in order:
/// 1. `/dev/nvidia0` device node (NVIDIA kernel module loaded)
/// 2. `/dev/kfd` (AMD Kernel Fusion Driver)
/// 3. `/dev/dri/renderD128` (DRM render node, present for any GPU with compute support)
pub fn accelerator_present() -> bool {
    Path::new("/dev/nvidia0").exists()
        || Path::new("/dev/kfd").exists()
        || Path::new("/dev/dri/renderD128").exists()
}

/// Snapshot of the host environment relevant to model placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device an `Auto` preference would resolve to right now
    pub preferred_device: Device,
    /// Whether an accelerator was detected
    pub gpu_available: bool,
    /// Total system RAM in bytes
    pub total_ram_bytes: u64,
    /// Available system RAM in bytes at detection time
    pub available_ram_bytes: u64,
    /// Number of logical CPU cores
    pub cpu_cores: usize,
}

impl DeviceInfo {
    /// Detect the host environment.
    ///
    /// Runs synchronously — call from a blocking context or `spawn_blocking`.
    pub fn detect() -> Self {
        let gpu_available = accelerator_present();

        let mut sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_memory();

        Self {
            preferred_device: if gpu_available { Device::Gpu } else { Device::Cpu },
            gpu_available,
            total_ram_bytes: sys.total_memory(),
            available_ram_bytes: sys.available_memory(),
            cpu_cores: num_cpus(),
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ============================================================================
// Tests
// ============================================================================
