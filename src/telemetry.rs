//! Point-in-time system snapshots for the status endpoint.
//!
//! Pull-based and best-effort: every field a host cannot report is simply
//! absent. Accelerator probing is gracefully optional — a box without a
//! GPU reports `available: false` instead of failing the snapshot.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use fs2::{available_space, total_space};
use serde::Serialize;

const BYTES_PER_GB: f64 = (1024u64 * 1024 * 1024) as f64;

#[derive(Debug, Clone, Serialize)]
pub struct CpuInfo {
    pub cores: usize,
    /// Instantaneous usage when the host exposes it.
    pub usage_percent: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryInfo {
    pub total_gb: Option<f64>,
    pub available_gb: Option<f64>,
    pub usage_percent: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GpuInfo {
    pub available: bool,
    pub name: Option<String>,
    pub memory_total_gb: Option<f64>,
    pub memory_used_gb: Option<f64>,
    pub usage_percent: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskInfo {
    pub path: String,
    pub total_gb: f64,
    pub free_gb: f64,
    pub usage_percent: f32,
}

/// One snapshot of host resources.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub gpu: GpuInfo,
    pub disk: Option<DiskInfo>,
    pub timestamp: DateTime<Utc>,
}

/// Collaborator seam for resource telemetry.
pub trait TelemetryProvider: Send + Sync {
    fn snapshot(&self) -> SystemStatus;
}

/// Best-effort host telemetry: disk usage of the data directory, CPU core
/// count, no accelerator.
pub struct HostTelemetry {
    data_dir: PathBuf,
}

impl HostTelemetry {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn disk(&self) -> Option<DiskInfo> {
        let total = total_space(&self.data_dir).ok()?;
        let free = available_space(&self.data_dir).ok()?;
        if total == 0 {
            return None;
        }
        Some(DiskInfo {
            path: self.data_dir.display().to_string(),
            total_gb: total as f64 / BYTES_PER_GB,
            free_gb: free as f64 / BYTES_PER_GB,
            usage_percent: ((total - free) as f64 / total as f64 * 100.0) as f32,
        })
    }
}

impl TelemetryProvider for HostTelemetry {
    fn snapshot(&self) -> SystemStatus {
        SystemStatus {
            cpu: CpuInfo {
                cores: std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1),
                usage_percent: None,
            },
            memory: MemoryInfo {
                total_gb: None,
                available_gb: None,
                usage_percent: None,
            },
            gpu: GpuInfo {
                available: false,
                name: None,
                memory_total_gb: None,
                memory_used_gb: None,
                usage_percent: None,
            },
            disk: self.disk(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_cores_and_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let telemetry = HostTelemetry::new(tmp.path());
        let status = telemetry.snapshot();
        assert!(status.cpu.cores >= 1);
        assert!(!status.gpu.available);
        if let Some(disk) = status.disk {
            assert!(disk.total_gb > 0.0);
            assert!((0.0..=100.0).contains(&disk.usage_percent));
        }
    }

    #[test]
    fn missing_path_degrades_to_no_disk_info() {
        let telemetry = HostTelemetry::new("/definitely/not/a/real/path");
        assert!(telemetry.snapshot().disk.is_none());
    }
}
