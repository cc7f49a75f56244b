//! CPU/RAM/GPU utilization for the optional specs line

use std::process::Stdio;
use std::time::{Duration, Instant};

use sysinfo::System;
use tokio::process::Command;

use crate::config::AppConfig;
use crate::render::text::{maybe_ascii, trim_chatbox};

/// Minimum age before a new sample is taken.
pub const CACHE_TTL: Duration = Duration::from_secs(1);
const GPU_PROBE_TIMEOUT: Duration = Duration::from_millis(1500);
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RamUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl RamUsage {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpuUsage {
    pub util: Option<f64>,
    pub name: String,
}

/// One reading; each metric is absent on its own when unavailable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecsSample {
    pub cpu: Option<f64>,
    pub ram: Option<RamUsage>,
    pub gpu: Option<GpuUsage>,
}

#[derive(Debug, Clone, Copy)]
pub struct SpecsOptions {
    pub cpu: bool,
    pub ram: bool,
    pub gpu: bool,
    pub ram_in_gb: bool,
    pub ascii_only: bool,
}

impl From<&AppConfig> for SpecsOptions {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            cpu: cfg.show_specs_cpu,
            ram: cfg.show_specs_ram,
            gpu: cfg.show_specs_gpu,
            ram_in_gb: cfg.ram_in_gb,
            ascii_only: cfg.ascii_only,
        }
    }
}

/// `CPU 12% | RAM 8.2/32 GB (26%) | GPU 34%`
pub fn format_specs(sample: &SpecsSample, opts: SpecsOptions) -> String {
    let mut parts = Vec::new();
    if let (true, Some(cpu)) = (opts.cpu, sample.cpu) {
        parts.push(format!("CPU {:.0}%", cpu));
    }
    if let (true, Some(ram)) = (opts.ram, sample.ram) {
        if opts.ram_in_gb {
            parts.push(format!(
                "RAM {:.1}/{:.0} GB ({:.0}%)",
                ram.used_bytes as f64 / GIB,
                ram.total_bytes as f64 / GIB,
                ram.percent()
            ));
        } else {
            parts.push(format!("RAM {:.0}%", ram.percent()));
        }
    }
    if opts.gpu {
        match sample.gpu.as_ref().and_then(|g| g.util) {
            Some(util) => parts.push(format!("GPU {:.0}%", util)),
            None => parts.push("GPU n/a".to_string()),
        }
    }
    maybe_ascii(parts.join(" | "), opts.ascii_only)
}

/// First CSV row of `nvidia-smi --query-gpu=utilization.gpu,name`.
pub fn parse_nvidia_smi(output: &str) -> Option<GpuUsage> {
    let first = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let mut fields = first.split(',').map(str::trim);
    let util = fields.next().and_then(|v| v.parse::<f64>().ok());
    let name = fields.next().unwrap_or_default().to_string();
    Some(GpuUsage { util, name })
}

async fn probe_gpu() -> Option<GpuUsage> {
    let mut cmd = Command::new("nvidia-smi");
    cmd.args([
        "--query-gpu=utilization.gpu,name",
        "--format=csv,noheader,nounits",
    ])
    .stdin(Stdio::null())
    .stderr(Stdio::null())
    .kill_on_drop(true);
    #[cfg(windows)]
    cmd.creation_flags(0x0800_0000);

    let output = match tokio::time::timeout(GPU_PROBE_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => output,
        Ok(Ok(output)) => {
            tracing::debug!("nvidia-smi exited with {}", output.status);
            return None;
        }
        Ok(Err(e)) => {
            tracing::debug!("nvidia-smi unavailable: {}", e);
            return None;
        }
        Err(_) => {
            tracing::debug!("nvidia-smi timed out");
            return None;
        }
    };
    parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))
}

/// Samples the machine at most once per [`CACHE_TTL`].
pub struct SpecsCollector {
    sys: System,
    cache: Option<(Instant, SpecsSample)>,
}

impl Default for SpecsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecsCollector {
    pub fn new() -> Self {
        let mut sys = System::new();
        // CPU usage is a delta; the first reading after creation is always 0
        sys.refresh_cpu();
        Self { sys, cache: None }
    }

    pub async fn sample(&mut self) -> SpecsSample {
        self.sample_at(Instant::now()).await
    }

    pub async fn sample_at(&mut self, now: Instant) -> SpecsSample {
        if let Some((taken, sample)) = &self.cache {
            if now.saturating_duration_since(*taken) < CACHE_TTL {
                return sample.clone();
            }
        }

        self.sys.refresh_cpu();
        self.sys.refresh_memory();
        let cpu = Some(self.sys.global_cpu_info().cpu_usage() as f64);
        let ram = match self.sys.total_memory() {
            0 => None,
            total_bytes => Some(RamUsage {
                used_bytes: self.sys.used_memory(),
                total_bytes,
            }),
        };
        let gpu = probe_gpu().await;

        let sample = SpecsSample { cpu, ram, gpu };
        self.cache = Some((now, sample.clone()));
        sample
    }

    /// The rendered specs line, or empty when disabled.
    pub async fn line(&mut self, cfg: &AppConfig) -> String {
        if !cfg.show_specs_line {
            return String::new();
        }
        let sample = self.sample().await;
        trim_chatbox(&format_specs(&sample, cfg.into()))
    }
}
