//! Host and process metrics read from procfs
//!
//! Used by the admin System view. Everything here is best effort: callers
//! render an error line instead of failing the view.

use nix::sys::statvfs::statvfs;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Gap between the two `/proc/stat` samples used for CPU usage
const CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Errors while reading host metrics
#[derive(Debug, Error)]
pub enum SystemInfoError {
    /// A procfs file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A procfs file had an unexpected layout
    #[error("Unexpected format in {0}")]
    Parse(&'static str),
}

/// Physical memory usage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUsage {
    /// Used memory in MB
    pub used_mb: u64,
    /// Total memory in MB
    pub total_mb: u64,
    /// Used share in percent
    pub percent: f64,
}

/// Usage of the filesystem holding `/`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    /// Used space in GB
    pub used_gb: f64,
    /// Total space in GB
    pub total_gb: f64,
    /// Used share in percent, relative to the space available to users
    pub percent: f64,
}

/// Snapshot of host and process metrics
#[derive(Debug, Clone)]
pub struct HostMetrics {
    /// Distribution name, or the target OS when unknown
    pub os: String,
    /// CPU architecture
    pub arch: &'static str,
    /// Kernel release
    pub kernel: Option<String>,
    /// Busy CPU share over the sample interval
    pub cpu_percent: f64,
    /// Memory usage
    pub memory: MemoryUsage,
    /// Root filesystem usage
    pub disk: Option<DiskUsage>,
    /// 1, 5 and 15 minute load averages
    pub load_average: Option<[f64; 3]>,
    /// Resident set size of this process in MB
    pub process_rss_mb: u64,
}

impl HostMetrics {
    /// Collect a fresh snapshot, sampling CPU usage over a short interval.
    ///
    /// # Errors
    ///
    /// Returns an error if `/proc/stat` or `/proc/meminfo` cannot be read or parsed.
    pub async fn collect() -> Result<Self, SystemInfoError> {
        let first = read_cpu_times().await?;
        tokio::time::sleep(CPU_SAMPLE_INTERVAL).await;
        let second = read_cpu_times().await?;

        let meminfo = tokio::fs::read_to_string("/proc/meminfo").await?;
        let memory = parse_meminfo(&meminfo).ok_or(SystemInfoError::Parse("/proc/meminfo"))?;

        let disk = tokio::task::spawn_blocking(root_disk_usage)
            .await
            .ok()
            .flatten();
        let load_average = tokio::fs::read_to_string("/proc/loadavg")
            .await
            .ok()
            .and_then(|s| parse_loadavg(&s));
        let process_rss_mb = tokio::fs::read_to_string("/proc/self/statm")
            .await
            .ok()
            .and_then(|s| parse_statm_rss_mb(&s))
            .unwrap_or(0);
        let kernel = tokio::fs::read_to_string("/proc/sys/kernel/osrelease")
            .await
            .ok()
            .map(|s| s.trim().to_string());
        let os = tokio::fs::read_to_string("/etc/os-release")
            .await
            .ok()
            .and_then(|s| parse_pretty_name(&s))
            .unwrap_or_else(|| std::env::consts::OS.to_string());

        Ok(Self {
            os,
            arch: std::env::consts::ARCH,
            kernel,
            cpu_percent: cpu_percent(first, second),
            memory,
            disk,
            load_average,
            process_rss_mb,
        })
    }
}

/// Aggregate CPU time as `(idle, total)` jiffies
type CpuTimes = (u64, u64);

async fn read_cpu_times() -> Result<CpuTimes, SystemInfoError> {
    let stat = tokio::fs::read_to_string("/proc/stat").await?;
    parse_cpu_times(&stat).ok_or(SystemInfoError::Parse("/proc/stat"))
}

fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    if fields.len() < 5 {
        return None;
    }
    // idle + iowait
    let idle = fields[3] + fields[4];
    Some((idle, fields.iter().sum()))
}

#[allow(clippy::cast_precision_loss)]
fn cpu_percent(first: CpuTimes, second: CpuTimes) -> f64 {
    let total = second.1.saturating_sub(first.1);
    if total == 0 {
        return 0.0;
    }
    let idle = second.0.saturating_sub(first.0).min(total);
    (total - idle) as f64 / total as f64 * 100.0
}

#[allow(clippy::cast_precision_loss)]
fn parse_meminfo(meminfo: &str) -> Option<MemoryUsage> {
    let field = |name: &str| {
        meminfo
            .lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse::<u64>().ok())
    };

    let total_kb = field("MemTotal:")?;
    let available_kb = field("MemAvailable:")?;
    if total_kb == 0 {
        return None;
    }
    let used_kb = total_kb.saturating_sub(available_kb);

    Some(MemoryUsage {
        used_mb: used_kb / 1024,
        total_mb: total_kb / 1024,
        percent: used_kb as f64 / total_kb as f64 * 100.0,
    })
}

fn parse_loadavg(loadavg: &str) -> Option<[f64; 3]> {
    let mut values = loadavg.split_whitespace().map(str::parse::<f64>);
    Some([
        values.next()?.ok()?,
        values.next()?.ok()?,
        values.next()?.ok()?,
    ])
}

#[allow(clippy::useless_conversion)]
fn root_disk_usage() -> Option<DiskUsage> {
    match statvfs("/") {
        Ok(stat) => disk_usage(
            u64::from(stat.blocks()),
            u64::from(stat.blocks_free()),
            u64::from(stat.blocks_available()),
            u64::from(stat.fragment_size()),
        ),
        Err(e) => {
            warn!("statvfs(/) failed: {e}");
            None
        }
    }
}

/// Same accounting as `df`: used excludes free blocks, the percentage
/// ignores blocks reserved for root.
#[allow(clippy::cast_precision_loss)]
fn disk_usage(blocks: u64, free: u64, available: u64, fragment_size: u64) -> Option<DiskUsage> {
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;

    let used = blocks.checked_sub(free)?.saturating_mul(fragment_size);
    let usable = used.saturating_add(available.saturating_mul(fragment_size));
    if usable == 0 {
        return None;
    }

    Some(DiskUsage {
        used_gb: used as f64 / GB,
        total_gb: blocks.saturating_mul(fragment_size) as f64 / GB,
        percent: used as f64 / usable as f64 * 100.0,
    })
}

/// Resident pages (second field) assuming 4 KiB pages
fn parse_statm_rss_mb(statm: &str) -> Option<u64> {
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4 / 1024)
}

fn parse_pretty_name(os_release: &str) -> Option<String> {
    os_release
        .lines()
        .find_map(|l| l.strip_prefix("PRETTY_NAME="))
        .map(|v| v.trim_matches('"').to_string())
}
