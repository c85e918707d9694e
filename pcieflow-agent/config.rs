use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{PcieflowError, Result};

const SYSFS_CPU: &str = "/sys/devices/system/cpu";

pub const DEFAULT_DELAY_MS: u32 = 1000;
pub use crate::counters::pcie::platform::DEFAULT_SAMPLES;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_LISTEN: &str = "127.0.0.1:9402";

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub sockets: Vec<u32>,
    pub cores: Vec<u32>,
    /// Package id of every core in `cores`
    pub core_sockets: BTreeMap<u32, u32>,
    /// Multiplexing budget for one pass over all event groups
    pub delay_ms: u32,
    /// Samples per pass; divides the per-group slice
    pub samples: u32,
    /// Time between collection cycles
    pub interval: Duration,
    pub listen: SocketAddr,
}

impl ExportConfig {
    pub fn new(sockets: Vec<u32>, cores: Vec<u32>) -> Self {
        let core_sockets = cores
            .iter()
            .filter_map(|&core| Self::socket_of(core).map(|socket| (core, socket)))
            .collect();

        Self::with_topology(sockets, cores, core_sockets)
    }

    /// Build a configuration from an already known core to socket map
    pub fn with_topology(
        sockets: Vec<u32>,
        cores: Vec<u32>,
        core_sockets: BTreeMap<u32, u32>,
    ) -> Self {
        Self {
            sockets,
            cores,
            core_sockets,
            delay_ms: DEFAULT_DELAY_MS,
            samples: DEFAULT_SAMPLES,
            interval: DEFAULT_INTERVAL,
            listen: SocketAddr::from(([127, 0, 0, 1], 9402)),
        }
    }

    /// Auto-detect all online CPUs and their sockets
    pub fn auto_detect() -> Self {
        let cores = Self::detect_online_cpus();
        let sockets = Self::detect_sockets(&cores);

        tracing::info!(
            "Auto-detected {} sockets, {} cores",
            sockets.len(),
            cores.len()
        );

        Self::new(sockets, cores)
    }

    /// Detect online CPUs from /sys/devices/system/cpu/online
    pub fn detect_online_cpus() -> Vec<u32> {
        Self::read_cpu_list("online").unwrap_or_else(|| {
            tracing::warn!("Failed to detect online CPUs, using default: 0");
            vec![0]
        })
    }

    fn read_cpu_list(name: &str) -> Option<Vec<u32>> {
        std::fs::read_to_string(format!("{SYSFS_CPU}/{name}"))
            .ok()
            .and_then(|s| Self::parse_cpu_list(&s))
    }

    /// Parse a CPU list like "0-3,8-11"
    pub fn parse_cpu_list(s: &str) -> Option<Vec<u32>> {
        let mut cpus = Vec::new();
        for part in s.trim().split(',') {
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start.parse().ok()?;
                let end: u32 = end.parse().ok()?;
                cpus.extend(start..=end);
            } else {
                cpus.push(part.parse().ok()?);
            }
        }
        Some(cpus)
    }

    fn socket_of(core: u32) -> Option<u32> {
        let path = format!("{SYSFS_CPU}/cpu{core}/topology/physical_package_id");
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Detect which sockets the cores belong to
    pub fn detect_sockets(cores: &[u32]) -> Vec<u32> {
        let sockets: BTreeSet<u32> = cores.iter().filter_map(|&c| Self::socket_of(c)).collect();

        if sockets.is_empty() {
            vec![0]
        } else {
            sockets.into_iter().collect()
        }
    }

    /// Cores present in the machine but not online
    pub fn offline_cores(present: &[u32], online: &[u32]) -> Vec<u32> {
        let online: BTreeSet<u32> = online.iter().copied().collect();
        present
            .iter()
            .copied()
            .filter(|core| !online.contains(core))
            .collect()
    }

    /// Refuse to run on a machine with offlined cores
    ///
    /// Uncore programming goes through one core per socket and the socket
    /// enumeration assumes a dense core list.
    pub fn ensure_no_offline_cores() -> Result<()> {
        let (Some(present), Some(online)) =
            (Self::read_cpu_list("present"), Self::read_cpu_list("online"))
        else {
            tracing::warn!("Could not read CPU present/online lists, skipping offline check");
            return Ok(());
        };

        let offline = Self::offline_cores(&present, &online);
        if offline.is_empty() {
            Ok(())
        } else {
            Err(PcieflowError::ConfigError(format!(
                "Core offlining is not supported (offline cores: {offline:?})"
            )))
        }
    }

    /// First configured core on each configured socket, in socket order
    pub fn socket_representatives(&self) -> Result<Vec<u32>> {
        self.sockets
            .iter()
            .map(|&socket| {
                self.cores
                    .iter()
                    .copied()
                    .filter(|core| self.core_sockets.get(core) == Some(&socket))
                    .min()
                    .ok_or_else(|| {
                        PcieflowError::ConfigError(format!(
                            "No configured core on socket {socket}"
                        ))
                    })
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.sockets.is_empty() {
            return Err(PcieflowError::InvalidConfiguration(
                "At least one socket is required".to_string(),
            ));
        }
        if self.delay_ms == 0 {
            return Err(PcieflowError::InvalidConfiguration(
                "Multiplexing delay must be positive".to_string(),
            ));
        }
        if self.samples == 0 {
            return Err(PcieflowError::InvalidConfiguration(
                "Samples per pass must be positive".to_string(),
            ));
        }
        if self.delay_ms < self.samples {
            return Err(PcieflowError::InvalidConfiguration(format!(
                "Multiplexing delay of {} ms cannot fit {} samples per pass",
                self.delay_ms, self.samples
            )));
        }
        if self.interval.is_zero() {
            return Err(PcieflowError::InvalidConfiguration(
                "Collection interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
