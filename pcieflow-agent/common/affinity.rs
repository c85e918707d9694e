use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid;

use crate::error::{PcieflowError, Result};

/// Pins the calling thread to one CPU and restores the previous mask on drop
///
/// Uncore MSRs are socket scoped, so every access must run on a core of the
/// socket being programmed.
pub struct CpuPinGuard {
    previous: CpuSet,
}

impl CpuPinGuard {
    pub fn new(cpu: u32) -> Result<Self> {
        let previous = sched_getaffinity(Pid::from_raw(0))
            .map_err(|e| PcieflowError::AffinityError(format!("Failed to get affinity: {e}")))?;

        let mut pinned = CpuSet::new();
        pinned.set(cpu as usize).map_err(|e| {
            PcieflowError::AffinityError(format!("CPU {cpu} does not fit in a CPU set: {e}"))
        })?;

        sched_setaffinity(Pid::from_raw(0), &pinned).map_err(|e| {
            PcieflowError::AffinityError(format!("Failed to pin to CPU {cpu}: {e}"))
        })?;

        Ok(Self { previous })
    }
}

impl Drop for CpuPinGuard {
    fn drop(&mut self) {
        if let Err(e) = sched_setaffinity(Pid::from_raw(0), &self.previous) {
            tracing::warn!("Failed to restore CPU affinity: {}", e);
        }
    }
}
