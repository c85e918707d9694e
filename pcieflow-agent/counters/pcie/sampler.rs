// Raw counter snapshots and the per-platform difference rules

use pcieflow_raw::platform::CompanionKind;

use crate::counters::pcie::port::CounterAccessPort;
use crate::error::Result;
use crate::metrics::pcie::EventFilter;

/// Values of the first `width` physical slots of every socket at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSnapshot {
    values: Vec<Vec<u64>>,
}

impl RawSnapshot {
    pub fn capture<P: CounterAccessPort + ?Sized>(port: &P, width: usize) -> Result<Self> {
        let values = (0..port.num_sockets())
            .map(|socket| {
                (0..width)
                    .map(|slot| port.read_counter(socket, slot))
                    .collect::<Result<Vec<u64>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { values })
    }

    pub fn from_values(values: Vec<Vec<u64>>) -> Self {
        Self { values }
    }

    pub fn num_sockets(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, socket: usize, slot: usize) -> u64 {
        self.values
            .get(socket)
            .and_then(|slots| slots.get(slot))
            .copied()
            .unwrap_or(0)
    }

    fn width(&self, socket: usize) -> usize {
        self.values.get(socket).map_or(0, Vec::len)
    }
}

/// Delta of a register expected to grow monotonically within a slice
///
/// A smaller `after` means the counter was reset mid-slice; the slice then
/// contributes nothing.
pub fn plain_delta(before: u64, after: u64) -> u64 {
    match after.checked_sub(before) {
        Some(delta) => delta,
        None => {
            tracing::warn!(
                "PCIe counter went backwards ({} -> {}), dropping slice",
                before,
                after
            );
            0
        }
    }
}

/// Delta of a miss/total register pair member that may be reset between
/// slices; only strictly increasing values count.
pub fn clamped_delta(before: u64, after: u64) -> u64 {
    if after > before {
        after - before
    } else {
        if after < before {
            tracing::debug!("PCIe counter reset ({} -> {}), clamping to 0", before, after);
        }
        0
    }
}

/// How raw deltas are taken and how the register pair of an event is viewed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferencePolicy {
    /// Independent miss and hit registers
    Plain,
    /// Miss register plus a monotonic total register
    Clamped,
}

impl DifferencePolicy {
    pub fn for_companion(kind: CompanionKind) -> Self {
        match kind {
            CompanionKind::Hit => DifferencePolicy::Plain,
            CompanionKind::Total => DifferencePolicy::Clamped,
        }
    }

    pub fn delta(&self, before: u64, after: u64) -> u64 {
        match self {
            DifferencePolicy::Plain => plain_delta(before, after),
            DifferencePolicy::Clamped => clamped_delta(before, after),
        }
    }

    /// Per-socket, per-slot deltas between two snapshots of one group
    pub fn group_deltas(&self, before: &RawSnapshot, after: &RawSnapshot) -> Vec<Vec<u64>> {
        (0..after.num_sockets())
            .map(|socket| {
                (0..after.width(socket))
                    .map(|slot| self.delta(before.get(socket, slot), after.get(socket, slot)))
                    .collect()
            })
            .collect()
    }

    /// Filtered view of an event's accumulated miss and companion counts
    pub fn view(&self, filter: EventFilter, miss: u64, companion: Option<u64>) -> u64 {
        match (self, companion) {
            (_, None) => match filter {
                EventFilter::Total | EventFilter::Miss => miss,
                EventFilter::Hit => 0,
            },
            (DifferencePolicy::Plain, Some(hit)) => match filter {
                EventFilter::Total => miss.saturating_add(hit),
                EventFilter::Miss => miss,
                EventFilter::Hit => hit,
            },
            (DifferencePolicy::Clamped, Some(total)) => match filter {
                EventFilter::Total => total,
                EventFilter::Miss => miss,
                EventFilter::Hit => clamped_delta(miss, total),
            },
        }
    }
}
