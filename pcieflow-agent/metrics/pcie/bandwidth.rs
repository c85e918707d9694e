//! Per-platform PCIe bandwidth derivation
//!
//! A formula turns the accumulated event counts of one collection cycle into
//! read and write byte totals. Every counted transaction moves one cache
//! line. Formulas see the counts only through [`EventReader`], so they never
//! depend on wall-clock time or on how the counts were gathered.

use pcieflow_raw::platform::{bromolow, eagle_stream, grantley, purley, whitley};

use crate::metrics::pcie::types::EventFilter;

pub const CACHELINE_SIZE: u64 = 64;

/// Bytes moved by PCIe devices during one collection cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bandwidth {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

impl Bandwidth {
    /// Bytes per second over a measurement window
    pub fn per_second(&self, window: std::time::Duration) -> (f64, f64) {
        let secs = window.as_secs_f64();
        if secs <= 0.0 {
            return (0.0, 0.0);
        }
        (
            self.read_bytes as f64 / secs,
            self.write_bytes as f64 / secs,
        )
    }
}

/// Read access to accumulated logical event counts
pub trait EventReader {
    fn num_sockets(&self) -> usize;

    fn event(&self, socket: usize, filter: EventFilter, event: usize) -> u64;

    /// TOTAL view of the given events, summed over every socket
    fn total_of(&self, events: &[usize]) -> u64 {
        (0..self.num_sockets())
            .flat_map(|socket| {
                events
                    .iter()
                    .map(move |&event| self.event(socket, EventFilter::Total, event))
            })
            .fold(0u64, u64::saturating_add)
    }
}

pub type BandwidthFormula = fn(&dyn EventReader) -> Bandwidth;

pub fn to_bytes(transactions: u64) -> u64 {
    transactions.saturating_mul(CACHELINE_SIZE)
}

fn bandwidth(events: &dyn EventReader, read: &[usize], write: &[usize]) -> Bandwidth {
    Bandwidth {
        read_bytes: to_bytes(events.total_of(read)),
        write_bytes: to_bytes(events.total_of(write)),
    }
}

/// Eagle Stream and Birch Stream
pub fn eagle_stream(events: &dyn EventReader) -> Bandwidth {
    bandwidth(
        events,
        &[eagle_stream::PCI_RD_CUR],
        &[eagle_stream::ITOM, eagle_stream::ITOM_CACHE_NEAR],
    )
}

pub fn whitley(events: &dyn EventReader) -> Bandwidth {
    bandwidth(
        events,
        &[whitley::PCI_RD_CUR],
        &[whitley::ITOM, whitley::ITOM_CACHE_NEAR],
    )
}

pub fn purley(events: &dyn EventReader) -> Bandwidth {
    bandwidth(
        events,
        &[purley::PCI_RD_CUR, purley::RFO, purley::CRD, purley::DRD],
        &[purley::RFO, purley::ITOM],
    )
}

pub fn grantley(events: &dyn EventReader) -> Bandwidth {
    bandwidth(
        events,
        &[grantley::PCI_RD_CUR, grantley::RFO, grantley::CRD, grantley::DRD],
        &[grantley::RFO, grantley::ITOM],
    )
}

pub fn bromolow(events: &dyn EventReader) -> Bandwidth {
    bandwidth(
        events,
        &[bromolow::PCIE_RD_CUR, bromolow::PCIE_NS_WR],
        &[
            bromolow::PCIE_WILF,
            bromolow::PCIE_ITOM,
            bromolow::PCIE_NS_WR,
            bromolow::PCIE_NS_WRF,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// TOTAL of event `e` on socket `s` is `counts[s][e]`; other views are 0
    struct Totals(Vec<Vec<u64>>);

    impl EventReader for Totals {
        fn num_sockets(&self) -> usize {
            self.0.len()
        }

        fn event(&self, socket: usize, filter: EventFilter, event: usize) -> u64 {
            match filter {
                EventFilter::Total => self.0[socket].get(event).copied().unwrap_or(0),
                _ => 0,
            }
        }
    }

    #[test]
    fn test_ten_transactions_are_640_bytes() {
        let counts = Totals(vec![vec![10, 0, 0, 0, 0, 0, 0]]);
        let bw = eagle_stream(&counts);
        assert_eq!(bw.read_bytes, 640);
        assert_eq!(bw.write_bytes, 0);
    }

    #[test]
    fn test_eagle_stream_sums_sockets() {
        let counts = Totals(vec![vec![1, 2, 3, 100, 100, 100, 100], vec![4, 5, 6, 0, 0, 0, 0]]);
        let bw = eagle_stream(&counts);
        assert_eq!(bw.read_bytes, 5 * 64);
        assert_eq!(bw.write_bytes, (2 + 3 + 5 + 6) * 64);
    }

    #[test]
    fn test_purley_counts_rfo_in_both_directions() {
        // PCIRdCur, RFO, CRd, DRd, ItoM, PRd, WiL
        let counts = Totals(vec![vec![1, 10, 100, 1000, 7, 50, 50]]);
        let bw = purley(&counts);
        assert_eq!(bw.read_bytes, 1111 * 64);
        assert_eq!(bw.write_bytes, 17 * 64);
        assert_eq!(grantley(&counts), bw);
    }

    #[test]
    fn test_bromolow_ns_write_counted_twice() {
        // PCIeRdCur, PCIeNSRd, PCIeWiLF, PCIeItoM, PCIeNSWr, PCIeNSWrF
        let counts = Totals(vec![vec![3, 99, 5, 7, 11, 13]]);
        let bw = bromolow(&counts);
        assert_eq!(bw.read_bytes, (3 + 11) * 64);
        assert_eq!(bw.write_bytes, (5 + 7 + 11 + 13) * 64);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let counts = Totals(vec![vec![42, 17, 3, 0, 0]]);
        assert_eq!(whitley(&counts), whitley(&counts));
    }

    #[test]
    fn test_per_second() {
        let bw = Bandwidth {
            read_bytes: 1000,
            write_bytes: 500,
        };
        assert_eq!(bw.per_second(Duration::from_millis(500)), (2000.0, 1000.0));
        assert_eq!(bw.per_second(Duration::ZERO), (0.0, 0.0));
    }
}
