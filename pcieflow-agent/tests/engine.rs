// End-to-end checks of the multiplexing engine against a fake counter port

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use pcieflow::counters::pcie::{PcieMonitor, Platform, PlatformKind};
use pcieflow::metrics::pcie::EventFilter;
use pcieflow::{create_platform, CounterAccessPort, PcieflowError, Result};
use pcieflow_raw::platform::{bromolow, whitley};

fn no_sleep(_: Duration) {}

/// Counters advance by `step` per read; groups listed in `scripts` replay
/// fixed before/after values on every socket instead
struct FakePort {
    sockets: u32,
    step: u64,
    scripts: HashMap<usize, (Vec<u64>, Vec<u64>)>,
    programmed: Vec<Vec<u64>>,
    reads: RefCell<HashMap<(u32, usize), u64>>,
}

impl FakePort {
    fn new(sockets: u32, step: u64) -> Self {
        Self {
            sockets,
            step,
            scripts: HashMap::new(),
            programmed: Vec::new(),
            reads: RefCell::new(HashMap::new()),
        }
    }

    fn script(mut self, group: usize, before: Vec<u64>, after: Vec<u64>) -> Self {
        self.scripts.insert(group, (before, after));
        self
    }
}

impl CounterAccessPort for FakePort {
    fn num_sockets(&self) -> u32 {
        self.sockets
    }

    fn program_group(&mut self, codes: &[u64]) -> Result<()> {
        self.programmed.push(codes.to_vec());
        self.reads.borrow_mut().clear();
        Ok(())
    }

    fn read_counter(&self, socket: u32, slot: usize) -> Result<u64> {
        let mut reads = self.reads.borrow_mut();
        let nth = reads.entry((socket, slot)).or_insert(0);
        *nth += 1;

        let group = self.programmed.len() - 1;
        Ok(match self.scripts.get(&group) {
            Some((before, _)) if *nth == 1 => before.get(slot).copied().unwrap_or(0),
            Some((_, after)) => after.get(slot).copied().unwrap_or(0),
            None => self.step * *nth,
        })
    }
}

fn platform(kind: PlatformKind, delay_ms: u32) -> Platform {
    Platform::new(kind, delay_ms, 1)
        .unwrap()
        .with_sleeper(no_sleep)
}

#[test]
fn groups_partition_raw_counter_list() {
    for kind in PlatformKind::all() {
        let platform = platform(kind, 1000);
        let mut port = FakePort::new(1, 1);
        platform
            .get_events(&mut port, &platform.new_sample_buffer(1))
            .unwrap();

        assert!(port.programmed.iter().all(|g| (1..=4).contains(&g.len())));
        let flattened: Vec<u64> = port.programmed.concat();
        assert_eq!(flattened, kind.table().raw_codes(), "{}", kind.name());
    }
}

#[test]
fn cleanup_zeroes_every_query() {
    let platform = platform(PlatformKind::EagleStream, 900);
    let mut port = FakePort::new(2, 7);
    let mut buffer = platform
        .get_events(&mut port, &platform.new_sample_buffer(2))
        .unwrap();
    assert!(platform.read_bw(&buffer) > 0);

    platform.cleanup(&mut buffer);
    assert_eq!(platform.read_bw(&buffer), 0);
    assert_eq!(platform.write_bw(&buffer), 0);
    for socket in 0..2 {
        for event in 0..platform.descriptor().events().len() {
            for filter in EventFilter::all() {
                assert_eq!(platform.event(&buffer, socket, filter, event), 0);
            }
        }
    }
}

#[test]
fn plain_difference_is_exact() {
    let platform = platform(PlatformKind::Whitley, 1000);
    let mut port = FakePort::new(1, 0).script(0, vec![100, 20, 0, 0], vec![150, 25, 0, 0]);
    let buffer = platform
        .get_events(&mut port, &platform.new_sample_buffer(1))
        .unwrap();

    // two groups
    let rd_cur = whitley::PCI_RD_CUR;
    assert_eq!(platform.event(&buffer, 0, EventFilter::Miss, rd_cur), 100);
    assert_eq!(platform.event(&buffer, 0, EventFilter::Hit, rd_cur), 10);
    assert_eq!(platform.event(&buffer, 0, EventFilter::Total, rd_cur), 110);
}

#[test]
fn plain_difference_drops_backwards_slice() {
    let platform = platform(PlatformKind::Whitley, 1000);
    let mut port = FakePort::new(1, 0).script(0, vec![500, 0, 0, 0], vec![300, 0, 0, 0]);
    let buffer = platform
        .get_events(&mut port, &platform.new_sample_buffer(1))
        .unwrap();

    assert_eq!(
        platform.event(&buffer, 0, EventFilter::Miss, whitley::PCI_RD_CUR),
        0
    );
}

#[test]
fn clamped_difference_handles_reset_and_growth() {
    let platform = platform(PlatformKind::Bromolow, 1200);
    let rd_cur = bromolow::PCIE_RD_CUR;

    let mut port = FakePort::new(1, 0)
        .script(0, vec![100], vec![110])
        .script(1, vec![500], vec![300]);
    let buffer = platform
        .get_events(&mut port, &platform.new_sample_buffer(1))
        .unwrap();
    assert_eq!(platform.event(&buffer, 0, EventFilter::Total, rd_cur), 0);
    assert_eq!(platform.event(&buffer, 0, EventFilter::Hit, rd_cur), 0);

    let mut port = FakePort::new(1, 0)
        .script(0, vec![100], vec![110])
        .script(1, vec![500], vec![700]);
    let buffer = platform
        .get_events(&mut port, &platform.new_sample_buffer(1))
        .unwrap();
    // 12 groups
    assert_eq!(platform.event(&buffer, 0, EventFilter::Miss, rd_cur), 120);
    assert_eq!(platform.event(&buffer, 0, EventFilter::Total, rd_cur), 2400);
    assert_eq!(platform.event(&buffer, 0, EventFilter::Hit, rd_cur), 2280);
}

#[test]
fn deltas_are_scaled_by_group_count() {
    for kind in PlatformKind::all() {
        let platform = platform(kind, 1400);
        let groups = platform.descriptor().groups().len() as u64;
        let mut port = FakePort::new(1, 3);
        let buffer = platform
            .get_events(&mut port, &platform.new_sample_buffer(1))
            .unwrap();

        for event in platform.descriptor().events() {
            assert_eq!(
                platform.event(&buffer, 0, EventFilter::Miss, event.index),
                3 * groups,
                "{} {}",
                kind.name(),
                event.name
            );
        }
    }
}

#[test]
fn identical_counts_give_identical_bandwidth() {
    let platform = platform(PlatformKind::Purley, 1400);
    let run = || {
        let mut port = FakePort::new(2, 11);
        let buffer = platform
            .get_events(&mut port, &platform.new_sample_buffer(2))
            .unwrap();
        platform.bandwidth(&buffer)
    };
    assert_eq!(run(), run());
}

#[test]
fn ten_transactions_are_640_bytes() {
    let platform = platform(PlatformKind::Whitley, 1000);
    let mut port = FakePort::new(1, 0).script(0, vec![0, 0, 0, 0], vec![5, 0, 0, 0]);
    let buffer = platform
        .get_events(&mut port, &platform.new_sample_buffer(1))
        .unwrap();

    assert_eq!(platform.read_bw(&buffer), 640);
    assert_eq!(platform.write_bw(&buffer), 0);
}

#[test]
fn cycles_accumulate_until_cleanup() {
    let platform = platform(PlatformKind::Whitley, 1000);
    let mut port = FakePort::new(1, 1);
    let first = platform
        .get_events(&mut port, &platform.new_sample_buffer(1))
        .unwrap();
    let second = platform.get_events(&mut port, &first).unwrap();

    let rd_cur = whitley::PCI_RD_CUR;
    assert_eq!(
        platform.event(&second, 0, EventFilter::Miss, rd_cur),
        2 * platform.event(&first, 0, EventFilter::Miss, rd_cur)
    );
}

#[test]
fn budget_too_short_for_groups_is_rejected() {
    // 14 groups cannot share 10 ms in whole-millisecond slices
    assert!(matches!(
        Platform::new(PlatformKind::Purley, 10, 1),
        Err(PcieflowError::InvalidConfiguration(_))
    ));

    let platform = platform(PlatformKind::Purley, 14);
    assert_eq!(platform.measurement_window(), Duration::from_millis(14));
    let mut monitor = PcieMonitor::new(platform, FakePort::new(1, 1000));
    let report = monitor.collect_cycle().unwrap();
    assert!(report.bandwidth.read_bytes > 0);
    assert!(report.read_bytes_per_sec() > 0.0);
}

#[test]
fn collection_cycle_reports_rate_over_window() {
    let platform = Platform::new(PlatformKind::Whitley, 1000, 2)
        .unwrap()
        .with_sleeper(no_sleep);
    // 250 ms per slice, two groups
    assert_eq!(platform.measurement_window(), Duration::from_millis(500));

    let mut monitor = PcieMonitor::new(platform, FakePort::new(1, 1));
    let report = monitor.collect_cycle().unwrap();
    assert_eq!(report.window, Duration::from_millis(500));
    assert_eq!(report.read_bytes_per_sec(), report.bandwidth.read_bytes as f64 * 2.0);
    assert!(monitor.buffer().is_zero());
}

#[test]
fn unknown_model_is_unsupported() {
    assert!(matches!(
        create_platform(0x9A, 1000),
        Err(PcieflowError::UnsupportedPlatform(_))
    ));
}
