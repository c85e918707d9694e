// PCIe traffic monitor: owns the platform, the counter port and the sample
// buffer between collection cycles

use std::time::Duration;

use crate::counters::pcie::buffer::SampleBuffer;
use crate::counters::pcie::platform::Platform;
use crate::counters::pcie::port::CounterAccessPort;
use crate::error::Result;
use crate::metrics::pcie::{Bandwidth, EventFilter};

/// Filtered count of one logical event on one socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCount {
    pub socket: usize,
    pub event: &'static str,
    pub filter: EventFilter,
    pub value: u64,
}

/// Everything published after one collection cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub bandwidth: Bandwidth,
    pub window: Duration,
    pub events: Vec<EventCount>,
}

impl CycleReport {
    pub fn read_bytes_per_sec(&self) -> f64 {
        self.bandwidth.per_second(self.window).0
    }

    pub fn write_bytes_per_sec(&self) -> f64 {
        self.bandwidth.per_second(self.window).1
    }
}

pub struct PcieMonitor<P: CounterAccessPort> {
    platform: Platform,
    port: P,
    buffer: SampleBuffer,
}

impl<P: CounterAccessPort> PcieMonitor<P> {
    pub fn new(platform: Platform, port: P) -> Self {
        let buffer = platform.new_sample_buffer(port.num_sockets() as usize);

        tracing::info!(
            "Initialized PCIe monitor for {} sockets on {}",
            port.num_sockets(),
            platform.name()
        );

        Self {
            platform,
            port,
            buffer,
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Run one multiplexing cycle; on failure the buffer keeps its counts
    pub fn get_events(&mut self) -> Result<()> {
        self.buffer = self.platform.get_events(&mut self.port, &self.buffer)?;
        Ok(())
    }

    pub fn read_bw(&self) -> u64 {
        self.platform.read_bw(&self.buffer)
    }

    pub fn write_bw(&self) -> u64 {
        self.platform.write_bw(&self.buffer)
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.platform.bandwidth(&self.buffer)
    }

    pub fn event(&self, socket: usize, filter: EventFilter, event: usize) -> u64 {
        self.platform.event(&self.buffer, socket, filter, event)
    }

    /// Every (socket, event, filter) view of the current buffer
    pub fn event_counts(&self) -> Vec<EventCount> {
        let events = self.platform.descriptor().events();
        (0..self.buffer.num_sockets())
            .flat_map(move |socket| {
                events.iter().flat_map(move |event| {
                    EventFilter::all().into_iter().map(move |filter| EventCount {
                        socket,
                        event: event.name,
                        filter,
                        value: self.event(socket, filter, event.index),
                    })
                })
            })
            .collect()
    }

    pub fn cleanup(&mut self) {
        self.platform.cleanup(&mut self.buffer);
    }

    /// get_events, snapshot the derived figures, cleanup
    pub fn collect_cycle(&mut self) -> Result<CycleReport> {
        self.get_events()?;

        let report = CycleReport {
            bandwidth: self.bandwidth(),
            window: self.platform.measurement_window(),
            events: self.event_counts(),
        };
        self.cleanup();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::arch::models;
    use crate::counters::pcie::platform::create_platform;
    use crate::counters::pcie::testing::{no_sleep, ScriptedPort};
    use pcieflow_raw::platform::eagle_stream;

    fn spr_monitor(port: ScriptedPort) -> PcieMonitor<ScriptedPort> {
        let platform = create_platform(models::SPR, 300)
            .unwrap()
            .with_sleeper(no_sleep);
        PcieMonitor::new(platform, port)
    }

    #[test]
    fn test_queries_before_collection_are_zero() {
        let monitor = spr_monitor(ScriptedPort::steady(2, 1));
        assert_eq!(monitor.read_bw(), 0);
        assert_eq!(monitor.write_bw(), 0);
        assert!(monitor.buffer().is_zero());
    }

    #[test]
    fn test_collect_cycle_reports_then_cleans() {
        let mut monitor = spr_monitor(ScriptedPort::steady(1, 10));
        let report = monitor.collect_cycle().unwrap();

        // PCIRdCur miss + hit, each 10 per slice scaled by 3 groups
        assert_eq!(report.bandwidth.read_bytes, 60 * 64);
        // ItoM and ItoMCacheNear, miss + hit each
        assert_eq!(report.bandwidth.write_bytes, 120 * 64);
        assert_eq!(report.window, Duration::from_millis(300));
        assert_eq!(report.read_bytes_per_sec(), 60.0 * 64.0 / 0.3);
        assert!(monitor.buffer().is_zero());
    }

    #[test]
    fn test_event_counts_cover_every_view() {
        let mut monitor = spr_monitor(ScriptedPort::steady(2, 10));
        monitor.get_events().unwrap();
        let counts = monitor.event_counts();
        assert_eq!(counts.len(), 2 * eagle_stream::EVENTS.len() * 3);

        let ucrdf_hit = counts
            .iter()
            .find(|c| c.socket == 1 && c.event == "UCRdF" && c.filter == EventFilter::Hit)
            .unwrap();
        assert_eq!(ucrdf_hit.value, 0);
    }

    #[test]
    fn test_failed_cycle_keeps_previous_counts() {
        let mut monitor = spr_monitor(ScriptedPort::steady(1, 10).fail_reads_after(20));
        monitor.get_events().unwrap();
        let before = monitor.buffer().clone();

        assert!(monitor.get_events().is_err());
        assert_eq!(monitor.buffer(), &before);
    }
}
