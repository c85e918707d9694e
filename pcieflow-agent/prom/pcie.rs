use parking_lot::Mutex;
use prometheus::{GaugeVec, Opts, Registry};
use std::sync::Arc;

use crate::counters::pcie::{CounterAccessPort, CycleReport, PcieMonitor};
use crate::error::Result;
use crate::metrics::pcie::Direction;

pub struct PcieMetricExporter<P: CounterAccessPort> {
    registry: Arc<Registry>,
    monitor: Arc<Mutex<PcieMonitor<P>>>,
    bandwidth: GaugeVec,
    bytes: GaugeVec,
    event_count: GaugeVec,
}

impl<P: CounterAccessPort + Send + 'static> PcieMetricExporter<P> {
    pub fn new(monitor: PcieMonitor<P>) -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let instance_label = std::env::var("INSTANCE_LABEL").unwrap_or_else(|_| "none".to_string());
        let platform = monitor.platform().name();

        let bandwidth = GaugeVec::new(
            Opts::new("pcie_bandwidth", "PCIe bandwidth in bytes per second")
                .const_label("instance", &instance_label)
                .const_label("platform", platform),
            &["direction"],
        )?;
        let bytes = GaugeVec::new(
            Opts::new("pcie_bytes", "PCIe bytes counted in the last collection cycle")
                .const_label("instance", &instance_label)
                .const_label("platform", platform),
            &["direction"],
        )?;
        let event_count = GaugeVec::new(
            Opts::new(
                "pcie_event_count",
                "PCIe transactions counted in the last collection cycle",
            )
            .const_label("instance", &instance_label)
            .const_label("platform", platform),
            &["socket", "event", "filter"],
        )?;

        registry.register(Box::new(bandwidth.clone()))?;
        registry.register(Box::new(bytes.clone()))?;
        registry.register(Box::new(event_count.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            monitor: Arc::new(Mutex::new(monitor)),
            bandwidth,
            bytes,
            event_count,
        })
    }

    /// Run one collection cycle off the async runtime and publish it
    ///
    /// A failed cycle is logged and leaves the gauges at their last values.
    pub async fn collect(&self) {
        let monitor = Arc::clone(&self.monitor);
        let cycle = tokio::task::spawn_blocking(move || monitor.lock().collect_cycle()).await;

        match cycle {
            Ok(Ok(report)) => self.publish(&report),
            Ok(Err(e)) => tracing::error!("PCIe collection cycle failed: {}", e),
            Err(e) => tracing::error!("PCIe collection task panicked: {}", e),
        }
    }

    pub fn publish(&self, report: &CycleReport) {
        let (read_rate, write_rate) = report.bandwidth.per_second(report.window);

        for direction in Direction::all() {
            let (rate, bytes) = match direction {
                Direction::Read => (read_rate, report.bandwidth.read_bytes),
                Direction::Write => (write_rate, report.bandwidth.write_bytes),
            };
            self.bandwidth
                .with_label_values(&[direction.name()])
                .set(rate);
            self.bytes
                .with_label_values(&[direction.name()])
                .set(bytes as f64);
        }

        for count in &report.events {
            let socket = count.socket.to_string();
            self.event_count
                .with_label_values(&[socket.as_str(), count.event, count.filter.name()])
                .set(count.value as f64);
        }

        tracing::debug!(
            "PCIe bandwidth: read {:.0} B/s, write {:.0} B/s",
            read_rate,
            write_rate
        );
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }
}
