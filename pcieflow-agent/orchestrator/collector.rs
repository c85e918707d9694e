// Collection orchestrator
// Drives the PCIe exporter on a fixed interval until cancelled

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::counters::pcie::CounterAccessPort;
use crate::prom::PcieMetricExporter;

pub struct MetricCollector<P: CounterAccessPort> {
    exporter: Arc<PcieMetricExporter<P>>,
    interval: Duration,
}

impl<P: CounterAccessPort + Send + 'static> MetricCollector<P> {
    pub fn new(exporter: PcieMetricExporter<P>, interval: Duration) -> Self {
        Self {
            exporter: Arc::new(exporter),
            interval,
        }
    }

    /// Shared handle for the metrics endpoint
    pub fn exporter(&self) -> Arc<PcieMetricExporter<P>> {
        Arc::clone(&self.exporter)
    }

    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tracing::info!(
            "Starting PCIe collection loop every {:?}",
            self.interval
        );

        tokio::spawn(async move {
            self.collection_loop(cancel_token).await;
        })
    }

    async fn collection_loop(self, cancel_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("Collection loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.exporter.collect().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::arch::models;
    use crate::counters::pcie::testing::{no_sleep, ScriptedPort};
    use crate::counters::pcie::{create_platform, PcieMonitor};

    #[tokio::test]
    async fn test_loop_stops_on_cancel() {
        let platform = create_platform(models::SKX, 1400)
            .unwrap()
            .with_sleeper(no_sleep);
        let exporter =
            PcieMetricExporter::new(PcieMonitor::new(platform, ScriptedPort::steady(1, 1)))
                .unwrap();
        let collector = MetricCollector::new(exporter, Duration::from_millis(5));
        let exporter = collector.exporter();

        let token = CancellationToken::new();
        let handle = collector.start(token.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        handle.await.unwrap();

        let families = exporter.registry().gather();
        assert!(families.iter().any(|f| f.get_name() == "pcie_bandwidth"));
    }
}
