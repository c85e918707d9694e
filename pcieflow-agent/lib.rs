// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod common;
pub mod config;
pub mod counters;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod prom;

pub use config::ExportConfig;
pub use counters::pcie::{
    create_platform, CounterAccessPort, MsrCounterPort, PcieMonitor, Platform, PlatformKind,
    SampleBuffer,
};
pub use error::{PcieflowError, Result};
pub use metrics::pcie::{Bandwidth, EventFilter};
pub use orchestrator::MetricCollector;
pub use prom::PcieMetricExporter;
