pub mod pcie;

pub use pcie::PcieMetricExporter;
