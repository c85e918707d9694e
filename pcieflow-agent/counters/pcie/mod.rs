//! PCIe bandwidth engine
//!
//! The CHA/CBo boxes have four programmable counters, far fewer than the raw
//! PCIe event codes a platform needs. Codes are therefore split into groups
//! that take turns on the counters. Each group runs for one slice per cycle
//! and its deltas are scaled by the number of groups to estimate the full
//! cycle. The accumulated counts then feed the platform's bandwidth formula.

pub mod buffer;
pub mod descriptor;
pub mod monitor;
pub mod platform;
pub mod port;
pub mod sampler;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::SampleBuffer;
pub use descriptor::{EventGroup, LogicalEvent, PlatformDescriptor};
pub use monitor::{CycleReport, EventCount, PcieMonitor};
pub use platform::{create_platform, Platform, PlatformKind};
pub use port::{CounterAccessPort, MsrCounterPort};
pub use sampler::{DifferencePolicy, RawSnapshot};
pub use scheduler::{EventGroupScheduler, Sleeper};
