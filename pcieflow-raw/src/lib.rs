//! # pcieflow-raw
//!
//! Static hardware data for PCIe uncore traffic monitoring on Intel Xeon
//! servers, from Sandy Bridge-EP (Jaketown) through Sierra Forest.
//!
//! The crate holds no runtime state. It provides:
//!
//! - [`platform`]: per-generation PCIe event tables (logical event names, raw
//!   register codes, and how the raw codes are grouped onto the four
//!   programmable counters of a CHA/CBo box)
//! - [`cha`]: CHA/CBo box MSR layouts and typed views of the counter control
//!   registers and of the packed filter codes used by older generations
//! - [`msr`]: `/dev/cpu/*/msr` read/write primitives
//!
//! ## Usage
//!
//! ```ignore
//! use pcieflow_raw::platform::eagle_stream;
//!
//! let table = &eagle_stream::TABLE;
//! assert_eq!(table.raw_counter_count(), 10);
//! assert_eq!(table.group_sizes, &[4, 4, 2]);
//! ```

pub mod cha;
pub mod msr;
pub mod platform;
pub mod register;

pub use msr::{read_msr, write_msr, MsrError, Result};
pub use platform::{CodeEncoding, CompanionKind, EventSpec, PlatformTable};
pub use register::RegisterLayout;
