pub mod affinity;
pub mod arch;
pub mod cpuid;
pub mod msr;

pub use affinity::CpuPinGuard;
pub use arch::{CpuSignature, CPU_SIGNATURE};
pub use msr::{Msr, MsrAccess, MsrHandle};
