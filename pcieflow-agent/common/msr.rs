use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use crate::common::affinity::CpuPinGuard;
use crate::error::Result;

/// Open `/dev/cpu/N/msr` handle kept for the lifetime of the process
pub struct MsrHandle {
    file: Mutex<File>,
    cpu_id: u32,
}

impl MsrHandle {
    pub fn new(cpu: u32) -> Result<Self> {
        let file = pcieflow_raw::msr::open_device(cpu)?;

        tracing::info!("Opened MSR handle {} for core {}", file.as_raw_fd(), cpu);

        Ok(Self {
            file: Mutex::new(file),
            cpu_id: cpu,
        })
    }

    pub fn read(&self, addr: u64) -> Result<u64> {
        let _pin = CpuPinGuard::new(self.cpu_id)?;
        let mut file = self.file.lock();

        let value = pcieflow_raw::msr::read_at(&mut *file, self.cpu_id, addr)?;
        tracing::debug!(
            "MSR read: CPU {} MSR 0x{:08x} = 0x{:016x}",
            self.cpu_id,
            addr,
            value
        );
        Ok(value)
    }

    pub fn write(&self, addr: u64, value: u64) -> Result<()> {
        let _pin = CpuPinGuard::new(self.cpu_id)?;
        let mut file = self.file.lock();

        pcieflow_raw::msr::write_at(&mut *file, self.cpu_id, addr, value)?;
        tracing::debug!(
            "MSR write: CPU {} MSR 0x{:08x} <- 0x{:016x}",
            self.cpu_id,
            addr,
            value
        );
        Ok(())
    }

    pub fn cpu_id(&self) -> u32 {
        self.cpu_id
    }
}

/// MSR access by CPU number
pub trait MsrAccess {
    fn read(&self, cpu: u32, addr: u64) -> Result<u64>;
    fn write(&self, cpu: u32, addr: u64, value: u64) -> Result<()>;
}

impl<T: MsrAccess + ?Sized> MsrAccess for &T {
    fn read(&self, cpu: u32, addr: u64) -> Result<u64> {
        (**self).read(cpu, addr)
    }

    fn write(&self, cpu: u32, addr: u64, value: u64) -> Result<()> {
        (**self).write(cpu, addr, value)
    }
}

/// Process-wide cache of MSR handles, one per CPU
pub struct Msr {
    handles: RwLock<HashMap<u32, Arc<MsrHandle>>>,
}

impl Msr {
    fn new() -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
        }
    }

    pub fn instance() -> &'static Msr {
        static INSTANCE: Lazy<Msr> = Lazy::new(Msr::new);
        &INSTANCE
    }

    fn get_handle(&self, cpu: u32) -> Result<Arc<MsrHandle>> {
        {
            let handles = self.handles.read();
            if let Some(handle) = handles.get(&cpu) {
                return Ok(Arc::clone(handle));
            }
        }

        let mut handles = self.handles.write();
        if let Some(handle) = handles.get(&cpu) {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(MsrHandle::new(cpu)?);
        handles.insert(cpu, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn read(&self, cpu: u32, addr: u64) -> Result<u64> {
        self.get_handle(cpu)?.read(addr)
    }

    pub fn write(&self, cpu: u32, addr: u64, value: u64) -> Result<()> {
        self.get_handle(cpu)?.write(addr, value)
    }
}

impl MsrAccess for Msr {
    fn read(&self, cpu: u32, addr: u64) -> Result<u64> {
        Msr::read(self, cpu, addr)
    }

    fn write(&self, cpu: u32, addr: u64, value: u64) -> Result<()> {
        Msr::write(self, cpu, addr, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msr_singleton() {
        let msr1 = Msr::instance();
        let msr2 = Msr::instance();
        assert!(std::ptr::eq(msr1, msr2));
    }

    #[test]
    fn test_missing_cpu_fails_to_open() {
        let result = Msr::instance().read(u32::MAX, 0x10);
        assert!(result.is_err());
    }
}
