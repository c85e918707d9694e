//! MSR (Model-Specific Register) read/write primitives
//!
//! The `/dev/cpu/N/msr` device maps each MSR address to a file offset, so an
//! access is a seek followed by an 8-byte read or write. [`read_at`] and
//! [`write_at`] work on any seekable handle, which lets callers keep the
//! device open between accesses. [`read_msr`] and [`write_msr`] are one-shot
//! helpers that open the device themselves.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;

pub type Result<T> = std::result::Result<T, MsrError>;

/// Errors that can occur during MSR operations
#[derive(Debug, thiserror::Error)]
pub enum MsrError {
    #[error("Failed to open MSR device for CPU {cpu}: {source}")]
    OpenFailed { cpu: u32, source: std::io::Error },

    #[error("Failed to read MSR 0x{msr:X} on CPU {cpu}: {source}")]
    ReadFailed {
        cpu: u32,
        msr: u64,
        source: std::io::Error,
    },

    #[error("Failed to write MSR 0x{msr:X} on CPU {cpu}: {source}")]
    WriteFailed {
        cpu: u32,
        msr: u64,
        source: std::io::Error,
    },

    #[error("Failed to seek to MSR 0x{msr:X} on CPU {cpu}: {source}")]
    SeekFailed {
        cpu: u32,
        msr: u64,
        source: std::io::Error,
    },
}

/// Path of the MSR device node for a CPU
pub fn device_path(cpu: u32) -> String {
    format!("/dev/cpu/{cpu}/msr")
}

/// Open the MSR device of `cpu` for reading and writing
pub fn open_device(cpu: u32) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_SYNC)
        .open(device_path(cpu))
        .map_err(|source| MsrError::OpenFailed { cpu, source })
}

/// Read the MSR at `msr` through an already open device handle
///
/// `cpu` is only used to label errors.
pub fn read_at<D: Read + Seek>(device: &mut D, cpu: u32, msr: u64) -> Result<u64> {
    device
        .seek(SeekFrom::Start(msr))
        .map_err(|source| MsrError::SeekFailed { cpu, msr, source })?;

    let mut buffer = [0u8; 8];
    device
        .read_exact(&mut buffer)
        .map_err(|source| MsrError::ReadFailed { cpu, msr, source })?;

    Ok(u64::from_le_bytes(buffer))
}

/// Write `value` to the MSR at `msr` through an already open device handle
pub fn write_at<D: Write + Seek>(device: &mut D, cpu: u32, msr: u64, value: u64) -> Result<()> {
    device
        .seek(SeekFrom::Start(msr))
        .map_err(|source| MsrError::SeekFailed { cpu, msr, source })?;

    device
        .write_all(&value.to_le_bytes())
        .map_err(|source| MsrError::WriteFailed { cpu, msr, source })?;

    Ok(())
}

/// Read a 64-bit value from an MSR
///
/// # Errors
///
/// Fails if the device cannot be opened (the `msr` module is not loaded, or
/// the process lacks CAP_SYS_RAWIO) or the address is not readable.
pub fn read_msr(cpu: u32, msr: u64) -> Result<u64> {
    let mut device = File::open(device_path(cpu))
        .map_err(|source| MsrError::OpenFailed { cpu, source })?;
    read_at(&mut device, cpu, msr)
}

/// Write a 64-bit value to an MSR
///
/// # Safety
///
/// Writing the wrong value to an MSR can hang or crash the machine. Validate
/// typed layouts with `RegisterLayout::validate()` before encoding them.
pub fn write_msr(cpu: u32, msr: u64, value: u64) -> Result<()> {
    let mut device = open_device(cpu)?;
    write_at(&mut device, cpu, msr, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_msr_error_display() {
        let err = MsrError::OpenFailed {
            cpu: 0,
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("Failed to open MSR device"));
    }

    #[test]
    fn test_write_then_read_at_offset() {
        let mut device = Cursor::new(vec![0u8; 0x40]);
        write_at(&mut device, 3, 0x18, 0x0123_4567_89AB_CDEF).unwrap();

        assert_eq!(read_at(&mut device, 3, 0x18).unwrap(), 0x0123_4567_89AB_CDEF);
        assert_eq!(read_at(&mut device, 3, 0x10).unwrap(), 0);
    }

    #[test]
    fn test_short_read_reports_address() {
        let mut device = Cursor::new(vec![0u8; 4]);
        let err = read_at(&mut device, 1, 0x2).unwrap_err();
        assert!(matches!(err, MsrError::ReadFailed { cpu: 1, msr: 0x2, .. }));
        assert!(err.to_string().contains("0x2"));
    }
}
