use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PcieflowError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Failed to program PCIe event group: {0}")]
    HardwareProgrammingFailure(String),

    #[error("Failed to read PCIe counter: {0}")]
    CounterReadFailure(String),

    #[error("MSR operation failed: {0}")]
    MsrError(#[from] pcieflow_raw::MsrError),

    #[error("Affinity operation failed: {0}")]
    AffinityError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Nix error: {0}")]
    NixError(#[from] nix::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, PcieflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msr_error_converts() {
        let raw = pcieflow_raw::MsrError::OpenFailed {
            cpu: 2,
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let err: PcieflowError = raw.into();
        assert!(matches!(err, PcieflowError::MsrError(_)));
        assert!(err.to_string().contains("CPU 2"));
    }
}
