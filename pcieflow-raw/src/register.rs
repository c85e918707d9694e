//! Typed views over raw 64-bit register and event-code values

/// Conversion between a structured layout and the raw 64-bit value that is
/// written to (or decoded from) an MSR or a packed event code.
///
/// # Example
///
/// ```ignore
/// use pcieflow_raw::register::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct Toggle {
///     enable: bool,
///     threshold: u8,
/// }
///
/// impl RegisterLayout for Toggle {
///     fn to_msr_value(&self) -> u64 {
///         u64::from(self.enable) | ((self.threshold as u64) << 8)
///     }
///
///     fn from_msr_value(value: u64) -> Self {
///         Self {
///             enable: (value & 1) != 0,
///             threshold: ((value >> 8) & 0xFF) as u8,
///         }
///     }
/// }
/// ```
pub trait RegisterLayout: Sized {
    /// Encode this layout as a raw register value
    fn to_msr_value(&self) -> u64;

    /// Decode a raw register value
    fn from_msr_value(value: u64) -> Self;

    /// Check that every field fits its bit range
    fn validate(&self) -> Result<(), &'static str> {
        Ok(())
    }
}
