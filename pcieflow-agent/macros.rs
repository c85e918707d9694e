//! Declarative macros shared across the pcieflow agent

/// Define a label enum with automatic `name()` and `all()` implementations
///
/// # Example
/// ```
/// use pcieflow::metric_enum;
///
/// metric_enum! {
///     pub enum Direction {
///         Read => "read",
///         Write => "write",
///     }
/// }
///
/// let direction = Direction::Read;
/// assert_eq!(direction.name(), "read");
/// assert_eq!(Direction::all().len(), 2);
/// ```
///
/// Expands to:
/// - An enum with Debug, Clone, Copy, PartialEq, Eq, Hash derives
/// - A `name(&self) -> &'static str` method
/// - An `all() -> Vec<Self>` method
#[macro_export]
macro_rules! metric_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $str:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn all() -> Vec<$name> {
                vec![$($name::$variant,)*]
            }
        }
    };
}

/// Encode an exporter's registry into a text buffer, logging failures
///
/// # Example
/// ```ignore
/// // In main.rs metrics handler
/// let mut buffer = Vec::new();
/// gather_metrics!(buffer, encoder, state.exporter, "PCIe");
/// ```
#[macro_export]
macro_rules! gather_metrics {
    ($buffer:expr, $encoder:expr, $exporter:expr, $name:literal) => {
        let metric_families = $exporter.registry().gather();
        if let Err(e) = $encoder.encode(&metric_families, &mut $buffer) {
            tracing::error!(concat!("Failed to encode ", $name, " metrics: {}"), e);
        }
    };
}
