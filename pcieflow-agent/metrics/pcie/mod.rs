pub mod bandwidth;
pub mod types;

pub use bandwidth::{Bandwidth, BandwidthFormula, EventReader, CACHELINE_SIZE};
pub use types::{Direction, EventFilter};
