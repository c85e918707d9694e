//! Birch Stream (Sierra Forest)
//!
//! Shares the Eagle Stream CHA encodings and event list.

use super::{eagle_stream, PlatformTable};

pub use eagle_stream::{
    EVENTS, ITOM, ITOM_CACHE_NEAR, PCI_RD_CUR, UC_RDF, WCIL, WCILF, WIL,
};

pub const TABLE: PlatformTable = PlatformTable {
    name: "BirchStream",
    ..eagle_stream::TABLE
};
