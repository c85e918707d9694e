//! Eagle Stream (Sapphire Rapids, Emerald Rapids)
//!
//! CHA TOR inserts with the IIO request queue selected. The codes are full
//! counter control values; bits 32 and up carry the extended umask that picks
//! the opcode and the hit/miss state (`...FE...` = miss, `...FD...` = hit).

use super::{CodeEncoding, CompanionKind, EventSpec, PlatformTable};

pub const PCI_RD_CUR: usize = 0;
pub const ITOM: usize = 1;
pub const ITOM_CACHE_NEAR: usize = 2;
pub const UC_RDF: usize = 3;
pub const WIL: usize = 4;
pub const WCIL: usize = 5;
pub const WCILF: usize = 6;

pub const EVENTS: &[EventSpec] = &[
    EventSpec::paired("PCIRdCur", 0xC8F3FE00000435, 0xC8F3FD00000435),
    EventSpec::paired("ItoM", 0xCC43FE00000435, 0xCC43FD00000435),
    EventSpec::paired("ItoMCacheNear", 0xCD43FE00000435, 0xCD43FD00000435),
    EventSpec::miss_only("UCRdF", 0xC877DE00000135),
    EventSpec::miss_only("WiL", 0xC87FDE00000135),
    EventSpec::miss_only("WCiL", 0xC86FFE00000135),
    EventSpec::miss_only("WCiLF", 0xC867FE00000135),
];

pub const TABLE: PlatformTable = PlatformTable {
    name: "EagleStream",
    events: EVENTS,
    group_sizes: &[4, 4, 2],
    companion: CompanionKind::Hit,
    encoding: CodeEncoding::Raw,
};
