//! Grantley (Haswell-EP, Broadwell-EP/DE, Knights Landing)
//!
//! Codes pack the CBo opcode filter in bits 20-28, bit 16 selects the
//! miss-only TOR umask and bit 17 restricts the count to the IIO thread ID.
//! The second code of each pair counts every lookup, so hits are derived as
//! total minus miss.

use super::{CodeEncoding, CompanionKind, EventSpec, PlatformTable};

pub const PCI_RD_CUR: usize = 0;
pub const RFO: usize = 1;
pub const CRD: usize = 2;
pub const DRD: usize = 3;
pub const ITOM: usize = 4;
pub const PRD: usize = 5;
pub const WIL: usize = 6;

pub const EVENTS: &[EventSpec] = &[
    EventSpec::paired("PCIRdCur", 0x19e10000, 0x19e00000),
    EventSpec::paired("RFO", 0x18030000, 0x18020000),
    EventSpec::paired("CRd", 0x18110000, 0x18100000),
    EventSpec::paired("DRd", 0x18210000, 0x18200000),
    EventSpec::paired("ItoM", 0x1c830000, 0x1c820000),
    EventSpec::paired("PRd", 0x18710000, 0x18700000),
    EventSpec::paired("WiL", 0x18f10000, 0x18f00000),
];

pub const TABLE: PlatformTable = PlatformTable {
    name: "Grantley",
    events: EVENTS,
    group_sizes: &[1; 14],
    companion: CompanionKind::Total,
    encoding: CodeEncoding::CboFilter,
};
