//! Purley (Skylake-SP, Cascade Lake-SP)
//!
//! Codes are CHA filter1 values: opcode in bits 9-18, locality and memory
//! type selects in bits 0-5, bit 30 selects the non-coherent (IRQ) queue.
//! Bit 2 is not a hardware filter field; it picks the TOR hit umask instead
//! of the miss umask. Only one opcode can be filtered at a time, so every
//! code is its own group.

use super::{CodeEncoding, CompanionKind, EventSpec, PlatformTable};

pub const PCI_RD_CUR: usize = 0;
pub const RFO: usize = 1;
pub const CRD: usize = 2;
pub const DRD: usize = 3;
pub const ITOM: usize = 4;
pub const PRD: usize = 5;
pub const WIL: usize = 6;

pub const EVENTS: &[EventSpec] = &[
    EventSpec::paired("PCIRdCur", 0x00043c33, 0x00043c37),
    EventSpec::paired("RFO", 0x00040033, 0x00040037),
    EventSpec::paired("CRd", 0x00040233, 0x00040237),
    EventSpec::paired("DRd", 0x00040433, 0x00040437),
    EventSpec::paired("ItoM", 0x00049033, 0x00049037),
    EventSpec::paired("PRd", 0x40040e33, 0x40040e37),
    EventSpec::paired("WiL", 0x40041e33, 0x40041e37),
];

pub const TABLE: PlatformTable = PlatformTable {
    name: "Purley",
    events: EVENTS,
    group_sizes: &[1; 14],
    companion: CompanionKind::Hit,
    encoding: CodeEncoding::SkxFilter,
};
