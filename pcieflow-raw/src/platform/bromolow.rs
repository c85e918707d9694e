//! Bromolow (Jaketown, Ivytown)

use super::{CodeEncoding, CompanionKind, EventSpec, PlatformTable};

pub const PCIE_RD_CUR: usize = 0;
pub const PCIE_NS_RD: usize = 1;
pub const PCIE_WILF: usize = 2;
pub const PCIE_ITOM: usize = 3;
pub const PCIE_NS_WR: usize = 4;
pub const PCIE_NS_WRF: usize = 5;

pub const EVENTS: &[EventSpec] = &[
    EventSpec::paired("PCIeRdCur", 0x19e10000, 0x19e00000),
    EventSpec::paired("PCIeNSRd", 0x1e410000, 0x1e400000),
    EventSpec::paired("PCIeWiLF", 0x19410000, 0x19400000),
    EventSpec::paired("PCIeItoM", 0x19c10000, 0x19c00000),
    EventSpec::paired("PCIeNSWr", 0x1e510000, 0x1e500000),
    EventSpec::paired("PCIeNSWrF", 0x1e610000, 0x1e600000),
];

pub const TABLE: PlatformTable = PlatformTable {
    name: "Bromolow",
    events: EVENTS,
    group_sizes: &[1; 12],
    companion: CompanionKind::Total,
    encoding: CodeEncoding::CboFilter,
};
