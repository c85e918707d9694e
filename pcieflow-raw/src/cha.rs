//! CHA/CBo (Caching/Home Agent, Cache Box) register definitions
//!
//! PCIe transactions are counted as TOR (Table of Requests) inserts in the
//! LLC slice boxes. Each box has 4 programmable 48-bit counters. The box MSR
//! block moved between generations, so the addresses are described by a
//! [`ChaLayout`] per generation instead of fixed constants.
//!
//! ## References
//!
//! - Intel Xeon Processor E5/E7 v2-v4 Uncore Performance Monitoring Guides
//! - Intel Xeon Processor Scalable Family Uncore Performance Monitoring Reference Manual
//! - 3rd/4th Gen Intel Xeon Scalable Processors Uncore Performance Monitoring Guides

use crate::register::RegisterLayout;

/// Bit width of CHA/CBo counters
pub const COUNTER_WIDTH_BITS: u64 = 48;

/// Mask selecting the valid bits of a counter read
pub const COUNTER_MASK: u64 = (1u64 << COUNTER_WIDTH_BITS) - 1;

/// TOR_INSERTS event select
pub const TOR_INSERTS: u8 = 0x35;

/// Thread ID of the IIO agent in the CBo filter (Jaketown through Broadwell)
pub const IIO_TID: u64 = 0x3E;

/// Box control register flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxControlStyle {
    /// reset control (0), reset counters (1), freeze (8), freeze enable (16)
    Legacy,
    /// freeze (0), reset control (8), reset counters (9)
    Spr,
}

/// Where the CBo opcode filter lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeFilter {
    /// Opcode in FILTER0 bits 23-31 (Jaketown)
    Filter0Shift23,
    /// Opcode in FILTER1 bits 20-28 (Ivytown, Haswell-EP, Broadwell-EP)
    Filter1Shift20,
    /// Opcode carried in the SKX FILTER1 value itself
    SkxFilter1,
    /// No filter registers; opcode selected by the extended umask
    None,
}

/// MSR block of one generation's CHA/CBo boxes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChaLayout {
    pub name: &'static str,
    pub box_ctl: u64,
    pub counter_ctl0: u64,
    pub counter0: u64,
    pub filter0: Option<u64>,
    pub filter1: Option<u64>,
    pub box_stride: u64,
    pub max_boxes: usize,
    pub box_style: BoxControlStyle,
    pub opcode_filter: OpcodeFilter,
}

impl ChaLayout {
    pub const fn box_base(&self, box_index: usize) -> u64 {
        box_index as u64 * self.box_stride
    }

    pub const fn box_control(&self, box_index: usize) -> u64 {
        self.box_ctl + self.box_base(box_index)
    }

    pub const fn counter_control(&self, box_index: usize, counter: usize) -> u64 {
        self.counter_ctl0 + self.box_base(box_index) + counter as u64
    }

    pub const fn counter_value(&self, box_index: usize, counter: usize) -> u64 {
        self.counter0 + self.box_base(box_index) + counter as u64
    }

    pub fn filter0_address(&self, box_index: usize) -> Option<u64> {
        self.filter0.map(|addr| addr + self.box_base(box_index))
    }

    pub fn filter1_address(&self, box_index: usize) -> Option<u64> {
        self.filter1.map(|addr| addr + self.box_base(box_index))
    }

    /// Box control value that freezes the box and clears its counters and controls
    pub fn freeze_and_reset(&self) -> u64 {
        match self.box_style {
            BoxControlStyle::Legacy => ChaBoxControl {
                reset_control: true,
                reset_counters: true,
                freeze: true,
                freeze_enable: true,
            }
            .to_msr_value(),
            BoxControlStyle::Spr => 0x1 | (1 << 8) | (1 << 9),
        }
    }

    /// Box control value that lets the counters run
    pub fn unfreeze(&self) -> u64 {
        match self.box_style {
            BoxControlStyle::Legacy => ChaBoxControl {
                freeze_enable: true,
                ..Default::default()
            }
            .to_msr_value(),
            BoxControlStyle::Spr => 0,
        }
    }
}

/// Jaketown CBo
pub const JKT_CBO: ChaLayout = ChaLayout {
    name: "JKT CBo",
    box_ctl: 0x0D04,
    counter_ctl0: 0x0D10,
    counter0: 0x0D16,
    filter0: Some(0x0D14),
    filter1: None,
    box_stride: 0x20,
    max_boxes: 8,
    box_style: BoxControlStyle::Legacy,
    opcode_filter: OpcodeFilter::Filter0Shift23,
};

/// Ivytown CBo
pub const IVT_CBO: ChaLayout = ChaLayout {
    name: "IVT CBo",
    box_ctl: 0x0D04,
    counter_ctl0: 0x0D10,
    counter0: 0x0D16,
    filter0: Some(0x0D14),
    filter1: Some(0x0D1A),
    box_stride: 0x20,
    max_boxes: 15,
    box_style: BoxControlStyle::Legacy,
    opcode_filter: OpcodeFilter::Filter1Shift20,
};

/// Haswell-EP / Broadwell-EP CBo
pub const HSX_CBO: ChaLayout = ChaLayout {
    name: "HSX CBo",
    box_ctl: 0x0E00,
    counter_ctl0: 0x0E01,
    counter0: 0x0E08,
    filter0: Some(0x0E05),
    filter1: Some(0x0E06),
    box_stride: 0x10,
    max_boxes: 24,
    box_style: BoxControlStyle::Legacy,
    opcode_filter: OpcodeFilter::Filter1Shift20,
};

/// Skylake-SP / Cascade Lake-SP CHA
pub const SKX_CHA: ChaLayout = ChaLayout {
    name: "SKX CHA",
    box_ctl: 0x0E00,
    counter_ctl0: 0x0E01,
    counter0: 0x0E08,
    filter0: Some(0x0E05),
    filter1: Some(0x0E06),
    box_stride: 0x10,
    max_boxes: 28,
    box_style: BoxControlStyle::Legacy,
    opcode_filter: OpcodeFilter::SkxFilter1,
};

/// Ice Lake-SP CHA
pub const ICX_CHA: ChaLayout = ChaLayout {
    name: "ICX CHA",
    box_ctl: 0x0E00,
    counter_ctl0: 0x0E01,
    counter0: 0x0E08,
    filter0: None,
    filter1: None,
    box_stride: 0x0E,
    max_boxes: 40,
    box_style: BoxControlStyle::Legacy,
    opcode_filter: OpcodeFilter::None,
};

/// Knights Landing CHA
pub const KNL_CHA: ChaLayout = ChaLayout {
    name: "KNL CHA",
    box_ctl: 0x0E00,
    counter_ctl0: 0x0E01,
    counter0: 0x0E08,
    filter0: Some(0x0E05),
    filter1: Some(0x0E06),
    box_stride: 0x0C,
    max_boxes: 38,
    box_style: BoxControlStyle::Legacy,
    opcode_filter: OpcodeFilter::Filter1Shift20,
};

/// Snow Ridge CHA
pub const SNR_CHA: ChaLayout = ChaLayout {
    name: "SNR CHA",
    box_ctl: 0x1C00,
    counter_ctl0: 0x1C01,
    counter0: 0x1C08,
    filter0: None,
    filter1: None,
    box_stride: 0x10,
    max_boxes: 6,
    box_style: BoxControlStyle::Legacy,
    opcode_filter: OpcodeFilter::None,
};

/// Sapphire Rapids and later CHA
pub const SPR_CHA: ChaLayout = ChaLayout {
    name: "SPR CHA",
    box_ctl: 0x2000,
    counter_ctl0: 0x2002,
    counter0: 0x2008,
    filter0: None,
    filter1: None,
    box_stride: 0x10,
    max_boxes: 128,
    box_style: BoxControlStyle::Spr,
    opcode_filter: OpcodeFilter::None,
};

/// Legacy-style box control register
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChaBoxControl {
    /// Reset all control registers (bit 0)
    pub reset_control: bool,
    /// Reset all counters (bit 1)
    pub reset_counters: bool,
    /// Freeze the box (bit 8)
    pub freeze: bool,
    /// Allow freezing (bit 16)
    pub freeze_enable: bool,
}

impl RegisterLayout for ChaBoxControl {
    fn to_msr_value(&self) -> u64 {
        u64::from(self.reset_control)
            | (u64::from(self.reset_counters) << 1)
            | (u64::from(self.freeze) << 8)
            | (u64::from(self.freeze_enable) << 16)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            reset_control: (value & 1) != 0,
            reset_counters: (value & (1 << 1)) != 0,
            freeze: (value & (1 << 8)) != 0,
            freeze_enable: (value & (1 << 16)) != 0,
        }
    }
}

/// CHA/CBo counter control register
///
/// ## Register Format
///
/// | Bits   | Field               | Description                          |
/// |--------|---------------------|--------------------------------------|
/// | 0-7    | event_select        | Event code to count                  |
/// | 8-15   | unit_mask           | Event sub-select (umask)             |
/// | 17     | reset_counter       | Reset counter on programming         |
/// | 18     | edge_detect         | Count rising edges vs level          |
/// | 19     | tid_enable          | Apply the box TID filter             |
/// | 22     | enable              | Enable counter                       |
/// | 23     | invert              | Invert threshold comparison          |
/// | 24-31  | threshold           | Threshold for filtering              |
/// | 32-63  | umask_ext           | Extended umask (ICX and later)       |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChaCounterControl {
    pub event_select: u8,
    pub unit_mask: u8,
    pub reset_counter: bool,
    pub edge_detect: bool,
    pub tid_enable: bool,
    pub enable: bool,
    pub invert: bool,
    pub threshold: u8,
    pub umask_ext: u32,
}

impl ChaCounterControl {
    /// TOR_INSERTS with the given umask, enabled
    pub fn tor_inserts(unit_mask: u8) -> Self {
        Self {
            event_select: TOR_INSERTS,
            unit_mask,
            enable: true,
            ..Default::default()
        }
    }
}

impl RegisterLayout for ChaCounterControl {
    fn to_msr_value(&self) -> u64 {
        (self.event_select as u64)
            | ((self.unit_mask as u64) << 8)
            | (u64::from(self.reset_counter) << 17)
            | (u64::from(self.edge_detect) << 18)
            | (u64::from(self.tid_enable) << 19)
            | (u64::from(self.enable) << 22)
            | (u64::from(self.invert) << 23)
            | ((self.threshold as u64) << 24)
            | ((self.umask_ext as u64) << 32)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            event_select: (value & 0xFF) as u8,
            unit_mask: ((value >> 8) & 0xFF) as u8,
            reset_counter: (value & (1 << 17)) != 0,
            edge_detect: (value & (1 << 18)) != 0,
            tid_enable: (value & (1 << 19)) != 0,
            enable: (value & (1 << 22)) != 0,
            invert: (value & (1 << 23)) != 0,
            threshold: ((value >> 24) & 0xFF) as u8,
            umask_ext: (value >> 32) as u32,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.event_select == 0 {
            return Err("Event select must be non-zero");
        }
        Ok(())
    }
}

/// SKX TOR umask bits
pub mod skx_umask {
    pub const IRQ: u8 = 0x01;
    pub const PRQ: u8 = 0x04;
    pub const HIT: u8 = 0x10;
    pub const MISS: u8 = 0x20;
}

/// CBo TOR umask values (Jaketown through Broadwell)
pub mod cbo_umask {
    /// Inserts matching the opcode filter
    pub const OPCODE: u8 = 0x01;
    /// Inserts matching the opcode filter that missed the LLC
    pub const MISS_OPCODE: u8 = 0x03;
}

/// Packed SKX PCIe event code (a CHA FILTER1 value plus a hit select)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkxPcieFilter {
    /// Remote/local/near-memory/not-near-memory selects (bits 0, 1, 4, 5)
    pub match_bits: u8,
    /// Count hits instead of misses (bit 2)
    pub hit: bool,
    /// Match every opcode (bit 3)
    pub all_opcodes: bool,
    /// Opcode 0 (bits 9-18)
    pub opcode: u16,
    /// Non-coherent IRQ queue instead of PRQ (bit 30)
    pub non_coherent: bool,
}

impl SkxPcieFilter {
    const MATCH_MASK: u64 = 0x33;

    /// Value for the CHA FILTER1 register (the hit select cleared)
    pub fn filter1_value(&self) -> u64 {
        Self {
            hit: false,
            ..*self
        }
        .to_msr_value()
    }

    /// Counter control that counts the selected TOR inserts
    pub fn counter_control(&self) -> ChaCounterControl {
        let queue = if self.non_coherent {
            skx_umask::IRQ
        } else {
            skx_umask::PRQ
        };
        let state = if self.hit {
            skx_umask::HIT
        } else {
            skx_umask::MISS
        };
        ChaCounterControl::tor_inserts(queue | state)
    }
}

impl RegisterLayout for SkxPcieFilter {
    fn to_msr_value(&self) -> u64 {
        (self.match_bits as u64 & Self::MATCH_MASK)
            | (u64::from(self.hit) << 2)
            | (u64::from(self.all_opcodes) << 3)
            | ((self.opcode as u64 & 0x3FF) << 9)
            | (u64::from(self.non_coherent) << 30)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            match_bits: (value & Self::MATCH_MASK) as u8,
            hit: (value & (1 << 2)) != 0,
            all_opcodes: (value & (1 << 3)) != 0,
            opcode: ((value >> 9) & 0x3FF) as u16,
            non_coherent: (value & (1 << 30)) != 0,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.opcode > 0x3FF {
            return Err("Opcode must be <= 0x3FF (10 bits)");
        }
        Ok(())
    }
}

/// Packed CBo PCIe event code (Jaketown through Broadwell)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CboPcieFilter {
    /// Count only LLC misses (bit 16)
    pub miss_only: bool,
    /// Restrict to the IIO thread ID (bit 17)
    pub iio_tid: bool,
    /// Opcode (bits 20-28)
    pub opcode: u16,
}

impl CboPcieFilter {
    /// Counter control that counts the selected TOR inserts
    pub fn counter_control(&self) -> ChaCounterControl {
        let umask = if self.miss_only {
            cbo_umask::MISS_OPCODE
        } else {
            cbo_umask::OPCODE
        };
        ChaCounterControl {
            tid_enable: self.iio_tid,
            ..ChaCounterControl::tor_inserts(umask)
        }
    }

    /// TID filter field for FILTER0
    pub fn tid_filter(&self) -> u64 {
        if self.iio_tid {
            IIO_TID
        } else {
            0
        }
    }

    /// (FILTER0, FILTER1) values for the given opcode filter placement
    pub fn filter_values(&self, placement: OpcodeFilter) -> (u64, u64) {
        let opcode = self.opcode as u64;
        match placement {
            OpcodeFilter::Filter0Shift23 => (self.tid_filter() | (opcode << 23), 0),
            _ => (self.tid_filter(), opcode << 20),
        }
    }
}

impl RegisterLayout for CboPcieFilter {
    fn to_msr_value(&self) -> u64 {
        (u64::from(self.miss_only) << 16)
            | (u64::from(self.iio_tid) << 17)
            | ((self.opcode as u64 & 0x1FF) << 20)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            miss_only: (value & (1 << 16)) != 0,
            iio_tid: (value & (1 << 17)) != 0,
            opcode: ((value >> 20) & 0x1FF) as u16,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.opcode > 0x1FF {
            return Err("Opcode must be <= 0x1FF (9 bits)");
        }
        Ok(())
    }
}
