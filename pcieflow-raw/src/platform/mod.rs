//! PCIe uncore event tables, one module per Xeon platform generation
//!
//! Each table lists the logical PCIe transaction events the generation can
//! observe in its CHA/CBo boxes. Every logical event is backed by a "miss"
//! raw code and, on most events, a companion raw code that counts either the
//! hits ([`CompanionKind::Hit`]) or all lookups ([`CompanionKind::Total`]).
//!
//! The raw codes of a table, read in order (each event's miss code followed by
//! its companion), form the platform's raw-counter list. `group_sizes` cuts
//! that list into consecutive groups of at most [`MAX_COUNTERS_PER_GROUP`]
//! codes that are programmed together.
//!
//! | Platform    | CPUs            | Events | Raw codes | Groups        |
//! |-------------|-----------------|--------|-----------|---------------|
//! | BirchStream | SRF             | 7      | 10        | 4 + 4 + 2     |
//! | EagleStream | SPR, EMR        | 7      | 10        | 4 + 4 + 2     |
//! | Whitley     | ICX, SNR        | 5      | 8         | 4 + 4         |
//! | Purley      | SKX, CLX        | 7      | 14        | 14 x 1        |
//! | Grantley    | HSX, BDX, KNL   | 7      | 14        | 14 x 1        |
//! | Bromolow    | JKT, IVT        | 6      | 12        | 12 x 1        |

pub mod birch_stream;
pub mod bromolow;
pub mod eagle_stream;
pub mod grantley;
pub mod purley;
pub mod whitley;

/// Number of programmable counters in one CHA/CBo box
pub const MAX_COUNTERS_PER_GROUP: usize = 4;

/// What the second raw code of a logical event counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompanionKind {
    /// Lookups that hit; miss and hit are disjoint
    Hit,
    /// All lookups; the miss register is a subset of it
    Total,
}

/// How a raw code turns into register writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeEncoding {
    /// The code is a complete counter control value (ICX and later)
    Raw,
    /// The code packs an opcode filter and a hit/miss select for the SKX CHA
    SkxFilter,
    /// The code packs an opcode filter and miss/TID selects for the CBo
    /// (Jaketown through Broadwell)
    CboFilter,
}

/// One logical PCIe transaction event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSpec {
    pub name: &'static str,
    pub miss: u64,
    pub companion: Option<u64>,
}

impl EventSpec {
    pub const fn paired(name: &'static str, miss: u64, companion: u64) -> Self {
        Self {
            name,
            miss,
            companion: Some(companion),
        }
    }

    pub const fn miss_only(name: &'static str, miss: u64) -> Self {
        Self {
            name,
            miss,
            companion: None,
        }
    }

    /// Number of raw codes backing this event (1 or 2)
    pub const fn raw_count(&self) -> usize {
        if self.companion.is_some() {
            2
        } else {
            1
        }
    }
}

/// Static description of one platform generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformTable {
    pub name: &'static str,
    pub events: &'static [EventSpec],
    pub group_sizes: &'static [usize],
    pub companion: CompanionKind,
    pub encoding: CodeEncoding,
}

impl PlatformTable {
    /// Total number of raw codes across all events
    pub fn raw_counter_count(&self) -> usize {
        self.events.iter().map(EventSpec::raw_count).sum()
    }

    /// Raw codes in raw-counter order
    pub fn raw_codes(&self) -> Vec<u64> {
        self.events
            .iter()
            .flat_map(|event| std::iter::once(event.miss).chain(event.companion))
            .collect()
    }

    pub fn event_index(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|event| event.name == name)
    }
}

/// Every known platform table
pub const ALL: &[&PlatformTable] = &[
    &birch_stream::TABLE,
    &eagle_stream::TABLE,
    &whitley::TABLE,
    &purley::TABLE,
    &grantley::TABLE,
    &bromolow::TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_groups_cover_raw_counters() {
        for table in ALL {
            let grouped: usize = table.group_sizes.iter().sum();
            assert_eq!(grouped, table.raw_counter_count(), "{}", table.name);
            assert!(
                table
                    .group_sizes
                    .iter()
                    .all(|&size| size >= 1 && size <= MAX_COUNTERS_PER_GROUP),
                "{}",
                table.name
            );
        }
    }

    #[test]
    fn test_raw_codes_are_unique() {
        for table in ALL {
            let codes = table.raw_codes();
            let unique: HashSet<u64> = codes.iter().copied().collect();
            assert_eq!(unique.len(), codes.len(), "{}", table.name);
        }
    }

    #[test]
    fn test_total_companions_on_every_event() {
        for table in ALL.iter().filter(|t| t.companion == CompanionKind::Total) {
            assert!(table.events.iter().all(|e| e.companion.is_some()));
        }
    }

    #[test]
    fn test_raw_code_order() {
        let codes = whitley::TABLE.raw_codes();
        assert_eq!(codes[0], 0xC8F3FE00000435);
        assert_eq!(codes[1], 0xC8F3FD00000435);
        assert_eq!(codes[6], 0xC877DE00000135);
        assert_eq!(codes[7], 0xC87FDE00000135);
    }
}
