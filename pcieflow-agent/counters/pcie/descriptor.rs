// Runtime view of a platform's event table: logical events, event groups and
// the mapping from raw-counter order onto sample buffer slots

use pcieflow_raw::platform::{
    CodeEncoding, CompanionKind, PlatformTable, MAX_COUNTERS_PER_GROUP,
};

use crate::error::{PcieflowError, Result};

/// A named PCIe transaction event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalEvent {
    pub name: &'static str,
    pub index: usize,
    pub has_companion: bool,
}

impl LogicalEvent {
    /// Buffer slot of the miss register
    pub fn miss_slot(&self) -> usize {
        2 * self.index
    }

    /// Buffer slot of the hit/total register
    pub fn companion_slot(&self) -> usize {
        2 * self.index + 1
    }
}

/// Raw codes programmed together, with the buffer slot each one feeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventGroup {
    /// Position of the first code in raw-counter order
    pub offset: usize,
    pub codes: Vec<u64>,
    pub slots: Vec<usize>,
}

impl EventGroup {
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Immutable event layout of one platform generation
#[derive(Debug, Clone)]
pub struct PlatformDescriptor {
    table: &'static PlatformTable,
    events: Vec<LogicalEvent>,
    groups: Vec<EventGroup>,
}

impl PlatformDescriptor {
    pub fn from_table(table: &'static PlatformTable) -> Result<Self> {
        let events: Vec<LogicalEvent> = table
            .events
            .iter()
            .enumerate()
            .map(|(index, spec)| LogicalEvent {
                name: spec.name,
                index,
                has_companion: spec.companion.is_some(),
            })
            .collect();

        let codes = table.raw_codes();
        let slots: Vec<usize> = events
            .iter()
            .flat_map(|event| {
                let companion = event.has_companion.then(|| event.companion_slot());
                std::iter::once(event.miss_slot()).chain(companion)
            })
            .collect();

        let grouped: usize = table.group_sizes.iter().sum();
        if grouped != codes.len() {
            return Err(PcieflowError::InvalidConfiguration(format!(
                "{}: groups cover {} raw counters, table has {}",
                table.name,
                grouped,
                codes.len()
            )));
        }

        let mut groups = Vec::with_capacity(table.group_sizes.len());
        let mut offset = 0;
        for &size in table.group_sizes {
            if size == 0 || size > MAX_COUNTERS_PER_GROUP {
                return Err(PcieflowError::InvalidConfiguration(format!(
                    "{}: group size {} outside 1..={}",
                    table.name, size, MAX_COUNTERS_PER_GROUP
                )));
            }
            groups.push(EventGroup {
                offset,
                codes: codes[offset..offset + size].to_vec(),
                slots: slots[offset..offset + size].to_vec(),
            });
            offset += size;
        }

        Ok(Self {
            table,
            events,
            groups,
        })
    }

    pub fn name(&self) -> &'static str {
        self.table.name
    }

    pub fn events(&self) -> &[LogicalEvent] {
        &self.events
    }

    pub fn event(&self, index: usize) -> Option<&LogicalEvent> {
        self.events.get(index)
    }

    pub fn event_index(&self, name: &str) -> Option<usize> {
        self.table.event_index(name)
    }

    pub fn groups(&self) -> &[EventGroup] {
        &self.groups
    }

    pub fn companion(&self) -> CompanionKind {
        self.table.companion
    }

    pub fn encoding(&self) -> CodeEncoding {
        self.table.encoding
    }

    pub fn raw_counter_count(&self) -> usize {
        self.groups.iter().map(EventGroup::len).sum()
    }

    /// Sample buffer slots per socket: two per logical event
    pub fn buffer_width(&self) -> usize {
        2 * self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcieflow_raw::platform::{self, eagle_stream, EventSpec};

    #[test]
    fn test_groups_partition_raw_counters() {
        for table in platform::ALL {
            let descriptor = PlatformDescriptor::from_table(table).unwrap();
            let mut expected_offset = 0;
            for group in descriptor.groups() {
                assert_eq!(group.offset, expected_offset, "{}", table.name);
                expected_offset += group.len();
            }
            assert_eq!(expected_offset, table.raw_counter_count());
            assert_eq!(descriptor.raw_counter_count(), table.raw_counter_count());
        }
    }

    #[test]
    fn test_slots_are_distinct_and_in_range() {
        for table in platform::ALL {
            let descriptor = PlatformDescriptor::from_table(table).unwrap();
            let mut slots: Vec<usize> = descriptor
                .groups()
                .iter()
                .flat_map(|g| g.slots.iter().copied())
                .collect();
            let count = slots.len();
            slots.sort_unstable();
            slots.dedup();
            assert_eq!(slots.len(), count, "{}", table.name);
            assert!(slots.iter().all(|&s| s < descriptor.buffer_width()));
        }
    }

    #[test]
    fn test_eagle_stream_slot_layout() {
        let descriptor = PlatformDescriptor::from_table(&eagle_stream::TABLE).unwrap();
        assert_eq!(descriptor.buffer_width(), 14);

        let groups = descriptor.groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].slots, vec![0, 1, 2, 3]);
        // ItoMCacheNear miss/hit, then UCRdF and WiL miss only
        assert_eq!(groups[1].slots, vec![4, 5, 6, 8]);
        assert_eq!(groups[2].slots, vec![10, 12]);
        assert_eq!(groups[2].offset, 8);
    }

    #[test]
    fn test_mismatched_groups_are_rejected() {
        static EVENTS: &[EventSpec] = &[EventSpec::paired("A", 1, 2)];
        static BAD: PlatformTable = PlatformTable {
            name: "Bad",
            events: EVENTS,
            group_sizes: &[1],
            companion: CompanionKind::Hit,
            encoding: CodeEncoding::Raw,
        };
        assert!(matches!(
            PlatformDescriptor::from_table(&BAD),
            Err(PcieflowError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_oversized_group_is_rejected() {
        static EVENTS: &[EventSpec] = &[
            EventSpec::paired("A", 1, 2),
            EventSpec::paired("B", 3, 4),
            EventSpec::miss_only("C", 5),
        ];
        static BAD: PlatformTable = PlatformTable {
            name: "Wide",
            events: EVENTS,
            group_sizes: &[5],
            companion: CompanionKind::Hit,
            encoding: CodeEncoding::Raw,
        };
        assert!(PlatformDescriptor::from_table(&BAD).is_err());
    }
}
