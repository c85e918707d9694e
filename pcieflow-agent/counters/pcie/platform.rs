//! Platform selection and the per-platform collection entry points
//!
//! A [`Platform`] bundles everything that differs between Xeon generations:
//! the event table, the difference policy for its register pairs and the
//! bandwidth formula. The variant is chosen once from the CPU model.

use std::time::Duration;

use pcieflow_raw::platform::{
    birch_stream, bromolow, eagle_stream, grantley, purley, whitley, PlatformTable,
};

use crate::common::arch::models;
use crate::counters::pcie::buffer::SampleBuffer;
use crate::counters::pcie::descriptor::PlatformDescriptor;
use crate::counters::pcie::port::CounterAccessPort;
use crate::counters::pcie::sampler::DifferencePolicy;
use crate::counters::pcie::scheduler::{EventGroupScheduler, Sleeper};
use crate::error::{PcieflowError, Result};
use crate::metrics::pcie::bandwidth::{self, Bandwidth, BandwidthFormula, EventReader};
use crate::metrics::pcie::EventFilter;

/// Samples per multiplexing pass used by [`create_platform`]
pub const DEFAULT_SAMPLES: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformKind {
    BirchStream,
    EagleStream,
    Whitley,
    Purley,
    Grantley,
    Bromolow,
}

impl PlatformKind {
    pub fn for_cpu_model(cpu_model: u32) -> Result<Self> {
        let kind = match cpu_model {
            models::SRF => PlatformKind::BirchStream,
            models::SPR | models::EMR => PlatformKind::EagleStream,
            models::ICX | models::SNOWRIDGE => PlatformKind::Whitley,
            models::SKX => PlatformKind::Purley,
            models::BDX_DE | models::BDX | models::KNL | models::HASWELLX => {
                PlatformKind::Grantley
            }
            models::IVYTOWN | models::JAKETOWN => PlatformKind::Bromolow,
            _ => {
                return Err(PcieflowError::UnsupportedPlatform(format!(
                    "CPU model 0x{cpu_model:X} has no PCIe event table"
                )))
            }
        };
        Ok(kind)
    }

    pub fn all() -> [PlatformKind; 6] {
        [
            PlatformKind::BirchStream,
            PlatformKind::EagleStream,
            PlatformKind::Whitley,
            PlatformKind::Purley,
            PlatformKind::Grantley,
            PlatformKind::Bromolow,
        ]
    }

    pub fn table(&self) -> &'static PlatformTable {
        match self {
            PlatformKind::BirchStream => &birch_stream::TABLE,
            PlatformKind::EagleStream => &eagle_stream::TABLE,
            PlatformKind::Whitley => &whitley::TABLE,
            PlatformKind::Purley => &purley::TABLE,
            PlatformKind::Grantley => &grantley::TABLE,
            PlatformKind::Bromolow => &bromolow::TABLE,
        }
    }

    pub fn name(&self) -> &'static str {
        self.table().name
    }

    pub fn difference_policy(&self) -> DifferencePolicy {
        DifferencePolicy::for_companion(self.table().companion)
    }

    pub fn bandwidth_formula(&self) -> BandwidthFormula {
        match self {
            PlatformKind::BirchStream | PlatformKind::EagleStream => bandwidth::eagle_stream,
            PlatformKind::Whitley => bandwidth::whitley,
            PlatformKind::Purley => bandwidth::purley,
            PlatformKind::Grantley => bandwidth::grantley,
            PlatformKind::Bromolow => bandwidth::bromolow,
        }
    }
}

/// Select the platform for `cpu_model` with a `delay_ms` multiplexing budget
///
/// Fails with `UnsupportedPlatform` for an unknown model, and with
/// `InvalidConfiguration` when `delay_ms` is 0 or too short to give every
/// event group at least a 1 ms slice.
pub fn create_platform(cpu_model: u32, delay_ms: u32) -> Result<Platform> {
    Platform::new(
        PlatformKind::for_cpu_model(cpu_model)?,
        delay_ms,
        DEFAULT_SAMPLES,
    )
}

#[derive(Clone)]
pub struct Platform {
    kind: PlatformKind,
    descriptor: PlatformDescriptor,
    policy: DifferencePolicy,
    formula: BandwidthFormula,
    scheduler: EventGroupScheduler,
}

impl Platform {
    pub fn new(kind: PlatformKind, delay_ms: u32, samples: u32) -> Result<Self> {
        let descriptor = PlatformDescriptor::from_table(kind.table())?;
        let scheduler = EventGroupScheduler::new(delay_ms, descriptor.groups().len(), samples)?;

        tracing::info!(
            "Selected {} platform: {} events in {} groups, {:?} slices",
            kind.name(),
            descriptor.events().len(),
            descriptor.groups().len(),
            scheduler.slice()
        );

        Ok(Self {
            kind,
            descriptor,
            policy: kind.difference_policy(),
            formula: kind.bandwidth_formula(),
            scheduler,
        })
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.scheduler = self.scheduler.with_sleeper(sleeper);
        self
    }

    pub fn kind(&self) -> PlatformKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn descriptor(&self) -> &PlatformDescriptor {
        &self.descriptor
    }

    pub fn policy(&self) -> DifferencePolicy {
        self.policy
    }

    /// Wall-clock time the counters of each group actually ran during one
    /// cycle, summed over groups
    pub fn measurement_window(&self) -> Duration {
        self.scheduler.slice() * self.descriptor.groups().len() as u32
    }

    pub fn new_sample_buffer(&self, num_sockets: usize) -> SampleBuffer {
        SampleBuffer::new(num_sockets, self.descriptor.buffer_width())
    }

    /// Run one multiplexing cycle and return `buffer` plus its counts
    pub fn get_events<P: CounterAccessPort + ?Sized>(
        &self,
        port: &mut P,
        buffer: &SampleBuffer,
    ) -> Result<SampleBuffer> {
        self.scheduler
            .run_cycle(port, &self.descriptor, self.policy, buffer)
    }

    /// Filtered count of logical event `event` on `socket`
    ///
    /// Unknown sockets or events read as 0.
    pub fn event(
        &self,
        buffer: &SampleBuffer,
        socket: usize,
        filter: EventFilter,
        event: usize,
    ) -> u64 {
        let Some(logical) = self.descriptor.event(event) else {
            return 0;
        };
        let miss = buffer.get(socket, logical.miss_slot());
        let companion = logical
            .has_companion
            .then(|| buffer.get(socket, logical.companion_slot()));
        self.policy.view(filter, miss, companion)
    }

    pub fn bandwidth(&self, buffer: &SampleBuffer) -> Bandwidth {
        (self.formula)(&BufferView {
            platform: self,
            buffer,
        })
    }

    pub fn read_bw(&self, buffer: &SampleBuffer) -> u64 {
        self.bandwidth(buffer).read_bytes
    }

    pub fn write_bw(&self, buffer: &SampleBuffer) -> u64 {
        self.bandwidth(buffer).write_bytes
    }

    pub fn cleanup(&self, buffer: &mut SampleBuffer) {
        buffer.clear();
    }
}

struct BufferView<'a> {
    platform: &'a Platform,
    buffer: &'a SampleBuffer,
}

impl EventReader for BufferView<'_> {
    fn num_sockets(&self) -> usize {
        self.buffer.num_sockets()
    }

    fn event(&self, socket: usize, filter: EventFilter, event: usize) -> u64 {
        self.platform.event(self.buffer, socket, filter, event)
    }
}
