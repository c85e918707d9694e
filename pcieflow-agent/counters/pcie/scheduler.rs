// Time-sliced multiplexing of event groups onto the physical counters

use std::time::Duration;

use crate::counters::pcie::buffer::SampleBuffer;
use crate::counters::pcie::descriptor::{EventGroup, PlatformDescriptor};
use crate::counters::pcie::port::CounterAccessPort;
use crate::counters::pcie::sampler::{DifferencePolicy, RawSnapshot};
use crate::error::{PcieflowError, Result};

/// Blocks the calling thread for one multiplexing slice
pub type Sleeper = fn(Duration);

pub fn thread_sleep(duration: Duration) {
    std::thread::sleep(duration);
}

/// Walks the event groups once per cycle, sampling each for one slice
#[derive(Debug, Clone, Copy)]
pub struct EventGroupScheduler {
    slice: Duration,
    sleeper: Sleeper,
}

impl EventGroupScheduler {
    /// Split a `delay_ms` budget evenly over `groups` groups and `samples`
    /// samples per pass (whole milliseconds, rounded down)
    ///
    /// A budget that leaves less than 1 ms per slice is rejected: the
    /// measurement window would be empty and every rate would read as 0.
    pub fn new(delay_ms: u32, groups: usize, samples: u32) -> Result<Self> {
        if delay_ms == 0 {
            return Err(PcieflowError::InvalidConfiguration(
                "Multiplexing delay must be positive".to_string(),
            ));
        }
        if samples == 0 {
            return Err(PcieflowError::InvalidConfiguration(
                "Samples per pass must be positive".to_string(),
            ));
        }
        if groups == 0 {
            return Err(PcieflowError::InvalidConfiguration(
                "Platform has no event groups".to_string(),
            ));
        }

        let slice_ms = u64::from(delay_ms) / groups as u64 / u64::from(samples);
        if slice_ms == 0 {
            return Err(PcieflowError::InvalidConfiguration(format!(
                "Delay of {delay_ms} ms is too short for {groups} groups x {samples} samples \
                 (needs at least {} ms)",
                groups as u64 * u64::from(samples)
            )));
        }

        Ok(Self {
            slice: Duration::from_millis(slice_ms),
            sleeper: thread_sleep,
        })
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn slice(&self) -> Duration {
        self.slice
    }

    /// One full cycle over every event group, accumulated into a copy of
    /// `buffer`. The copy is returned only if every group succeeded.
    pub fn run_cycle<P: CounterAccessPort + ?Sized>(
        &self,
        port: &mut P,
        descriptor: &PlatformDescriptor,
        policy: DifferencePolicy,
        buffer: &SampleBuffer,
    ) -> Result<SampleBuffer> {
        if buffer.num_sockets() != port.num_sockets() as usize
            || buffer.width() != descriptor.buffer_width()
        {
            return Err(PcieflowError::InvalidConfiguration(format!(
                "Sample buffer is {}x{}, platform {} needs {}x{}",
                buffer.num_sockets(),
                buffer.width(),
                descriptor.name(),
                port.num_sockets(),
                descriptor.buffer_width()
            )));
        }

        let scale = descriptor.groups().len() as u64;
        let mut working = buffer.clone();
        for (index, group) in descriptor.groups().iter().enumerate() {
            let deltas = self.sample_group(port, group, policy)?;
            tracing::debug!(
                "{} group {} (offset {}): deltas {:?}",
                descriptor.name(),
                index,
                group.offset,
                deltas
            );

            for (socket, socket_deltas) in deltas.iter().enumerate() {
                for (&slot, &delta) in group.slots.iter().zip(socket_deltas) {
                    working.add(socket, slot, delta.saturating_mul(scale));
                }
            }
        }

        Ok(working)
    }

    fn sample_group<P: CounterAccessPort + ?Sized>(
        &self,
        port: &mut P,
        group: &EventGroup,
        policy: DifferencePolicy,
    ) -> Result<Vec<Vec<u64>>> {
        port.program_group(&group.codes)?;

        (self.sleeper)(self.slice);
        let before = RawSnapshot::capture(&*port, group.len())?;
        (self.sleeper)(self.slice);
        let after = RawSnapshot::capture(&*port, group.len())?;

        Ok(policy.group_deltas(&before, &after))
    }
}
