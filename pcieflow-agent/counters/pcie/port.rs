// Hardware counter access seam and its CHA/CBo MSR implementation

use pcieflow_raw::cha::{
    self, CboPcieFilter, ChaLayout, OpcodeFilter, SkxPcieFilter, COUNTER_MASK,
};
use pcieflow_raw::platform::{CodeEncoding, MAX_COUNTERS_PER_GROUP};
use pcieflow_raw::RegisterLayout;

use crate::common::arch::models;
use crate::common::msr::MsrAccess;
use crate::error::{PcieflowError, Result};

/// Programs raw event codes onto the physical counters and reads them back
pub trait CounterAccessPort {
    fn num_sockets(&self) -> u32;

    /// Program `codes` onto physical slots `0..codes.len()` of every socket
    fn program_group(&mut self, codes: &[u64]) -> Result<()>;

    /// Current value of a physical slot, summed over the socket's boxes
    fn read_counter(&self, socket: u32, slot: usize) -> Result<u64>;
}

/// CHA/CBo layout of a CPU model
pub fn layout_for_model(cpu_model: u32) -> Option<&'static ChaLayout> {
    let layout = match cpu_model {
        models::JAKETOWN => &cha::JKT_CBO,
        models::IVYTOWN => &cha::IVT_CBO,
        models::HASWELLX | models::BDX | models::BDX_DE => &cha::HSX_CBO,
        models::KNL => &cha::KNL_CHA,
        models::SKX => &cha::SKX_CHA,
        models::ICX => &cha::ICX_CHA,
        models::SNOWRIDGE => &cha::SNR_CHA,
        models::SPR | models::EMR | models::SRF => &cha::SPR_CHA,
        _ => return None,
    };
    Some(layout)
}

#[derive(Debug, Clone, Copy)]
struct SocketBoxes {
    cpu: u32,
    boxes: usize,
}

/// [`CounterAccessPort`] over the uncore CHA/CBo MSRs
///
/// Each socket is driven through one of its cores. A group is programmed
/// identically on every box of the socket, and a slot read is the sum of that
/// slot across all boxes.
pub struct MsrCounterPort<M: MsrAccess> {
    msr: M,
    layout: &'static ChaLayout,
    encoding: CodeEncoding,
    sockets: Vec<SocketBoxes>,
}

impl<M: MsrAccess> MsrCounterPort<M> {
    /// `socket_cpus` holds one core per socket, in socket order
    pub fn new(
        msr: M,
        socket_cpus: &[u32],
        cpu_model: u32,
        encoding: CodeEncoding,
    ) -> Result<Self> {
        let layout = layout_for_model(cpu_model).ok_or_else(|| {
            PcieflowError::UnsupportedPlatform(format!(
                "No CHA/CBo layout for CPU model 0x{cpu_model:X}"
            ))
        })?;

        let sockets = socket_cpus
            .iter()
            .map(|&cpu| {
                let boxes = Self::probe_boxes(&msr, layout, cpu);
                if boxes == 0 {
                    return Err(PcieflowError::HardwareProgrammingFailure(format!(
                        "No {} boxes responded on CPU {}",
                        layout.name, cpu
                    )));
                }
                tracing::info!("Found {} {} boxes via CPU {}", boxes, layout.name, cpu);
                Ok(SocketBoxes { cpu, boxes })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            msr,
            layout,
            encoding,
            sockets,
        })
    }

    /// Count boxes by reading counter 0 of each until the first failure
    fn probe_boxes(msr: &M, layout: &ChaLayout, cpu: u32) -> usize {
        (0..layout.max_boxes)
            .take_while(|&box_index| match msr.read(cpu, layout.counter_value(box_index, 0)) {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!("{} box {} not present: {}", layout.name, box_index, e);
                    false
                }
            })
            .count()
    }

    pub fn layout(&self) -> &'static ChaLayout {
        self.layout
    }

    pub fn boxes(&self, socket: u32) -> Option<usize> {
        self.sockets.get(socket as usize).map(|s| s.boxes)
    }

    /// (counter control values, optional (FILTER0, FILTER1) values)
    fn encode(&self, codes: &[u64]) -> Result<(Vec<u64>, Option<(u64, u64)>)> {
        match self.encoding {
            CodeEncoding::Raw => {
                let enable = cha::ChaCounterControl {
                    enable: true,
                    ..Default::default()
                }
                .to_msr_value();
                Ok((codes.iter().map(|&code| code | enable).collect(), None))
            }
            CodeEncoding::SkxFilter | CodeEncoding::CboFilter => {
                let [code] = codes else {
                    return Err(PcieflowError::HardwareProgrammingFailure(format!(
                        "Filtered events are programmed one per group, got {}",
                        codes.len()
                    )));
                };
                if self.encoding == CodeEncoding::SkxFilter {
                    let filter = SkxPcieFilter::from_msr_value(*code);
                    Ok((
                        vec![filter.counter_control().to_msr_value()],
                        Some((0, filter.filter1_value())),
                    ))
                } else {
                    let filter = CboPcieFilter::from_msr_value(*code);
                    let placement = match self.layout.opcode_filter {
                        OpcodeFilter::Filter0Shift23 => OpcodeFilter::Filter0Shift23,
                        _ => OpcodeFilter::Filter1Shift20,
                    };
                    Ok((
                        vec![filter.counter_control().to_msr_value()],
                        Some(filter.filter_values(placement)),
                    ))
                }
            }
        }
    }

    fn program_box(
        &self,
        cpu: u32,
        box_index: usize,
        controls: &[u64],
        filters: Option<(u64, u64)>,
    ) -> Result<()> {
        let layout = self.layout;
        self.msr
            .write(cpu, layout.box_control(box_index), layout.freeze_and_reset())?;

        if let Some((filter0, filter1)) = filters {
            if let Some(addr) = layout.filter0_address(box_index) {
                self.msr.write(cpu, addr, filter0)?;
            }
            if let Some(addr) = layout.filter1_address(box_index) {
                self.msr.write(cpu, addr, filter1)?;
            }
        }

        for counter in 0..MAX_COUNTERS_PER_GROUP {
            let value = controls.get(counter).copied().unwrap_or(0);
            self.msr
                .write(cpu, layout.counter_control(box_index, counter), value)?;
        }

        self.msr
            .write(cpu, layout.box_control(box_index), layout.unfreeze())
    }
}

impl<M: MsrAccess> CounterAccessPort for MsrCounterPort<M> {
    fn num_sockets(&self) -> u32 {
        self.sockets.len() as u32
    }

    fn program_group(&mut self, codes: &[u64]) -> Result<()> {
        if codes.is_empty() || codes.len() > MAX_COUNTERS_PER_GROUP {
            return Err(PcieflowError::HardwareProgrammingFailure(format!(
                "Group of {} codes does not fit {} counters",
                codes.len(),
                MAX_COUNTERS_PER_GROUP
            )));
        }

        let (controls, filters) = self.encode(codes)?;
        tracing::debug!("Programming PCIe group {:X?} as {:X?}", codes, controls);

        for (socket, boxes) in self.sockets.iter().enumerate() {
            for box_index in 0..boxes.boxes {
                self.program_box(boxes.cpu, box_index, &controls, filters)
                    .map_err(|e| {
                        PcieflowError::HardwareProgrammingFailure(format!(
                            "socket {socket} {} box {box_index}: {e}",
                            self.layout.name
                        ))
                    })?;
            }
        }
        Ok(())
    }

    fn read_counter(&self, socket: u32, slot: usize) -> Result<u64> {
        let boxes = self.sockets.get(socket as usize).ok_or_else(|| {
            PcieflowError::CounterReadFailure(format!("No socket {socket}"))
        })?;

        (0..boxes.boxes).try_fold(0u64, |sum, box_index| {
            let addr = self.layout.counter_value(box_index, slot);
            let value = self.msr.read(boxes.cpu, addr).map_err(|e| {
                PcieflowError::CounterReadFailure(format!(
                    "socket {socket} {} box {box_index} slot {slot}: {e}",
                    self.layout.name
                ))
            })?;
            Ok(sum.wrapping_add(value & COUNTER_MASK))
        })
    }
}
