// Deterministic CounterAccessPort for unit tests

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

use crate::counters::pcie::port::CounterAccessPort;
use crate::error::{PcieflowError, Result};

pub fn no_sleep(_: Duration) {}

/// Before/after values of one group, indexed `[socket][slot]`
type GroupScript = (Vec<Vec<u64>>, Vec<Vec<u64>>);

/// Port whose counters advance by a fixed step on every read of a slot, or
/// replay scripted before/after values for selected groups
pub struct ScriptedPort {
    sockets: u32,
    step: u64,
    scripts: HashMap<usize, GroupScript>,
    programmed: Vec<Vec<u64>>,
    reads: RefCell<HashMap<(u32, usize), u64>>,
    total_reads: Cell<usize>,
    fail_reads_after: Option<usize>,
    fail_program_at: Option<usize>,
}

impl ScriptedPort {
    pub fn steady(sockets: u32, step: u64) -> Self {
        Self {
            sockets,
            step,
            scripts: HashMap::new(),
            programmed: Vec::new(),
            reads: RefCell::new(HashMap::new()),
            total_reads: Cell::new(0),
            fail_reads_after: None,
            fail_program_at: None,
        }
    }

    /// Replay `before`/`after` for the `group`-th programmed group
    pub fn script(mut self, group: usize, before: Vec<Vec<u64>>, after: Vec<Vec<u64>>) -> Self {
        self.scripts.insert(group, (before, after));
        self
    }

    pub fn fail_reads_after(mut self, reads: usize) -> Self {
        self.fail_reads_after = Some(reads);
        self
    }

    pub fn fail_program_at(mut self, program: usize) -> Self {
        self.fail_program_at = Some(program);
        self
    }

    pub fn programmed(&self) -> &[Vec<u64>] {
        &self.programmed
    }
}

impl CounterAccessPort for ScriptedPort {
    fn num_sockets(&self) -> u32 {
        self.sockets
    }

    fn program_group(&mut self, codes: &[u64]) -> Result<()> {
        if self.fail_program_at == Some(self.programmed.len()) {
            return Err(PcieflowError::HardwareProgrammingFailure(
                "scripted failure".to_string(),
            ));
        }
        self.programmed.push(codes.to_vec());
        self.reads.borrow_mut().clear();
        Ok(())
    }

    fn read_counter(&self, socket: u32, slot: usize) -> Result<u64> {
        let total = self.total_reads.get();
        if self.fail_reads_after.is_some_and(|limit| total >= limit) {
            return Err(PcieflowError::CounterReadFailure(
                "scripted failure".to_string(),
            ));
        }
        self.total_reads.set(total + 1);

        let mut reads = self.reads.borrow_mut();
        let count = reads.entry((socket, slot)).or_insert(0);
        let nth = *count;
        *count += 1;

        let group = self.programmed.len().saturating_sub(1);
        let value = match self.scripts.get(&group) {
            Some((before, after)) => {
                let values = if nth == 0 { before } else { after };
                values[socket as usize][slot]
            }
            None => self.step * nth,
        };
        Ok(value)
    }
}
