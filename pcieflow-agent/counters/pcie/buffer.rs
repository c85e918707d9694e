/// Per-socket accumulators, one slot per (logical event, register variant)
///
/// Slots only grow between [`SampleBuffer::clear`] calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    width: usize,
    sockets: Vec<Vec<u64>>,
}

impl SampleBuffer {
    pub fn new(num_sockets: usize, width: usize) -> Self {
        Self {
            width,
            sockets: vec![vec![0; width]; num_sockets],
        }
    }

    pub fn num_sockets(&self) -> usize {
        self.sockets.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Accumulated value of a slot; 0 for a socket or slot outside the buffer
    pub fn get(&self, socket: usize, slot: usize) -> u64 {
        self.sockets
            .get(socket)
            .and_then(|slots| slots.get(slot))
            .copied()
            .unwrap_or(0)
    }

    pub fn socket(&self, socket: usize) -> Option<&[u64]> {
        self.sockets.get(socket).map(Vec::as_slice)
    }

    pub(crate) fn add(&mut self, socket: usize, slot: usize, delta: u64) {
        if let Some(value) = self.sockets.get_mut(socket).and_then(|s| s.get_mut(slot)) {
            *value = value.saturating_add(delta);
        }
    }

    pub fn clear(&mut self) {
        for socket in &mut self.sockets {
            socket.fill(0);
        }
    }

    pub fn is_zero(&self) -> bool {
        self.sockets.iter().flatten().all(|&v| v == 0)
    }
}
