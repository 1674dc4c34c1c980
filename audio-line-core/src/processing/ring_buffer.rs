/// Fixed-capacity circular byte buffer for stream data.
///
/// Not synchronized; backends wrap it in a `parking_lot::Mutex` together
/// with the rest of their per-stream state.
///
/// `write` accepts only what fits. `push_overwrite` drops the oldest bytes
/// to make room and counts them as overruns.
#[derive(Debug)]
pub struct ByteRingBuffer {
    buffer: Vec<u8>,
    write_index: usize,
    read_index: usize,
    available: usize,
    overruns: u64,
}

impl ByteRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity],
            write_index: 0,
            read_index: 0,
            available: 0,
            overruns: 0,
        }
    }

    /// Copy as much of `data` as fits. Returns the number of bytes taken.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.free());
        self.copy_in(&data[..count]);
        count
    }

    /// Copy all of `data`, dropping the oldest bytes on overflow.
    ///
    /// If `data` is larger than the capacity, only its tail is kept.
    pub fn push_overwrite(&mut self, data: &[u8]) {
        let capacity = self.capacity();
        if capacity == 0 || data.is_empty() {
            return;
        }
        let data = if data.len() > capacity {
            self.overruns += (data.len() - capacity) as u64;
            &data[data.len() - capacity..]
        } else {
            data
        };

        let overflow = (self.available + data.len()).saturating_sub(capacity);
        if overflow > 0 {
            self.discard(overflow);
            self.overruns += overflow as u64;
        }
        self.copy_in(data);
    }

    /// Move up to `out.len()` bytes into `out`. Returns the number moved.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.available);
        let capacity = self.capacity();
        for (i, byte) in out.iter_mut().take(count).enumerate() {
            *byte = self.buffer[(self.read_index + i) % capacity];
        }
        self.discard(count);
        count
    }

    /// Drop up to `count` of the oldest bytes. Returns the number dropped.
    pub fn discard(&mut self, count: usize) -> usize {
        let count = count.min(self.available);
        if count > 0 {
            self.read_index = (self.read_index + count) % self.capacity();
            self.available -= count;
        }
        count
    }

    pub fn len(&self) -> usize {
        self.available
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    pub fn clear(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes dropped by `push_overwrite` since creation.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    fn copy_in(&mut self, data: &[u8]) {
        let capacity = self.capacity();
        for &byte in data {
            self.buffer[self.write_index] = byte;
            self.write_index = (self.write_index + 1) % capacity;
        }
        self.available += data.len();
    }
}
