//! Sample ring buffer for playback
//!
//! Fixed capacity, single owner. Writing into a full ring evicts the oldest
//! unread samples; the eviction is counted as an overflow. Reading more than
//! is available counts an underrun.

#[derive(Debug, Clone)]
pub struct SampleRing {
    samples: Vec<f32>,
    write_index: usize,
    read_index: usize,
    len: usize,
    overflow_count: u64,
    underrun_count: u64,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            write_index: 0,
            read_index: 0,
            len: 0,
            overflow_count: 0,
            underrun_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Unread samples
    pub fn available(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fill ratio between 0.0 and 1.0
    pub fn fill_level(&self) -> f64 {
        self.len as f64 / self.capacity() as f64
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    pub fn underrun_count(&self) -> u64 {
        self.underrun_count
    }

    /// Append samples, returning how many unread samples were evicted
    pub fn write(&mut self, input: &[f32]) -> usize {
        let capacity = self.capacity();
        // Only the newest `capacity` samples can survive
        let skipped = input.len().saturating_sub(capacity);
        let input = &input[skipped..];

        let evicted = (self.len + input.len()).saturating_sub(capacity);
        if evicted > 0 {
            self.read_index = (self.read_index + evicted) % capacity;
            self.len -= evicted;
        }

        for &sample in input {
            self.samples[self.write_index] = sample;
            self.write_index = (self.write_index + 1) % capacity;
        }
        self.len += input.len();

        let lost = evicted + skipped;
        if lost > 0 {
            self.overflow_count += 1;
            log::debug!("Playback ring overflow: {} samples evicted", lost);
        }
        lost
    }

    /// Read up to `output.len()` samples; returns how many were read
    ///
    /// A short read counts as an underrun; the rest of `output` is left
    /// untouched.
    pub fn read(&mut self, output: &mut [f32]) -> usize {
        let capacity = self.capacity();
        let count = output.len().min(self.len);
        for slot in output.iter_mut().take(count) {
            *slot = self.samples[self.read_index];
            self.read_index = (self.read_index + 1) % capacity;
        }
        self.len -= count;
        if count < output.len() {
            self.underrun_count += 1;
        }
        count
    }

    /// Drop all unread samples
    pub fn clear(&mut self) {
        self.read_index = self.write_index;
        self.len = 0;
    }
}
