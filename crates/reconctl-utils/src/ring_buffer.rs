//! Bounded byte buffer for capturing subprocess stdout/stderr.
//!
//! A tool invocation can write arbitrarily much output; the Process Runner
//! must never let that exhaust memory for the whole engine. `BoundedBuffer`
//! caps retained bytes at a fixed capacity and flags when it has discarded
//! anything past that point, so callers can render "(truncated)" rather than
//! silently dropping data.

const DEFAULT_CAPACITY: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct BoundedBuffer {
    capacity: usize,
    data: Vec<u8>,
    truncated: bool,
    total_bytes_seen: u64,
}

impl BoundedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            data: Vec::new(),
            truncated: false,
            total_bytes_seen: 0,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Append `chunk`, keeping only as much as fits within capacity. Once
    /// truncation starts it stays truncated even if later chunks would
    /// individually have fit — partial interior retention would be
    /// misleading.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.total_bytes_seen += chunk.len() as u64;
        if self.truncated {
            return;
        }
        let remaining = self.capacity - self.data.len();
        if chunk.len() <= remaining {
            self.data.extend_from_slice(chunk);
        } else {
            self.data.extend_from_slice(&chunk[..remaining]);
            self.truncated = true;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn total_bytes_seen(&self) -> u64 {
        self.total_bytes_seen
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl Default for BoundedBuffer {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
