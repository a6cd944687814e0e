//! Runtime tunables.

use hushcat_proto::DEFAULT_MAX_FRAME_LEN;

/// Queue and buffer sizes for one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Capacity of each directional queue, in messages
    pub queue_capacity: usize,
    /// Upper bound on a single read from a source, in bytes
    pub read_chunk: usize,
    /// Largest frame the transport decoder buffers before failing
    pub max_frame_len: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { queue_capacity: 100, read_chunk: 4096, max_frame_len: DEFAULT_MAX_FRAME_LEN }
    }
}
